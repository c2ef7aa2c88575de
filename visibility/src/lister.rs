use async_trait::async_trait;
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;

/// Immutable identity of the git tree being validated against.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepositoryCoordinate {
    pub repository_id: String,
    pub commit: String,
}

impl RepositoryCoordinate {
    pub fn new(repository_id: impl Into<String>, commit: impl Into<String>) -> Self {
        Self {
            repository_id: repository_id.into(),
            commit: commit.into(),
        }
    }
}

impl fmt::Display for RepositoryCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.repository_id, self.commit)
    }
}

#[derive(Error, Debug)]
pub enum ListChildrenError {
    #[error("repository {coordinate} is unavailable: {message}")]
    Unavailable {
        coordinate: RepositoryCoordinate,
        message: String,
    },

    #[error("`{command}` exited with {status}: {stderr}")]
    Command {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Source of truth for the tracked tree at a commit.
///
/// `directory` is relative to the repository root with `/` separators; `""`
/// is the root. A directory that does not exist yields an empty set.
#[async_trait]
pub trait DirectoryChildLister: Send + Sync {
    async fn list_children(
        &self,
        repository: &RepositoryCoordinate,
        directory: &str,
    ) -> Result<HashSet<String>, ListChildrenError>;
}
