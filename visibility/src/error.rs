use crate::lister::ListChildrenError;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Failure of a visibility query.
///
/// Paths that cannot be resolved inside the repository are exclusions, not
/// errors. Only directory lookups (and construction) fail.
#[derive(Error, Debug, Clone)]
pub enum VisibilityError {
    #[error("failed to list children of directory `{directory}`: {source}")]
    Lookup {
        directory: String,
        #[source]
        source: Arc<ListChildrenError>,
    },

    #[error("lookup of directory `{directory}` was cancelled")]
    Cancelled { directory: String },

    #[error("lookup of directory `{directory}` timed out after {after:?}")]
    Timeout { directory: String, after: Duration },

    #[error("project root `{0}` ascends past the repository root")]
    InvalidRoot(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl VisibilityError {
    pub(crate) fn lookup(directory: &str, source: ListChildrenError) -> Self {
        Self::Lookup {
            directory: directory.to_string(),
            source: Arc::new(source),
        }
    }

    pub(crate) fn cancelled(directory: &str) -> Self {
        Self::Cancelled {
            directory: directory.to_string(),
        }
    }

    pub(crate) fn timeout(directory: &str, after: Duration) -> Self {
        Self::Timeout {
            directory: directory.to_string(),
            after,
        }
    }

    /// The directory whose lookup failed, if any.
    pub fn directory(&self) -> Option<&str> {
        match self {
            Self::Lookup { directory, .. }
            | Self::Cancelled { directory }
            | Self::Timeout { directory, .. } => Some(directory),
            Self::InvalidRoot(_) | Self::Config(_) => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, VisibilityError>;
