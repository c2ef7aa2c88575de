//! Lexical resolution of indexer-emitted paths against a project root.
//!
//! Nothing here touches the filesystem or the remote tree. Paths use `/` as
//! the separator; empty and `.` segments are dropped and `..` pops the
//! previous segment.

use crate::error::Result;
use crate::error::VisibilityError;

/// A candidate path rewritten relative to the repository root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    /// Normalized path relative to the repository root. Empty when the path
    /// escapes the repository or names the repository root itself.
    pub relative_to_repo_root: String,
    /// The normalized path does not live under the project root.
    pub escapes_root: bool,
    /// Normalization had to ascend past the repository root.
    pub escapes_repo: bool,
}

impl ResolvedPath {
    fn escaped() -> Self {
        Self {
            relative_to_repo_root: String::new(),
            escapes_root: true,
            escapes_repo: true,
        }
    }

    /// Path segments from the repository root down to the leaf.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.relative_to_repo_root
            .split('/')
            .filter(|segment| !segment.is_empty())
    }

    /// Directory key of the immediate parent; `""` for top-level entries.
    pub fn parent(&self) -> &str {
        match self.relative_to_repo_root.rsplit_once('/') {
            Some((parent, _)) => parent,
            None => "",
        }
    }

    /// Final segment of the path.
    pub fn leaf(&self) -> &str {
        match self.relative_to_repo_root.rsplit_once('/') {
            Some((_, leaf)) => leaf,
            None => &self.relative_to_repo_root,
        }
    }

    /// True when the path resolved to the repository root itself.
    pub fn is_repository_root(&self) -> bool {
        !self.escapes_repo && self.relative_to_repo_root.is_empty()
    }
}

/// The subdirectory of a repository that one ingestion job treats as the
/// project. Normalized once at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectScope {
    root: String,
    segments: Vec<String>,
}

impl ProjectScope {
    pub fn new(root: &str) -> Result<Self> {
        let mut segments: Vec<&str> = Vec::new();
        if !push_segments(&mut segments, root) {
            return Err(VisibilityError::InvalidRoot(root.to_string()));
        }
        Ok(Self {
            root: segments.join("/"),
            segments: segments.into_iter().map(str::to_string).collect(),
        })
    }

    /// Normalized root, `""` for the whole repository.
    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn resolve(&self, candidate: &str) -> ResolvedPath {
        let mut stack: Vec<&str> = self.segments.iter().map(String::as_str).collect();
        if !push_segments(&mut stack, candidate) {
            return ResolvedPath::escaped();
        }

        let escapes_root = stack.len() < self.segments.len()
            || stack
                .iter()
                .zip(&self.segments)
                .any(|(segment, root)| *segment != root.as_str());

        ResolvedPath {
            relative_to_repo_root: stack.join("/"),
            escapes_root,
            escapes_repo: false,
        }
    }
}

/// Joins `candidate` onto `root` and normalizes the result.
///
/// A root that itself ascends past the repository root makes every candidate
/// escape the repository.
pub fn resolve_path(candidate: &str, root: &str) -> ResolvedPath {
    match ProjectScope::new(root) {
        Ok(scope) => scope.resolve(candidate),
        Err(_) => ResolvedPath::escaped(),
    }
}

/// Returns false when a `..` segment has nothing left to pop.
fn push_segments<'a>(stack: &mut Vec<&'a str>, path: &'a str) -> bool {
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if stack.pop().is_none() {
                    return false;
                }
            }
            name => stack.push(name),
        }
    }
    true
}
