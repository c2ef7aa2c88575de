use crate::lister::DirectoryChildLister;
use crate::lister::ListChildrenError;
use crate::lister::RepositoryCoordinate;
use async_trait::async_trait;
use std::collections::HashMap;
use std::collections::HashSet;

/// In-memory tree built from a list of tracked file paths, such as the output
/// of `git ls-tree -r --name-only <commit>`.
///
/// Serves the same snapshot for every coordinate.
#[derive(Debug, Clone, Default)]
pub struct ManifestLister {
    directories: HashMap<String, HashSet<String>>,
}

impl ManifestLister {
    pub fn from_paths<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut lister = Self::default();
        for path in paths {
            lister.insert(path.as_ref());
        }
        lister
    }

    /// Parses one path per line; blank lines and `#` comments are skipped.
    pub fn parse(contents: &str) -> Self {
        Self::from_paths(
            contents
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty() && !line.starts_with('#')),
        )
    }

    pub fn insert(&mut self, path: &str) {
        let mut directory = String::new();
        for segment in path.split('/').filter(|s| !s.is_empty() && *s != ".") {
            self.directories
                .entry(directory.clone())
                .or_default()
                .insert(segment.to_string());
            if !directory.is_empty() {
                directory.push('/');
            }
            directory.push_str(segment);
        }
    }

    pub fn directory_count(&self) -> usize {
        self.directories.len()
    }
}

#[async_trait]
impl DirectoryChildLister for ManifestLister {
    async fn list_children(
        &self,
        _repository: &RepositoryCoordinate,
        directory: &str,
    ) -> Result<HashSet<String>, ListChildrenError> {
        Ok(self.directories.get(directory).cloned().unwrap_or_default())
    }
}
