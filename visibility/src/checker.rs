use crate::cache::CacheStats;
use crate::cache::DirectoryChildCache;
use crate::config::VisibilityConfig;
use crate::error::Result;
use crate::error::VisibilityError;
use crate::lister::DirectoryChildLister;
use crate::lister::RepositoryCoordinate;
use crate::path::ProjectScope;
use crate::path::ResolvedPath;
use futures::StreamExt;
use futures::stream;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::trace;

/// Outcome of filtering a batch of candidate paths.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterOutcome {
    /// Retained candidates, in input order, as they were given
    pub included: Vec<String>,
    pub stats: FilterStats,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FilterStats {
    pub checked: usize,
    pub included: usize,
    pub excluded: usize,
}

/// Decides which indexer-emitted paths exist in one repository commit.
///
/// Scoped to a single `{repository, commit, root}`; build a new checker for
/// every ingestion job. Safe to share across tasks: the only mutable state is
/// the directory cache.
pub struct VisibilityChecker {
    scope: ProjectScope,
    cache: DirectoryChildCache,
    config: VisibilityConfig,
    cancel: CancellationToken,
}

impl VisibilityChecker {
    pub fn new(
        coordinate: RepositoryCoordinate,
        root: &str,
        lister: Arc<dyn DirectoryChildLister>,
    ) -> Result<Self> {
        Self::with_options(
            coordinate,
            root,
            lister,
            VisibilityConfig::default(),
            CancellationToken::new(),
        )
    }

    pub fn with_options(
        coordinate: RepositoryCoordinate,
        root: &str,
        lister: Arc<dyn DirectoryChildLister>,
        config: VisibilityConfig,
        cancel: CancellationToken,
    ) -> Result<Self> {
        config.validate().map_err(VisibilityError::Config)?;
        let scope = ProjectScope::new(root)?;
        let cache =
            DirectoryChildCache::new(coordinate, lister, cancel.clone(), config.lookup_timeout());
        Ok(Self {
            scope,
            cache,
            config,
            cancel,
        })
    }

    pub fn coordinate(&self) -> &RepositoryCoordinate {
        self.cache.coordinate()
    }

    /// Normalized project root, `""` for the whole repository.
    pub fn root(&self) -> &str {
        self.scope.root()
    }

    pub fn config(&self) -> &VisibilityConfig {
        &self.config
    }

    pub fn resolve(&self, candidate: &str) -> ResolvedPath {
        self.scope.resolve(candidate)
    }

    /// Whether `candidate` (relative to the project root) is tracked at this
    /// commit.
    ///
    /// Paths that ascend past the repository root are always excluded. Paths
    /// that leave the project root are excluded when
    /// `restrict_to_project_root` is set and otherwise checked against the
    /// whole repository. Ancestors are probed root-to-leaf and the walk stops
    /// at the first directory that does not list the next segment.
    pub async fn should_include_path(
        &self,
        candidate: &str,
        restrict_to_project_root: bool,
    ) -> Result<bool> {
        let resolved = self.scope.resolve(candidate);
        if resolved.escapes_repo {
            trace!(candidate, "path escapes the repository");
            return Ok(false);
        }
        if resolved.escapes_root && restrict_to_project_root {
            trace!(candidate, "path escapes the project root");
            return Ok(false);
        }
        if resolved.is_repository_root() {
            return Ok(false);
        }

        let mut directory = String::with_capacity(resolved.relative_to_repo_root.len());
        for segment in resolved.segments() {
            let children = self.cache.children_of(&directory).await?;
            if !children.contains(segment) {
                debug!(
                    candidate,
                    directory = %directory,
                    segment,
                    "path is not tracked"
                );
                return Ok(false);
            }
            if !directory.is_empty() {
                directory.push('/');
            }
            directory.push_str(segment);
        }
        Ok(true)
    }

    /// Checks every candidate, at most `max_concurrent_lookups` at a time,
    /// and keeps the tracked ones in input order. The first lookup failure
    /// aborts the batch.
    pub async fn filter_paths<I, S>(
        &self,
        candidates: I,
        restrict_to_project_root: bool,
    ) -> Result<FilterOutcome>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut outcome = FilterOutcome::default();
        let mut checks = stream::iter(candidates.into_iter().map(Into::into))
            .map(|candidate: String| async move {
                let included = self
                    .should_include_path(&candidate, restrict_to_project_root)
                    .await;
                (candidate, included)
            })
            .buffered(self.config.max_concurrent_lookups);

        while let Some((candidate, included)) = checks.next().await {
            outcome.stats.checked += 1;
            if included? {
                outcome.stats.included += 1;
                outcome.included.push(candidate);
            } else {
                outcome.stats.excluded += 1;
            }
        }

        debug!(
            coordinate = %self.coordinate(),
            checked = outcome.stats.checked,
            included = outcome.stats.included,
            "filtered candidate paths"
        );
        Ok(outcome)
    }

    /// Abandons in-flight and future directory fetches.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::ManifestLister;
    use pretty_assertions::assert_eq;

    fn checker(root: &str, files: &[&str]) -> VisibilityChecker {
        VisibilityChecker::new(
            RepositoryCoordinate::new("github.com/acme/app", "f00dcafe"),
            root,
            Arc::new(ManifestLister::from_paths(files.iter().copied())),
        )
        .expect("checker")
    }

    #[tokio::test]
    async fn escaping_paths_never_look_anything_up() {
        let checker = checker("web", &["web/foo.ts"]);

        assert!(!checker.should_include_path("../../etc/passwd", false).await.expect("ok"));
        assert!(!checker.should_include_path("../other.ts", true).await.expect("ok"));
        assert!(!checker.should_include_path("..", false).await.expect("ok"));
        assert_eq!(checker.cache_stats().lookups, 0);
    }

    #[tokio::test]
    async fn leaf_must_be_listed_by_its_parent() {
        let checker = checker("", &["src/lib.rs"]);

        assert!(checker.should_include_path("src/lib.rs", false).await.expect("ok"));
        assert!(checker.should_include_path("src", false).await.expect("ok"));
        assert!(!checker.should_include_path("src/main.rs", false).await.expect("ok"));
        assert!(!checker.should_include_path("src/lib.rs/inner", false).await.expect("ok"));
    }

    #[tokio::test]
    async fn filter_keeps_input_order_and_original_spelling() {
        let checker = checker("web", &["web/a.ts", "web/b.ts", "shared/c.ts"]);

        let outcome = checker
            .filter_paths(["./b.ts", "missing.ts", "a.ts", "../shared/c.ts"], false)
            .await
            .expect("filter");

        assert_eq!(outcome.included, vec!["./b.ts", "a.ts", "../shared/c.ts"]);
        assert_eq!(
            outcome.stats,
            FilterStats {
                checked: 4,
                included: 3,
                excluded: 1,
            }
        );
    }

    #[tokio::test]
    async fn restriction_comes_from_the_call_not_the_config() {
        let config = VisibilityConfig {
            restrict_to_project_root: true,
            ..Default::default()
        };
        let checker = VisibilityChecker::with_options(
            RepositoryCoordinate::new("repo", "abc"),
            "web",
            Arc::new(ManifestLister::from_paths(["web/a.ts", "shared/c.ts"])),
            config,
            CancellationToken::new(),
        )
        .expect("checker");

        assert!(checker.should_include_path("../shared/c.ts", false).await.expect("ok"));
        assert!(!checker.should_include_path("../shared/c.ts", true).await.expect("ok"));

        let outcome = checker
            .filter_paths(["a.ts", "../shared/c.ts"], false)
            .await
            .expect("filter");
        assert_eq!(outcome.included, vec!["a.ts", "../shared/c.ts"]);
    }

    #[test]
    fn rejects_invalid_configuration() {
        let config = VisibilityConfig {
            max_concurrent_lookups: 0,
            ..Default::default()
        };
        let result = VisibilityChecker::with_options(
            RepositoryCoordinate::new("repo", "abc"),
            "",
            Arc::new(ManifestLister::default()),
            config,
            CancellationToken::new(),
        );
        assert!(matches!(result, Err(VisibilityError::Config(_))));
    }

    #[test]
    fn rejects_root_outside_repository() {
        let result = VisibilityChecker::new(
            RepositoryCoordinate::new("repo", "abc"),
            "../elsewhere",
            Arc::new(ManifestLister::default()),
        );
        assert!(matches!(result, Err(VisibilityError::InvalidRoot(_))));
    }
}
