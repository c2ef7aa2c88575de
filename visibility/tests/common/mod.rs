#![allow(dead_code)]

use async_trait::async_trait;
use codeintel_visibility::DirectoryChildLister;
use codeintel_visibility::ListChildrenError;
use codeintel_visibility::ManifestLister;
use codeintel_visibility::RepositoryCoordinate;
use codeintel_visibility::VisibilityChecker;
use codeintel_visibility::VisibilityConfig;
use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Simulated tree that records every lookup it serves.
///
/// Directories can be scripted to fail a number of times, or held until a
/// gate token is cancelled.
#[derive(Default)]
pub struct RecordingLister {
    tree: ManifestLister,
    calls: Mutex<HashMap<String, usize>>,
    failures: Mutex<HashMap<String, usize>>,
    gates: Mutex<HashMap<String, CancellationToken>>,
}

impl RecordingLister {
    pub fn new(files: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            tree: ManifestLister::from_paths(files.iter().copied()),
            ..Default::default()
        })
    }

    /// Fail the next `times` lookups of `directory`.
    pub fn fail(&self, directory: &str, times: usize) {
        lock(&self.failures).insert(directory.to_string(), times);
    }

    /// Hold lookups of `directory` until the returned token is cancelled.
    pub fn hold(&self, directory: &str) -> CancellationToken {
        let gate = CancellationToken::new();
        lock(&self.gates).insert(directory.to_string(), gate.clone());
        gate
    }

    pub fn calls(&self, directory: &str) -> usize {
        lock(&self.calls).get(directory).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        lock(&self.calls).values().sum()
    }
}

#[async_trait]
impl DirectoryChildLister for RecordingLister {
    async fn list_children(
        &self,
        repository: &RepositoryCoordinate,
        directory: &str,
    ) -> Result<HashSet<String>, ListChildrenError> {
        *lock(&self.calls).entry(directory.to_string()).or_insert(0) += 1;

        let gate = lock(&self.gates).get(directory).cloned();
        if let Some(gate) = gate {
            gate.cancelled().await;
        }

        let should_fail = {
            let mut failures = lock(&self.failures);
            match failures.get_mut(directory) {
                Some(left) if *left > 0 => {
                    *left -= 1;
                    true
                }
                _ => false,
            }
        };
        if should_fail {
            return Err(ListChildrenError::Unavailable {
                coordinate: repository.clone(),
                message: format!("gitserver refused listing of `{directory}`"),
            });
        }

        self.tree.list_children(repository, directory).await
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

pub fn coordinate() -> RepositoryCoordinate {
    RepositoryCoordinate::new("github.com/acme/monorepo", "4f1c0a7e9b")
}

pub fn checker(root: &str, lister: Arc<RecordingLister>) -> VisibilityChecker {
    VisibilityChecker::new(coordinate(), root, lister).expect("checker")
}

pub fn checker_with(
    root: &str,
    lister: Arc<RecordingLister>,
    config: VisibilityConfig,
    cancel: CancellationToken,
) -> VisibilityChecker {
    VisibilityChecker::with_options(coordinate(), root, lister, config, cancel).expect("checker")
}

/// Waits until the checker's cache has registered `at_least` lookups, so
/// every spawned caller is attached to a fetch before a gate opens.
pub async fn wait_for_lookups(checker: &VisibilityChecker, at_least: u64) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while checker.cache_stats().lookups < at_least {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("callers never reached the cache");
}
