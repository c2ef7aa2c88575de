use crate::error::Result;
use crate::error::VisibilityError;
use crate::lister::DirectoryChildLister;
use crate::lister::RepositoryCoordinate;
use codeintel_async_utils::OrCancelExt;
use futures::FutureExt;
use futures::future::BoxFuture;
use futures::future::Shared;
use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::warn;

pub type ChildNames = Arc<HashSet<String>>;

type SharedFetch = Shared<BoxFuture<'static, Result<ChildNames>>>;
type SlotTable = Arc<Mutex<HashMap<String, Slot>>>;

enum Slot {
    Ready(ChildNames),
    Pending { generation: u64, fetch: SharedFetch },
}

/// Point-in-time counters for one cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Calls to `children_of`
    pub lookups: u64,
    /// Lookups served from a completed entry
    pub hits: u64,
    /// Lookups that attached to another caller's in-flight fetch
    pub coalesced: u64,
    /// Calls issued to the underlying lister
    pub fetches: u64,
    /// Fetches that failed, timed out, or were cancelled
    pub failures: u64,
}

#[derive(Debug, Default)]
struct Counters {
    lookups: AtomicU64,
    hits: AtomicU64,
    coalesced: AtomicU64,
    fetches: AtomicU64,
    failures: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> CacheStats {
        CacheStats {
            lookups: self.lookups.load(Ordering::Relaxed),
            hits: self.hits.load(Ordering::Relaxed),
            coalesced: self.coalesced.load(Ordering::Relaxed),
            fetches: self.fetches.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }
}

/// Memoizes directory listings for one repository commit.
///
/// Each directory is fetched at most once while it succeeds; concurrent
/// callers for the same directory share one in-flight fetch. Failures are
/// delivered to every waiter of that fetch and then forgotten so the next
/// call fetches again. The table lock is never held across an await.
pub struct DirectoryChildCache {
    coordinate: Arc<RepositoryCoordinate>,
    lister: Arc<dyn DirectoryChildLister>,
    cancel: CancellationToken,
    lookup_timeout: Option<Duration>,
    slots: SlotTable,
    next_generation: AtomicU64,
    counters: Arc<Counters>,
}

impl DirectoryChildCache {
    pub fn new(
        coordinate: RepositoryCoordinate,
        lister: Arc<dyn DirectoryChildLister>,
        cancel: CancellationToken,
        lookup_timeout: Option<Duration>,
    ) -> Self {
        Self {
            coordinate: Arc::new(coordinate),
            lister,
            cancel,
            lookup_timeout,
            slots: Arc::new(Mutex::new(HashMap::new())),
            next_generation: AtomicU64::new(0),
            counters: Arc::new(Counters::default()),
        }
    }

    pub fn coordinate(&self) -> &RepositoryCoordinate {
        &self.coordinate
    }

    /// Immediate child names of `directory` (`""` is the repository root).
    pub async fn children_of(&self, directory: &str) -> Result<ChildNames> {
        let fetch = {
            let mut slots = lock(&self.slots);
            Counters::bump(&self.counters.lookups);
            match slots.get(directory) {
                Some(Slot::Ready(children)) => {
                    Counters::bump(&self.counters.hits);
                    return Ok(Arc::clone(children));
                }
                Some(Slot::Pending { fetch, .. }) => {
                    Counters::bump(&self.counters.coalesced);
                    debug!(directory, "joining in-flight directory fetch");
                    fetch.clone()
                }
                None => {
                    let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
                    let fetch = self.start_fetch(directory, generation);
                    slots.insert(
                        directory.to_string(),
                        Slot::Pending {
                            generation,
                            fetch: fetch.clone(),
                        },
                    );
                    fetch
                }
            }
        };
        fetch.await
    }

    /// Number of directories with a completed listing.
    pub fn cached_directories(&self) -> usize {
        lock(&self.slots)
            .values()
            .filter(|slot| matches!(slot, Slot::Ready(_)))
            .count()
    }

    pub fn stats(&self) -> CacheStats {
        self.counters.snapshot()
    }

    fn start_fetch(&self, directory: &str, generation: u64) -> SharedFetch {
        let coordinate = Arc::clone(&self.coordinate);
        let lister = Arc::clone(&self.lister);
        let slots = Arc::clone(&self.slots);
        let counters = Arc::clone(&self.counters);
        let cancel = self.cancel.clone();
        let lookup_timeout = self.lookup_timeout;
        let directory = directory.to_string();

        async move {
            Counters::bump(&counters.fetches);
            debug!(%coordinate, directory = %directory, "fetching directory children");

            let lookup = async {
                let listing = lister.list_children(&coordinate, &directory);
                match lookup_timeout {
                    Some(after) => match tokio::time::timeout(after, listing).await {
                        Ok(result) => {
                            result.map_err(|source| VisibilityError::lookup(&directory, source))
                        }
                        Err(_) => Err(VisibilityError::timeout(&directory, after)),
                    },
                    None => listing
                        .await
                        .map_err(|source| VisibilityError::lookup(&directory, source)),
                }
            };
            let result = match lookup.or_cancel(&cancel).await {
                Ok(result) => result.map(Arc::new),
                Err(_) => Err(VisibilityError::cancelled(&directory)),
            };

            {
                let mut slots = lock(&slots);
                let still_pending = matches!(
                    slots.get(&directory),
                    Some(Slot::Pending { generation: current, .. }) if *current == generation
                );
                if still_pending {
                    match &result {
                        Ok(children) => {
                            slots.insert(directory.clone(), Slot::Ready(Arc::clone(children)));
                        }
                        Err(_) => {
                            slots.remove(&directory);
                        }
                    }
                }
            }

            if let Err(err) = &result {
                Counters::bump(&counters.failures);
                warn!(%coordinate, directory = %directory, "directory lookup failed: {err}");
            }
            result
        }
        .boxed()
        .shared()
    }
}

fn lock(slots: &Mutex<HashMap<String, Slot>>) -> MutexGuard<'_, HashMap<String, Slot>> {
    match slots.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
