/*!
# Path Visibility

Decides whether paths emitted by a code-intelligence indexer are tracked in a
repository at a specific commit, before their data is persisted.

## Features

- **Lexical resolution**: candidate paths are joined onto the project root and
  normalized without touching any filesystem
- **Ancestor walk**: directories are probed root-to-leaf and the walk stops
  at the first untracked ancestor, so `node_modules` is never listed
- **Per-job memoization**: each directory is fetched at most once per checker,
  and concurrent callers share a single in-flight fetch
- **Cooperative cancellation**: fetches race the job's `CancellationToken`

## Example

```rust,no_run
use codeintel_visibility::{GitTreeLister, RepositoryCoordinate, VisibilityChecker};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let checker = VisibilityChecker::new(
        RepositoryCoordinate::new("github.com/acme/app", "HEAD"),
        "web",
        Arc::new(GitTreeLister::new("/srv/clones/acme-app")),
    )?;

    if checker.should_include_path("src/index.ts", false).await? {
        println!("tracked");
    }
    Ok(())
}
```
*/

mod cache;
mod checker;
mod config;
mod error;
mod git;
mod lister;
mod manifest;
mod path;

pub use cache::{CacheStats, ChildNames, DirectoryChildCache};
pub use checker::{FilterOutcome, FilterStats, VisibilityChecker};
pub use config::VisibilityConfig;
pub use error::{Result, VisibilityError};
pub use git::GitTreeLister;
pub use lister::{DirectoryChildLister, ListChildrenError, RepositoryCoordinate};
pub use manifest::ManifestLister;
pub use path::{ProjectScope, ResolvedPath, resolve_path};
