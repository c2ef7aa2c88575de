use anyhow::Context;
use anyhow::Result;
use clap::Parser;
use codeintel_visibility::DirectoryChildLister;
use codeintel_visibility::GitTreeLister;
use codeintel_visibility::ManifestLister;
use codeintel_visibility::RepositoryCoordinate;
use codeintel_visibility::VisibilityChecker;
use codeintel_visibility::VisibilityConfig;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Keep only the indexer-emitted paths that are tracked at a commit.
///
/// Candidate paths are read one per line (relative to `--root`) and the
/// retained ones are written to stdout unchanged.
#[derive(Debug, Parser)]
#[command(name = "codeintel-visibility", version)]
pub struct VisibilityCli {
    /// Local clone to read the commit's tree from with `git ls-tree`
    #[arg(
        long,
        value_name = "DIR",
        conflicts_with = "manifest",
        required_unless_present = "manifest"
    )]
    pub repo: Option<PathBuf>,

    /// File listing every tracked path at the commit, one per line
    #[arg(long, value_name = "FILE")]
    pub manifest: Option<PathBuf>,

    /// Commit to validate against
    #[arg(long, default_value = "HEAD")]
    pub commit: String,

    /// Repository identifier used in diagnostics (defaults to the clone's
    /// directory name)
    #[arg(long, value_name = "ID")]
    pub repository_id: Option<String>,

    /// Project root inside the repository that candidate paths are relative to
    #[arg(long, default_value = "")]
    pub root: String,

    /// Reject paths that leave the project root even if they are tracked
    #[arg(long)]
    pub restrict_to_project_root: bool,

    /// Maximum number of paths checked concurrently
    #[arg(long, value_name = "N")]
    pub concurrency: Option<usize>,

    /// TOML configuration file
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// File with candidate paths (reads stdin when omitted)
    #[arg(long, value_name = "FILE")]
    pub paths: Option<PathBuf>,
}

impl VisibilityCli {
    pub async fn run(self) -> Result<()> {
        let config = self.load_config()?;
        let restrict = self.restrict_to_project_root || config.restrict_to_project_root;
        let (coordinate, lister) = self.build_lister().await?;

        let cancel = CancellationToken::new();
        let checker = VisibilityChecker::with_options(
            coordinate,
            &self.root,
            lister,
            config,
            cancel.clone(),
        )
        .context("failed to create visibility checker")?;

        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        });

        let input = read_candidates(self.paths.as_deref()).await?;
        let candidates = input
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty());

        let outcome = checker
            .filter_paths(candidates, restrict)
            .await
            .context("failed to determine path visibility")?;

        let mut stdout = tokio::io::stdout();
        for path in &outcome.included {
            stdout.write_all(path.as_bytes()).await?;
            stdout.write_all(b"\n").await?;
        }
        stdout.flush().await?;

        let cache = checker.cache_stats();
        info!(
            coordinate = %checker.coordinate(),
            root = checker.root(),
            checked = outcome.stats.checked,
            included = outcome.stats.included,
            excluded = outcome.stats.excluded,
            directory_fetches = cache.fetches,
            "visibility check complete"
        );
        Ok(())
    }

    fn load_config(&self) -> Result<VisibilityConfig> {
        let mut config = match &self.config {
            Some(path) => VisibilityConfig::load(path)
                .with_context(|| format!("failed to load config {}", path.display()))?,
            None => VisibilityConfig::default(),
        };
        if let Some(concurrency) = self.concurrency {
            config.max_concurrent_lookups = concurrency;
        }
        config
            .validate()
            .map_err(|err| anyhow::anyhow!("invalid configuration: {err}"))?;
        Ok(config)
    }

    async fn build_lister(&self) -> Result<(RepositoryCoordinate, Arc<dyn DirectoryChildLister>)> {
        if let Some(manifest) = &self.manifest {
            let contents = tokio::fs::read_to_string(manifest)
                .await
                .with_context(|| format!("failed to read manifest {}", manifest.display()))?;
            let lister = ManifestLister::parse(&contents);
            let repository_id = self
                .repository_id
                .clone()
                .unwrap_or_else(|| display_name(manifest));
            info!(
                directories = lister.directory_count(),
                "loaded tracked-file manifest"
            );
            return Ok((
                RepositoryCoordinate::new(repository_id, self.commit.clone()),
                Arc::new(lister),
            ));
        }

        let repo = self
            .repo
            .as_deref()
            .context("either --repo or --manifest is required")?;
        let repository_id = self
            .repository_id
            .clone()
            .unwrap_or_else(|| display_name(repo));
        Ok((
            RepositoryCoordinate::new(repository_id, self.commit.clone()),
            Arc::new(GitTreeLister::new(repo)),
        ))
    }
}

async fn read_candidates(path: Option<&Path>) -> Result<String> {
    match path {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read candidate paths from {}", path.display())),
        None => {
            let mut input = String::new();
            tokio::io::stdin()
                .read_to_string(&mut input)
                .await
                .context("failed to read candidate paths from stdin")?;
            Ok(input)
        }
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}
