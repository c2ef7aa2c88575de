use crate::lister::DirectoryChildLister;
use crate::lister::ListChildrenError;
use crate::lister::RepositoryCoordinate;
use async_trait::async_trait;
use std::collections::HashSet;
use std::path::Path;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;
use tracing::trace;

/// Lists directory children with `git ls-tree` against a local clone.
///
/// Directories are passed as literal pathspecs and listed from the top of the
/// tree, so names such as `:foo` or `*` and a `repo_dir` inside a
/// subdirectory of the clone do not change what is listed.
///
/// The repository id of the coordinate is only used for diagnostics; every
/// lookup reads from `repo_dir`.
#[derive(Debug, Clone)]
pub struct GitTreeLister {
    repo_dir: PathBuf,
}

impl GitTreeLister {
    pub fn new(repo_dir: impl Into<PathBuf>) -> Self {
        Self {
            repo_dir: repo_dir.into(),
        }
    }

    pub fn repo_dir(&self) -> &Path {
        &self.repo_dir
    }
}

#[async_trait]
impl DirectoryChildLister for GitTreeLister {
    async fn list_children(
        &self,
        repository: &RepositoryCoordinate,
        directory: &str,
    ) -> Result<HashSet<String>, ListChildrenError> {
        let mut command = Command::new("git");
        command
            .arg("ls-tree")
            .arg("--full-tree")
            .arg("--name-only")
            .arg("-z")
            .arg(&repository.commit);
        if !directory.is_empty() {
            command.arg("--").arg(format!("{directory}/"));
        }
        command
            .current_dir(&self.repo_dir)
            .env("GIT_LITERAL_PATHSPECS", "1")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        trace!(%repository, directory, "running git ls-tree");
        let output = command.output().await?;
        if !output.status.success() {
            return Err(ListChildrenError::Command {
                command: format!("git ls-tree {} {directory}", repository.commit),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(parse_ls_tree_names(&output.stdout))
    }
}

/// `ls-tree` prints paths relative to the repository root; keep the last
/// component of each NUL-terminated entry.
fn parse_ls_tree_names(stdout: &[u8]) -> HashSet<String> {
    stdout
        .split(|byte| *byte == 0)
        .filter(|entry| !entry.is_empty())
        .filter_map(|entry| {
            let path = String::from_utf8_lossy(entry);
            let name = path.trim_end_matches('/').rsplit('/').next()?;
            if name.is_empty() {
                None
            } else {
                Some(name.to_string())
            }
        })
        .collect()
}
