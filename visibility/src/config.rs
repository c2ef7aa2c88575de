use crate::error::Result;
use crate::error::VisibilityError;
use serde::Deserialize;
use serde::Serialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Tuning knobs for one visibility checker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VisibilityConfig {
    /// Maximum number of paths checked concurrently by `filter_paths`
    #[serde(default = "default_max_concurrent_lookups")]
    pub max_concurrent_lookups: usize,

    /// Per-directory lookup timeout in milliseconds
    #[serde(default)]
    pub lookup_timeout_ms: Option<u64>,

    /// Default for rejecting paths that resolve outside the project root.
    ///
    /// The checker does not read this field; callers pass the flag to
    /// `should_include_path` and `filter_paths` themselves. The CLI passes
    /// this value or'ed with `--restrict-to-project-root`.
    #[serde(default)]
    pub restrict_to_project_root: bool,
}

fn default_max_concurrent_lookups() -> usize {
    std::thread::available_parallelism()
        .map(|value| value.get().clamp(2, 16))
        .unwrap_or(4)
}

impl Default for VisibilityConfig {
    fn default() -> Self {
        Self {
            max_concurrent_lookups: default_max_concurrent_lookups(),
            lookup_timeout_ms: None,
            restrict_to_project_root: false,
        }
    }
}

impl VisibilityConfig {
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(contents).map_err(|err| VisibilityError::Config(err.to_string()))?;
        config.validate().map_err(VisibilityError::Config)?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|err| {
            VisibilityError::Config(format!("failed to read {}: {err}", path.display()))
        })?;
        Self::from_toml_str(&contents)
    }

    /// Validate configuration
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.max_concurrent_lookups == 0 {
            return Err("max_concurrent_lookups must be > 0".to_string());
        }

        if self.lookup_timeout_ms == Some(0) {
            return Err("lookup_timeout_ms must be > 0 when set".to_string());
        }

        Ok(())
    }

    pub fn lookup_timeout(&self) -> Option<Duration> {
        self.lookup_timeout_ms.map(Duration::from_millis)
    }
}
