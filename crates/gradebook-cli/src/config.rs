//! CLI configuration.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Top-level gradebook configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradebookConfig {
    /// JSON file holding quizzes, rubrics, and grades.
    #[serde(default = "default_gradebook_path")]
    pub gradebook_path: PathBuf,
    /// Roster file, or a directory of roster files.
    #[serde(default)]
    pub roster_path: Option<PathBuf>,
    /// Reject drafts that leave rubric criteria unscored.
    #[serde(default)]
    pub strict_criteria: bool,
    /// Log a notification after publish and reject.
    #[serde(default = "default_true")]
    pub notify: bool,
    /// Max concurrent publishes in a batch.
    #[serde(default = "default_parallelism")]
    pub parallelism: usize,
}

fn default_gradebook_path() -> PathBuf {
    PathBuf::from("gradebook.json")
}
fn default_true() -> bool {
    true
}
fn default_parallelism() -> usize {
    4
}

impl Default for GradebookConfig {
    fn default() -> Self {
        Self {
            gradebook_path: default_gradebook_path(),
            roster_path: None,
            strict_criteria: false,
            notify: true,
            parallelism: default_parallelism(),
        }
    }
}

/// Resolve environment variable references like `${VAR_NAME}` in a string.
fn resolve_env_vars(s: &str) -> String {
    let mut result = s.to_string();
    while let Some(start) = result.find("${") {
        if let Some(end) = result[start..].find('}') {
            let var_name = &result[start + 2..start + end];
            let value = std::env::var(var_name).unwrap_or_default();
            result = format!(
                "{}{}{}",
                &result[..start],
                value,
                &result[start + end + 1..]
            );
        } else {
            break;
        }
    }
    result
}

fn resolve_path(path: &Path) -> PathBuf {
    PathBuf::from(resolve_env_vars(&path.to_string_lossy()))
}

/// Load config from an explicit path, or search the default locations.
///
/// Search order:
/// 1. `gradebook.toml` in the current directory
/// 2. `~/.config/gradebook/config.toml`
///
/// Environment variable overrides: `GRADEBOOK_PATH`, `GRADEBOOK_ROSTER`.
pub fn load_config_from(path: Option<&Path>) -> Result<GradebookConfig> {
    let config_path = if let Some(p) = path {
        if p.exists() {
            Some(p.to_path_buf())
        } else {
            anyhow::bail!("config file not found: {}", p.display());
        }
    } else {
        let local = PathBuf::from("gradebook.toml");
        if local.exists() {
            Some(local)
        } else {
            dirs_path()
                .map(|dir| dir.join("config.toml"))
                .filter(|global| global.exists())
        }
    };

    let mut config = match config_path {
        Some(path) => {
            tracing::debug!("loading config from {}", path.display());
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            toml::from_str::<GradebookConfig>(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?
        }
        None => GradebookConfig::default(),
    };

    if let Ok(path) = std::env::var("GRADEBOOK_PATH") {
        config.gradebook_path = PathBuf::from(path);
    }
    if let Ok(path) = std::env::var("GRADEBOOK_ROSTER") {
        config.roster_path = Some(PathBuf::from(path));
    }

    config.gradebook_path = resolve_path(&config.gradebook_path);
    config.roster_path = config.roster_path.as_deref().map(resolve_path);

    anyhow::ensure!(config.parallelism >= 1, "parallelism must be at least 1");
    Ok(config)
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("gradebook"))
}
