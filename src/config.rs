//! Command-line configuration file.

use std::path::{Path, PathBuf};

use clap::ValueEnum;
use color_eyre::eyre::{Result, WrapErr};
use serde::{Deserialize, Serialize};

use fmjob_core::{ConflictDecision, ExecutorConfig};
use fmjob_search::SearchSettings;

/// How `cp` and `mv` answer destination conflicts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictPolicy {
    /// Prompt on the terminal.
    #[default]
    Ask,
    Skip,
    Overwrite,
    /// Pick a free "name (N).ext" next to the existing entry.
    Rename,
}

impl ConflictPolicy {
    /// The fixed answer for this policy, or `None` when the user is asked.
    pub fn decision(self) -> Option<ConflictDecision> {
        let decision = match self {
            Self::Ask => return None,
            Self::Skip => ConflictDecision::skip(),
            Self::Overwrite => ConflictDecision::overwrite(),
            Self::Rename => ConflictDecision::rename(None),
        };
        Some(decision.for_all())
    }
}

/// Contents of `config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub executor: ExecutorConfig,
    /// Defaults for `find`; flags given on the command line win.
    pub search: SearchSettings,
    pub on_conflict: ConflictPolicy,
}

impl AppConfig {
    /// `$CONFIG_DIR/fmjob/config.toml`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("fmjob").join("config.toml"))
    }

    /// Load `path` if given, else the default file if it exists, else
    /// built-in defaults. An explicit path that cannot be read is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => match Self::default_path() {
                Some(path) if path.is_file() => Self::from_file(&path),
                _ => Ok(Self::default()),
            },
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("Cannot read config {}", path.display()))?;
        Self::parse(&text).wrap_err_with(|| format!("Invalid config {}", path.display()))
    }

    pub fn parse(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        tracing::debug!(?config, "loaded configuration");
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use fmjob_core::ConflictResolution;
    use fmjob_search::NameMode;
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = AppConfig::parse("").unwrap();
        assert_eq!(config.executor.max_blocking_threads, 512);
        assert_eq!(config.on_conflict, ConflictPolicy::Ask);
        assert!(config.search.recursive);
    }

    #[test]
    fn test_sections() {
        let config = AppConfig::parse(
            r#"
            on_conflict = "rename"

            [executor]
            max_blocking_threads = 8
            thread_name = "copy-pool"

            [search]
            name_mode = "regex"
            show_hidden = true
            chunk_size = 4096
            "#,
        )
        .unwrap();

        assert_eq!(config.on_conflict, ConflictPolicy::Rename);
        assert_eq!(config.executor.max_blocking_threads, 8);
        assert_eq!(config.executor.thread_name, "copy-pool");
        assert_eq!(config.executor.thread_keep_alive_ms, 10_000);
        assert_eq!(config.search.name_mode, NameMode::Regex);
        assert!(config.search.show_hidden);
        assert!(config.search.recursive);
        assert_eq!(config.search.chunk_size, 4096);
    }

    #[test]
    fn test_unknown_policy_is_rejected() {
        assert!(AppConfig::parse(r#"on_conflict = "merge""#).is_err());
    }

    #[test]
    fn test_explicit_path() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(&path, "on_conflict = \"skip\"\n").unwrap();

        let config = AppConfig::load(Some(&path)).unwrap();
        assert_eq!(config.on_conflict, ConflictPolicy::Skip);
        assert!(AppConfig::load(Some(&temp.path().join("missing.toml"))).is_err());
    }

    #[test]
    fn test_policy_decisions() {
        assert!(ConflictPolicy::Ask.decision().is_none());

        let overwrite = ConflictPolicy::Overwrite.decision().unwrap();
        assert_eq!(overwrite.resolution, ConflictResolution::Overwrite);
        assert!(overwrite.apply_to_all);

        let rename = ConflictPolicy::Rename.decision().unwrap();
        assert_eq!(rename.resolution, ConflictResolution::Rename);
        assert_eq!(rename.new_name, None);
    }
}
