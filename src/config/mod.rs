//! Installer configuration (`~/.crew/config.toml`).
//!
//! Every field is optional; command-line flags override the file, and the
//! file overrides the built-in defaults.
//!
//! ```toml
//! install_dir = "~/.claude"
//! source_dir = "$HOME/src/crew-framework"
//! backup_retention = 10
//! max_parallel = 4
//! staged_commit = true
//! ```
//!
//! The file location can be overridden with the `CREW_CONFIG` environment
//! variable or the `--config` flag. Paths go through `~` and environment
//! variable expansion.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

use crate::constants::{DEFAULT_BACKUP_RETENTION, DEFAULT_MAX_PARALLEL};
use crate::core::InstallerError;
use crate::utils::fs::expand_path;

/// Environment variable naming an alternative config file.
pub const CONFIG_ENV_VAR: &str = "CREW_CONFIG";

/// Install root used when neither the file nor a flag names one.
pub const DEFAULT_INSTALL_DIR: &str = "~/.claude";

const fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InstallerConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub install_dir: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_dir: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup_retention: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_parallel: Option<usize>,

    /// Stage component files and move them into place only when all were
    /// written.
    #[serde(default = "default_true")]
    pub staged_commit: bool,
}

impl Default for InstallerConfig {
    fn default() -> Self {
        Self {
            install_dir: None,
            source_dir: None,
            backup_retention: None,
            max_parallel: None,
            staged_commit: true,
        }
    }
}

impl InstallerConfig {
    /// Loads from `path`, else `CREW_CONFIG`, else the default location.
    ///
    /// A missing file yields the defaults; an explicit path that does not
    /// exist is an error.
    pub async fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load_from(path).await;
        }
        let path = match std::env::var_os(CONFIG_ENV_VAR) {
            Some(value) => PathBuf::from(value),
            None => Self::default_path()?,
        };
        if path.exists() {
            Self::load_from(&path).await
        } else {
            debug!(path = %path.display(), "No installer config, using defaults");
            Ok(Self::default())
        }
    }

    pub async fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read installer config from {}", path.display()))?;

        let config: Self = toml::from_str(&content).map_err(|e| InstallerError::ConfigError {
            message: format!("{}: {}", path.display(), e.message()),
        })?;
        config.validate()?;
        debug!(path = %path.display(), "Loaded installer config");
        Ok(config)
    }

    pub async fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }
        let content = toml::to_string_pretty(self).context("Failed to serialize installer config")?;
        fs::write(path, content)
            .await
            .with_context(|| format!("Failed to write installer config to {}", path.display()))
    }

    /// `~/.crew/config.toml`.
    pub fn default_path() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| anyhow::anyhow!("Unable to determine home directory"))?;
        Ok(home.join(".crew").join("config.toml"))
    }

    fn validate(&self) -> Result<(), InstallerError> {
        if self.backup_retention == Some(0) {
            return Err(InstallerError::ConfigError {
                message: "backup_retention must be at least 1".to_string(),
            });
        }
        if self.max_parallel == Some(0) {
            return Err(InstallerError::ConfigError {
                message: "max_parallel must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Install root: `flag`, else the configured directory, else `~/.claude`.
    pub fn install_dir(&self, flag: Option<&str>) -> Result<PathBuf> {
        let raw = flag.or(self.install_dir.as_deref()).unwrap_or(DEFAULT_INSTALL_DIR);
        expand_path(raw)
    }

    /// Framework source tree: `flag`, else the configured directory, else the
    /// current directory.
    pub fn source_dir(&self, flag: Option<&str>) -> Result<PathBuf> {
        match flag.or(self.source_dir.as_deref()) {
            Some(raw) => expand_path(raw),
            None => std::env::current_dir().context("Failed to determine current directory"),
        }
    }

    pub fn backup_retention(&self) -> usize {
        self.backup_retention.unwrap_or(DEFAULT_BACKUP_RETENTION)
    }

    /// `flag`, else the configured value, else sequential. Never zero.
    pub fn max_parallel(&self, flag: Option<usize>) -> usize {
        flag.or(self.max_parallel).unwrap_or(DEFAULT_MAX_PARALLEL).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_defaults() {
        let config = InstallerConfig::default();
        assert!(config.staged_commit);
        assert_eq!(config.backup_retention(), DEFAULT_BACKUP_RETENTION);
        assert_eq!(config.max_parallel(None), 1);
        assert_eq!(config.max_parallel(Some(0)), 1);
    }

    #[tokio::test]
    async fn test_round_trip_and_missing_staged_flag() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(&path, "install_dir = \"/opt/crew/root\"\nmax_parallel = 3\n").unwrap();

        let config = InstallerConfig::load_from(&path).await.unwrap();
        assert!(config.staged_commit);
        assert_eq!(config.max_parallel(None), 3);
        assert_eq!(config.max_parallel(Some(2)), 2);
        assert_eq!(config.install_dir(None).unwrap(), PathBuf::from("/opt/crew/root"));
        assert_eq!(config.install_dir(Some("/srv/x")).unwrap(), PathBuf::from("/srv/x"));

        let copy = temp.path().join("nested").join("copy.toml");
        config.save_to(&copy).await.unwrap();
        assert_eq!(InstallerConfig::load_from(&copy).await.unwrap(), config);
    }

    #[tokio::test]
    async fn test_invalid_values_rejected() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("config.toml");

        std::fs::write(&path, "backup_retention = 0\n").unwrap();
        assert!(InstallerConfig::load_from(&path).await.is_err());

        std::fs::write(&path, "unknown_key = true\n").unwrap();
        let err = InstallerConfig::load_from(&path).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<InstallerError>(),
            Some(InstallerError::ConfigError { .. })
        ));
    }

    #[tokio::test]
    #[serial]
    async fn test_env_override() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("from-env.toml");
        std::fs::write(&path, "source_dir = \"$CREW_TEST_SOURCE/framework\"\n").unwrap();

        // SAFETY: serialized with other env-mutating tests
        unsafe {
            std::env::set_var(CONFIG_ENV_VAR, &path);
            std::env::set_var("CREW_TEST_SOURCE", "/data");
        }
        let config = InstallerConfig::load(None).await;
        let source = config.as_ref().ok().map(|c| c.source_dir(None));
        unsafe {
            std::env::remove_var(CONFIG_ENV_VAR);
            std::env::remove_var("CREW_TEST_SOURCE");
        }

        assert_eq!(source.unwrap().unwrap(), PathBuf::from("/data/framework"));
    }

    #[tokio::test]
    async fn test_explicit_missing_path_is_error() {
        let temp = tempdir().unwrap();
        assert!(InstallerConfig::load(Some(&temp.path().join("absent.toml"))).await.is_err());
    }
}
