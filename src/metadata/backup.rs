//! Timestamped Settings Document backups with bounded retention.

use anyhow::{Context, Result};
use chrono::Utc;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, warn};

use crate::constants::SETTINGS_BACKUP_PREFIX;
use crate::utils::fs::{atomic_write, ensure_dir};

/// Backup directory plus retention limit.
#[derive(Debug, Clone)]
pub struct SettingsBackups {
    dir: PathBuf,
    retention: usize,
}

impl SettingsBackups {
    pub fn new(dir: impl Into<PathBuf>, retention: usize) -> Self {
        Self {
            dir: dir.into(),
            retention: retention.max(1),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Copies `source` into the backup directory, then prunes.
    ///
    /// Returns `None` when there is nothing to back up.
    pub fn backup(&self, source: &Path) -> Result<Option<PathBuf>> {
        if !source.is_file() {
            return Ok(None);
        }

        ensure_dir(&self.dir)?;
        let content = fs::read(source)
            .with_context(|| format!("Failed to read settings for backup: {}", source.display()))?;

        let stamp = Utc::now().format("%Y%m%d_%H%M%S_%6f");
        let mut backup_path = self.dir.join(format!("{SETTINGS_BACKUP_PREFIX}{stamp}.json"));
        let mut suffix = 1;
        while backup_path.exists() {
            backup_path = self.dir.join(format!("{SETTINGS_BACKUP_PREFIX}{stamp}_{suffix}.json"));
            suffix += 1;
        }

        // Written fresh rather than fs::copy so the backup's mtime is its creation time
        atomic_write(&backup_path, &content).with_context(|| {
            format!("Failed to create backup of settings at: {}", backup_path.display())
        })?;
        debug!(backup = %backup_path.display(), "Backed up settings");

        self.prune()?;
        Ok(Some(backup_path))
    }

    /// Deletes all but the newest `retention` backups.
    ///
    /// Age is the modification time; equal times fall back to the file name,
    /// which embeds the creation timestamp.
    pub fn prune(&self) -> Result<usize> {
        let backups = self.list()?;
        if backups.len() <= self.retention {
            return Ok(0);
        }

        let excess = backups.len() - self.retention;
        let mut removed = 0;
        for old in backups.into_iter().take(excess) {
            match fs::remove_file(&old) {
                Ok(()) => {
                    debug!(backup = %old.display(), "Pruned settings backup");
                    removed += 1;
                }
                Err(e) => warn!(backup = %old.display(), error = %e, "Failed to prune settings backup"),
            }
        }
        Ok(removed)
    }

    /// Existing backups, oldest first.
    pub fn list(&self) -> Result<Vec<PathBuf>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let mut entries: Vec<(SystemTime, PathBuf)> = Vec::new();
        for entry in fs::read_dir(&self.dir)
            .with_context(|| format!("Failed to read backup directory: {}", self.dir.display()))?
        {
            let entry = entry?;
            let path = entry.path();
            let is_backup = path.file_name().and_then(|n| n.to_str()).is_some_and(|n| {
                n.starts_with(SETTINGS_BACKUP_PREFIX) && n.ends_with(".json")
            });
            if !is_backup || !path.is_file() {
                continue;
            }
            let modified = entry.metadata()?.modified().unwrap_or(SystemTime::UNIX_EPOCH);
            entries.push((modified, path));
        }

        entries.sort();
        Ok(entries.into_iter().map(|(_, path)| path).collect())
    }
}
