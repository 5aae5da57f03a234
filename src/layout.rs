//! On-disk layout of an install root.
//!
//! ```text
//! <root>/
//!   <component files>                          commands/, hooks/, agents/, ...
//!   .crew/config/crew-metadata.json            Unified Metadata Document
//!   .crew/config/inventory.json                installer inventory
//!   .crew/backups/settings/settings_<ts>.json  settings backups
//!   .crew/staging/                             staged component batches
//!   settings.json                              Settings Document
//! ```

use std::path::{Path, PathBuf};

use crate::constants::{CREW_DIR, INVENTORY_FILE, METADATA_FILE, SETTINGS_FILE};

/// Resolves every installer-owned path below one install root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallLayout {
    root: PathBuf,
}

impl InstallLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The installer's private directory.
    pub fn crew_dir(&self) -> PathBuf {
        self.root.join(CREW_DIR)
    }

    pub fn config_dir(&self) -> PathBuf {
        self.crew_dir().join("config")
    }

    pub fn metadata_file(&self) -> PathBuf {
        self.config_dir().join(METADATA_FILE)
    }

    pub fn inventory_file(&self) -> PathBuf {
        self.config_dir().join(INVENTORY_FILE)
    }

    pub fn settings_file(&self) -> PathBuf {
        self.root.join(SETTINGS_FILE)
    }

    pub fn settings_backup_dir(&self) -> PathBuf {
        self.crew_dir().join("backups").join("settings")
    }

    pub fn staging_dir(&self) -> PathBuf {
        self.crew_dir().join("staging")
    }

    /// Path of `target` relative to the root, if it lies below it.
    pub fn relative<'a>(&self, target: &'a Path) -> Option<&'a Path> {
        target.strip_prefix(&self.root).ok()
    }

    /// Whether `path` is inside the installer's private directory.
    pub fn is_private(&self, path: &Path) -> bool {
        path.starts_with(self.crew_dir())
    }
}
