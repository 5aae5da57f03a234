//! Inventory of paths the installer created or took ownership of.
//!
//! Independent of integrity hashing: the inventory answers "what do I remove
//! on uninstall", the integrity records answer "has it changed".

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::utils::fs::{normalize_path_for_storage, read_json_file, write_json_file};

/// Kind of a tracked path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Directory,
}

/// One tracked path. The path itself is the key in [`InventoryDocument`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryEntry {
    pub kind: EntryKind,
    pub component: String,
    pub recorded_at: String,
}

/// On-disk shape of `inventory.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryDocument {
    #[serde(default)]
    pub entries: BTreeMap<String, InventoryEntry>,
}

/// Persistent inventory, keyed by forward-slash path relative to the
/// install root.
#[derive(Debug)]
pub struct Inventory {
    path: PathBuf,
    lock: Mutex<()>,
}

impl Inventory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn guard(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn load(&self) -> Result<InventoryDocument> {
        if !self.path.exists() {
            return Ok(InventoryDocument::default());
        }
        read_json_file(&self.path)
    }

    fn modify<T>(&self, f: impl FnOnce(&mut InventoryDocument) -> T) -> Result<T> {
        let _guard = self.guard();
        let mut doc = self.load()?;
        let result = f(&mut doc);
        write_json_file(&self.path, &doc, true)?;
        Ok(result)
    }

    /// Records (or re-records) one path.
    pub fn record(&self, relative_path: &Path, kind: EntryKind, component: &str) -> Result<()> {
        self.record_many(&[(relative_path.to_path_buf(), kind)], component)
    }

    /// Records several paths owned by `component` in one write.
    pub fn record_many(&self, paths: &[(PathBuf, EntryKind)], component: &str) -> Result<()> {
        if paths.is_empty() {
            return Ok(());
        }
        let now = crate::metadata::timestamp();
        self.modify(|doc| {
            for (relative_path, kind) in paths {
                doc.entries.insert(
                    normalize_path_for_storage(relative_path),
                    InventoryEntry {
                        kind: *kind,
                        component: component.to_string(),
                        recorded_at: now.clone(),
                    },
                );
            }
        })
    }

    /// Forgets `relative_path`. Returns whether it was tracked.
    pub fn remove(&self, relative_path: &Path) -> Result<bool> {
        let key = normalize_path_for_storage(relative_path);
        if !self.load()?.entries.contains_key(&key) {
            return Ok(false);
        }
        self.modify(|doc| doc.entries.remove(&key).is_some())
    }

    pub fn contains(&self, relative_path: &Path) -> Result<bool> {
        Ok(self.load()?.entries.contains_key(&normalize_path_for_storage(relative_path)))
    }

    /// Entries owned by `component`, sorted by path.
    pub fn entries_for(&self, component: &str) -> Result<Vec<(String, InventoryEntry)>> {
        Ok(self
            .load()?
            .entries
            .into_iter()
            .filter(|(_, entry)| entry.component == component)
            .collect())
    }
}
