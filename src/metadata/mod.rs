//! Metadata Store: durable, mergeable installation state.
//!
//! Two JSON documents live under an install root:
//!
//! - the **Unified Metadata Document** (`.crew/config/crew-metadata.json`),
//!   the only durable record of installed components, versions and integrity
//!   hashes ([`UnifiedMetadata`])
//! - the **Settings Document** (`settings.json`), user-facing preferences
//!   that may still carry legacy installer fields until
//!   [`MetadataStore::migrate_metadata`] moves them out
//!
//! Every read-merge-write cycle runs under the store's mutex, so components
//! installed concurrently never drop each other's updates. Settings writes
//! that replace an existing file are preceded by a timestamped backup.
//!
//! # Examples
//!
//! ```rust,no_run
//! use crew_installer::metadata::MetadataStore;
//! use serde_json::json;
//!
//! # fn example() -> anyhow::Result<()> {
//! let store = MetadataStore::new("/home/user/.claude");
//! store.add_component_registration("core", "4.1.0", Some("core"))?;
//! store.update_metadata(json!({"features": {"mcp": true}}))?;
//! assert!(store.is_component_installed("core")?);
//! # Ok(())
//! # }
//! ```

pub mod backup;
pub mod document;
pub mod dot_path;
pub mod integrity;
pub mod merge;

pub use backup::SettingsBackups;
pub use document::{
    ComponentRecord, FileHashRecord, FrameworkInfo, InstallationInfo, IntegrityState,
    UnifiedMetadata,
};
pub use integrity::{FileStatus, IntegrityReport, infer_component};
pub use merge::{Merge, deep_merge};

use anyhow::{Context, Result};
use chrono::Utc;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, info};

use crate::constants::{
    DEFAULT_BACKUP_RETENTION, FRAMEWORK_RELEASE_DATE, FRAMEWORK_VERSION, INSTALLER_VERSION,
    LEGACY_SETTINGS_KEYS,
};
use crate::core::InstallerError;
use crate::layout::InstallLayout;
use crate::utils::fs::{normalize_path_for_storage, read_json_file, write_json_file};

pub(crate) fn timestamp() -> String {
    Utc::now().to_rfc3339()
}

/// Access to the metadata and settings documents of one install root.
#[derive(Debug)]
pub struct MetadataStore {
    layout: InstallLayout,
    backups: SettingsBackups,
    lock: Mutex<()>,
}

impl MetadataStore {
    pub fn new(install_root: impl Into<PathBuf>) -> Self {
        Self::with_retention(install_root, DEFAULT_BACKUP_RETENTION)
    }

    /// Store keeping at most `retention` settings backups.
    pub fn with_retention(install_root: impl Into<PathBuf>, retention: usize) -> Self {
        let layout = InstallLayout::new(install_root);
        let backups = SettingsBackups::new(layout.settings_backup_dir(), retention);
        Self {
            layout,
            backups,
            lock: Mutex::new(()),
        }
    }

    pub fn layout(&self) -> &InstallLayout {
        &self.layout
    }

    pub fn install_root(&self) -> &Path {
        self.layout.root()
    }

    pub fn backups(&self) -> &SettingsBackups {
        &self.backups
    }

    fn guard(&self) -> MutexGuard<'_, ()> {
        // The guarded data is on disk; a panicked writer left nothing in memory to repair
        self.lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ----- Unified Metadata Document -----

    /// Loads the unified document; a missing file is an empty document.
    pub fn load_metadata(&self) -> Result<UnifiedMetadata> {
        let path = self.layout.metadata_file();
        if !path.exists() {
            return Ok(UnifiedMetadata::default());
        }
        read_json_file(&path)
    }

    /// Writes the unified document as pretty JSON, atomically.
    pub fn save_metadata(&self, doc: &UnifiedMetadata) -> Result<()> {
        let _guard = self.guard();
        self.write_metadata(doc)
    }

    fn write_metadata(&self, doc: &UnifiedMetadata) -> Result<()> {
        let path = self.layout.metadata_file();
        write_json_file(&path, doc, true)
            .with_context(|| format!("Failed to save metadata: {}", path.display()))
    }

    fn load_metadata_value(&self) -> Result<Value> {
        let path = self.layout.metadata_file();
        if !path.exists() {
            return Ok(Value::Object(Map::new()));
        }
        let value: Value = read_json_file(&path)?;
        if !value.is_object() {
            return Err(InstallerError::MetadataCorrupt {
                path: path.display().to_string(),
                reason: "top-level value is not an object".to_string(),
            }
            .into());
        }
        Ok(value)
    }

    /// Deep-merges `modifications` into the stored document and saves it.
    ///
    /// Nested objects merge key by key; any other value overwrites. The
    /// merged result must still be a valid document, otherwise nothing is
    /// written.
    pub fn update_metadata(&self, modifications: Value) -> Result<UnifiedMetadata> {
        let _guard = self.guard();
        let mut current = self.load_metadata_value()?;
        deep_merge(&mut current, modifications);

        let doc = UnifiedMetadata::from_value(current)
            .context("Metadata update would produce an invalid document")?;
        self.write_metadata(&doc)?;
        Ok(doc)
    }

    /// Runs `f` on the stored document inside the critical section and saves
    /// the result.
    pub fn update_with<T>(&self, f: impl FnOnce(&mut UnifiedMetadata) -> Result<T>) -> Result<T> {
        let _guard = self.guard();
        let mut doc = self.load_metadata()?;
        let result = f(&mut doc)?;
        self.write_metadata(&doc)?;
        Ok(result)
    }

    pub fn get_metadata_value(&self, key: &str) -> Result<Option<Value>> {
        let doc = self.load_metadata_value()?;
        Ok(dot_path::get_path(&doc, key).cloned())
    }

    pub fn set_metadata_value(&self, key: &str, value: Value) -> Result<()> {
        let _guard = self.guard();
        let mut current = self.load_metadata_value()?;
        dot_path::set_path(&mut current, key, value)?;
        let doc = UnifiedMetadata::from_value(current)
            .with_context(|| format!("Setting '{key}' would produce an invalid document"))?;
        self.write_metadata(&doc)
    }

    // ----- Settings Document -----

    /// Loads the settings document; a missing file is an empty object.
    pub fn load_settings(&self) -> Result<Value> {
        let path = self.layout.settings_file();
        if !path.exists() {
            return Ok(Value::Object(Map::new()));
        }
        let value: Value = read_json_file(&path)?;
        if !value.is_object() {
            return Err(InstallerError::MetadataCorrupt {
                path: path.display().to_string(),
                reason: "settings must be a JSON object".to_string(),
            }
            .into());
        }
        Ok(value)
    }

    /// Saves settings, backing up the existing file first.
    pub fn save_settings(&self, settings: &Value) -> Result<()> {
        let _guard = self.guard();
        self.write_settings(settings)
    }

    fn write_settings(&self, settings: &Value) -> Result<()> {
        let path = self.layout.settings_file();
        if path.exists() {
            self.backups.backup(&path)?;
        }
        write_json_file(&path, settings, true)
            .with_context(|| format!("Failed to save settings: {}", path.display()))
    }

    pub fn get_setting(&self, key: &str) -> Result<Option<Value>> {
        let settings = self.load_settings()?;
        Ok(dot_path::get_path(&settings, key).cloned())
    }

    pub fn set_setting(&self, key: &str, value: Value) -> Result<()> {
        let _guard = self.guard();
        let mut settings = self.load_settings()?;
        dot_path::set_path(&mut settings, key, value)?;
        self.write_settings(&settings)
    }

    /// Removes `key` from settings. Nothing is written when it was absent.
    pub fn remove_setting(&self, key: &str) -> Result<bool> {
        let _guard = self.guard();
        let mut settings = self.load_settings()?;
        let removed = dot_path::remove_path(&mut settings, key)?;
        if removed {
            self.write_settings(&settings)?;
        }
        Ok(removed)
    }

    /// Moves legacy installer fields out of the settings document.
    ///
    /// The keys in [`LEGACY_SETTINGS_KEYS`] are deep-merged into the unified
    /// document (entries already recorded there win) and the settings file is
    /// backed up and rewritten without them. Returns `false` and changes
    /// nothing when no legacy key is present.
    pub fn migrate_metadata(&self) -> Result<bool> {
        let _guard = self.guard();
        let mut settings = self.load_settings()?;
        let Some(settings_map) = settings.as_object_mut() else {
            return Ok(false);
        };

        let mut legacy = Map::new();
        for key in LEGACY_SETTINGS_KEYS {
            if let Some(value) = settings_map.remove(*key) {
                legacy.insert((*key).to_string(), value);
            }
        }
        if legacy.is_empty() {
            debug!("No legacy settings to migrate");
            return Ok(false);
        }

        let migrated_keys: Vec<String> = legacy.keys().cloned().collect();
        let mut merged = Value::Object(legacy);
        deep_merge(&mut merged, self.load_metadata_value()?);
        let doc = UnifiedMetadata::from_value(merged)
            .context("Legacy settings could not be converted to installer metadata")?;

        // Metadata first: if the settings rewrite fails the legacy fields are still there to retry
        self.write_metadata(&doc)?;
        self.write_settings(&settings)?;

        info!(keys = ?migrated_keys, "Migrated legacy settings into installer metadata");
        Ok(true)
    }

    /// Version recorded by the pre-migration format (`components.<name>.version`
    /// inside the settings document).
    pub fn legacy_component_version(&self, name: &str) -> Result<Option<String>> {
        let key = format!("components.{name}.version");
        Ok(self
            .get_setting(&key)?
            .and_then(|v| v.as_str().map(str::to_string))
            .filter(|v| !v.is_empty()))
    }

    // ----- Component registrations -----

    /// Records `name` at `version` with status `installed`.
    ///
    /// `installed_at` is kept from an earlier registration; `updated_at` is
    /// always refreshed.
    pub fn add_component_registration(
        &self,
        name: &str,
        version: &str,
        category: Option<&str>,
    ) -> Result<()> {
        let now = timestamp();
        self.update_with(|doc| {
            let record = doc.components_mut().entry(name.to_string()).or_default();
            let first_install = record.installed_at.is_none();
            record.merge(ComponentRecord {
                version: version.to_string(),
                category: category.map(str::to_string),
                installed_at: first_install.then(|| now.clone()),
                updated_at: Some(now.clone()),
                status: Some("installed".to_string()),
                extra: Map::new(),
            });
            Ok(())
        })?;
        debug!(component = name, version, "Registered component");
        Ok(())
    }

    /// Drops the registration of `name`. Returns whether one existed.
    pub fn remove_component_registration(&self, name: &str) -> Result<bool> {
        let removed = self.update_with(|doc| {
            Ok(doc.components.as_mut().is_some_and(|components| components.remove(name).is_some()))
        })?;
        if removed {
            debug!(component = name, "Removed component registration");
        }
        Ok(removed)
    }

    /// Names with a non-empty recorded version, sorted.
    pub fn installed_components(&self) -> Result<Vec<String>> {
        let doc = self.load_metadata()?;
        Ok(doc
            .components()
            .iter()
            .filter(|(_, record)| !record.version.is_empty())
            .map(|(name, _)| name.clone())
            .collect())
    }

    pub fn component_version(&self, name: &str) -> Result<Option<String>> {
        Ok(self.load_metadata()?.component_version(name).map(str::to_string))
    }

    pub fn is_component_installed(&self, name: &str) -> Result<bool> {
        Ok(self.component_version(name)?.is_some())
    }

    // ----- Integrity -----

    /// Records one integrity hash; the owning component comes from the path.
    pub fn record_file_hash(&self, relative_path: &Path, hash: &str, size: Option<u64>) -> Result<()> {
        self.record_file_hashes(&[(relative_path.to_path_buf(), hash.to_string(), size)])
    }

    /// Records several integrity hashes in one write.
    pub fn record_file_hashes(&self, entries: &[(PathBuf, String, Option<u64>)]) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }
        let now = timestamp();
        self.update_with(|doc| {
            let integrity = doc.integrity_mut();
            for (relative_path, hash, size) in entries {
                let key = normalize_path_for_storage(relative_path);
                let component = infer_component(&key).to_string();
                integrity.file_hashes_mut().insert(
                    key,
                    FileHashRecord {
                        hash: hash.clone(),
                        component,
                        size: *size,
                        recorded_at: Some(now.clone()),
                        extra: Map::new(),
                    },
                );
            }
            Ok(())
        })
    }

    /// Forgets integrity records for `relative_paths`. Returns how many existed.
    pub fn remove_file_hashes(&self, relative_paths: &[PathBuf]) -> Result<usize> {
        if relative_paths.is_empty() {
            return Ok(0);
        }
        self.update_with(|doc| {
            let Some(hashes) = doc.integrity.as_mut().and_then(|i| i.file_hashes.as_mut()) else {
                return Ok(0);
            };
            Ok(relative_paths
                .iter()
                .filter(|p| hashes.remove(&normalize_path_for_storage(p)).is_some())
                .count())
        })
    }

    /// Recomputes every recorded hash and stores the scan summary.
    pub fn scan_integrity(&self) -> Result<IntegrityReport> {
        let root = self.layout.root().to_path_buf();
        self.update_with(|doc| integrity::scan(&root, doc.integrity_mut()))
    }

    /// Stamps the `installation` and `framework` sections after a run.
    pub fn stamp_installation(&self) -> Result<()> {
        let now = timestamp();
        let install_dir = self.layout.root().display().to_string();
        self.update_with(|doc| {
            let installed_at = doc
                .installation
                .as_ref()
                .and_then(|i| i.installed_at.clone())
                .unwrap_or_else(|| now.clone());
            doc.installation.merge(Some(InstallationInfo {
                install_dir: Some(install_dir),
                installed_at: Some(installed_at),
                last_updated: Some(now.clone()),
                installer_version: Some(INSTALLER_VERSION.to_string()),
                extra: Map::new(),
            }));
            doc.framework.merge(Some(FrameworkInfo {
                version: Some(FRAMEWORK_VERSION.to_string()),
                release_date: Some(FRAMEWORK_RELEASE_DATE.to_string()),
                updated_at: Some(now.clone()),
                extra: Map::new(),
            }));
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use std::sync::Arc;
    use tempfile::tempdir;

    #[test]
    fn test_missing_metadata_loads_empty() {
        let temp = tempdir().unwrap();
        let store = MetadataStore::new(temp.path());
        assert_eq!(store.load_metadata().unwrap(), UnifiedMetadata::default());
        assert!(store.installed_components().unwrap().is_empty());
    }

    #[test]
    fn test_corrupt_metadata_is_reported() {
        let temp = tempdir().unwrap();
        let store = MetadataStore::new(temp.path());
        let path = store.layout().metadata_file();
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "{ not json").unwrap();

        let err = store.load_metadata().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<InstallerError>(),
            Some(InstallerError::MetadataCorrupt { .. })
        ));
        // The broken file is left for the user to inspect
        assert_eq!(fs::read_to_string(&path).unwrap(), "{ not json");
    }

    #[test]
    fn test_load_save_is_stable() {
        let temp = tempdir().unwrap();
        let store = MetadataStore::new(temp.path());
        store
            .update_metadata(json!({
                "components": {"core": {"version": "4.1.0", "custom": [1, 2]}},
                "features": {"mcp": {"enabled": true}},
                "crew": {"legacy": true}
            }))
            .unwrap();

        let path = store.layout().metadata_file();
        let before = fs::read_to_string(&path).unwrap();
        store.save_metadata(&store.load_metadata().unwrap()).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), before);
    }

    #[test]
    fn test_save_keeps_empty_sections() {
        let temp = tempdir().unwrap();
        let store = MetadataStore::new(temp.path());
        let path = store.layout().metadata_file();
        let raw = json!({
            "framework": {"version": "4.1.0"},
            "components": {},
            "documents": {},
            "features": {},
            "integrity": {"status": "clean"}
        });
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, raw.to_string()).unwrap();

        store.save_metadata(&store.load_metadata().unwrap()).unwrap();
        let saved: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(saved, raw);
    }

    #[test]
    fn test_update_metadata_deep_merges() {
        let temp = tempdir().unwrap();
        let store = MetadataStore::new(temp.path());
        store.update_metadata(json!({"features": {"a": {"y": 2}}})).unwrap();
        let doc = store.update_metadata(json!({"features": {"a": {"x": 1}}})).unwrap();
        assert_eq!(doc.features.unwrap().get("a"), Some(&json!({"x": 1, "y": 2})));
    }

    #[test]
    fn test_invalid_update_writes_nothing() {
        let temp = tempdir().unwrap();
        let store = MetadataStore::new(temp.path());
        store.add_component_registration("core", "1.0.0", None).unwrap();
        let before = fs::read_to_string(store.layout().metadata_file()).unwrap();

        assert!(store.update_metadata(json!({"components": 5})).is_err());
        assert_eq!(fs::read_to_string(store.layout().metadata_file()).unwrap(), before);
    }

    #[test]
    fn test_component_registration_lifecycle() {
        let temp = tempdir().unwrap();
        let store = MetadataStore::new(temp.path());

        store.add_component_registration("core", "4.0.0", Some("core")).unwrap();
        let first = store.load_metadata().unwrap().components()["core"].clone();
        assert_eq!(first.status.as_deref(), Some("installed"));
        assert!(first.installed_at.is_some());

        store.add_component_registration("core", "4.1.0", None).unwrap();
        let second = store.load_metadata().unwrap().components()["core"].clone();
        assert_eq!(second.version, "4.1.0");
        assert_eq!(second.installed_at, first.installed_at);
        assert_eq!(second.category.as_deref(), Some("core"));

        assert_eq!(store.component_version("core").unwrap().as_deref(), Some("4.1.0"));
        assert!(store.remove_component_registration("core").unwrap());
        assert!(!store.remove_component_registration("core").unwrap());
        assert!(!store.is_component_installed("core").unwrap());
    }

    #[test]
    fn test_empty_version_is_not_installed() {
        let temp = tempdir().unwrap();
        let store = MetadataStore::new(temp.path());
        store.update_metadata(json!({"components": {"hooks": {"version": ""}}})).unwrap();
        assert!(!store.is_component_installed("hooks").unwrap());
        assert!(store.installed_components().unwrap().is_empty());
    }

    #[test]
    fn test_settings_dot_paths_and_backups() {
        let temp = tempdir().unwrap();
        let store = MetadataStore::with_retention(temp.path(), 2);

        store.set_setting("ui.theme", json!("dark")).unwrap();
        // First write created the file, nothing to back up
        assert!(store.backups().list().unwrap().is_empty());

        store.set_setting("ui.font.size", json!(14)).unwrap();
        store.set_setting("ui.font.size", json!(16)).unwrap();
        store.set_setting("ui.font.size", json!(18)).unwrap();
        assert_eq!(store.backups().list().unwrap().len(), 2);

        assert_eq!(store.get_setting("ui.theme").unwrap(), Some(json!("dark")));
        assert_eq!(store.get_setting("ui.font.size").unwrap(), Some(json!(18)));
        assert!(store.remove_setting("ui.theme").unwrap());
        assert!(!store.remove_setting("ui.theme").unwrap());
        assert_eq!(store.get_setting("ui.theme").unwrap(), None);
    }

    #[test]
    fn test_metadata_dot_paths() {
        let temp = tempdir().unwrap();
        let store = MetadataStore::new(temp.path());
        store.set_metadata_value("components.core.version", json!("4.1.0")).unwrap();
        assert!(store.is_component_installed("core").unwrap());
        assert_eq!(store.get_metadata_value("components.core.version").unwrap(), Some(json!("4.1.0")));
        assert!(store.set_metadata_value("components", json!("flat")).is_err());
    }

    #[test]
    fn test_migrate_moves_legacy_keys() {
        let temp = tempdir().unwrap();
        let store = MetadataStore::new(temp.path());
        fs::write(
            store.layout().settings_file(),
            serde_json::to_string(&json!({
                "theme": "dark",
                "components": {"core": {"version": "3.0.0"}},
                "framework": {"version": "3.0.0"},
                "mcp": {"servers": ["context7"]}
            }))
            .unwrap(),
        )
        .unwrap();

        assert_eq!(store.legacy_component_version("core").unwrap().as_deref(), Some("3.0.0"));
        assert!(store.migrate_metadata().unwrap());

        let settings = store.load_settings().unwrap();
        assert_eq!(settings, json!({"theme": "dark"}));
        assert_eq!(store.component_version("core").unwrap().as_deref(), Some("3.0.0"));
        assert_eq!(store.get_metadata_value("mcp.servers").unwrap(), Some(json!(["context7"])));
        assert_eq!(store.backups().list().unwrap().len(), 1);

        assert!(!store.migrate_metadata().unwrap());
        assert_eq!(store.backups().list().unwrap().len(), 1);
    }

    #[test]
    fn test_migrate_keeps_existing_metadata_entries() {
        let temp = tempdir().unwrap();
        let store = MetadataStore::new(temp.path());
        store.add_component_registration("core", "4.1.0", None).unwrap();
        store.set_setting("components.core.version", json!("3.0.0")).unwrap();

        assert!(store.migrate_metadata().unwrap());
        assert_eq!(store.component_version("core").unwrap().as_deref(), Some("4.1.0"));
    }

    #[test]
    fn test_record_and_scan_integrity() {
        let temp = tempdir().unwrap();
        let store = MetadataStore::new(temp.path());
        fs::create_dir_all(temp.path().join("hooks")).unwrap();
        let file = temp.path().join("hooks").join("pre.sh");
        fs::write(&file, "echo hi").unwrap();

        let hash = crate::utils::fs::prefixed_checksum(&file).unwrap();
        store.record_file_hash(Path::new("hooks/pre.sh"), &hash, Some(7)).unwrap();
        let doc = store.load_metadata().unwrap();
        let record = &doc.integrity.as_ref().unwrap().file_hashes()["hooks/pre.sh"];
        assert_eq!(record.component, "hooks");

        assert!(store.scan_integrity().unwrap().is_clean());
        fs::write(&file, "echo bye").unwrap();
        let report = store.scan_integrity().unwrap();
        assert_eq!(report.modified, vec!["hooks/pre.sh".to_string()]);
        assert_eq!(
            store.get_metadata_value("integrity.status").unwrap(),
            Some(json!("modified"))
        );

        assert_eq!(store.remove_file_hashes(&[PathBuf::from("hooks/pre.sh")]).unwrap(), 1);
    }

    #[test]
    fn test_stamp_installation_keeps_first_install_time() {
        let temp = tempdir().unwrap();
        let store = MetadataStore::new(temp.path());
        store.stamp_installation().unwrap();
        let first = store.load_metadata().unwrap().installation.unwrap();
        store.stamp_installation().unwrap();
        let second = store.load_metadata().unwrap();

        let installation = second.installation.unwrap();
        assert_eq!(installation.installed_at, first.installed_at);
        assert_eq!(installation.installer_version.as_deref(), Some(INSTALLER_VERSION));
        assert_eq!(second.framework.unwrap().version.as_deref(), Some(FRAMEWORK_VERSION));
    }

    #[test]
    fn test_concurrent_registrations_are_not_lost() {
        let temp = tempdir().unwrap();
        let store = Arc::new(MetadataStore::new(temp.path()));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    store.add_component_registration(&format!("c{i}"), "1.0.0", None).unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.installed_components().unwrap().len(), 8);
    }
}
