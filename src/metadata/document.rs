//! The Unified Metadata Document.
//!
//! Typed view over `.crew/config/crew-metadata.json`. Every section keeps the
//! keys it does not model in a flattened `extra` map, and map sections are
//! optional so an empty `{}` section stays present while an absent one stays
//! absent. Loading and saving an unmodified document preserves its content.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use super::merge::{Merge, merge_field};

static NO_COMPONENTS: BTreeMap<String, ComponentRecord> = BTreeMap::new();
static NO_FILE_HASHES: BTreeMap<String, FileHashRecord> = BTreeMap::new();

/// The single persisted source of truth for installed state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UnifiedMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub framework: Option<FrameworkInfo>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub components: Option<BTreeMap<String, ComponentRecord>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub documents: Option<Map<String, Value>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub features: Option<Map<String, Value>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub installation: Option<InstallationInfo>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub integrity: Option<IntegrityState>,

    /// Top-level keys outside the known sections (e.g. migrated `crew`, `mcp`).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl UnifiedMetadata {
    /// Converts to a JSON value for untyped merging.
    pub fn to_value(&self) -> serde_json::Result<Value> {
        serde_json::to_value(self)
    }

    pub fn from_value(value: Value) -> serde_json::Result<Self> {
        serde_json::from_value(value)
    }

    /// Registered components; empty when the section is absent.
    pub fn components(&self) -> &BTreeMap<String, ComponentRecord> {
        self.components.as_ref().unwrap_or(&NO_COMPONENTS)
    }

    pub fn components_mut(&mut self) -> &mut BTreeMap<String, ComponentRecord> {
        self.components.get_or_insert_with(BTreeMap::new)
    }

    /// Version recorded for `name`, if non-empty.
    pub fn component_version(&self, name: &str) -> Option<&str> {
        self.components().get(name).map(|c| c.version.as_str()).filter(|v| !v.is_empty())
    }

    pub fn integrity_mut(&mut self) -> &mut IntegrityState {
        self.integrity.get_or_insert_with(IntegrityState::default)
    }
}

impl Merge for UnifiedMetadata {
    fn merge(&mut self, overlay: Self) {
        self.framework.merge(overlay.framework);
        self.components.merge(overlay.components);
        self.documents.merge(overlay.documents);
        self.features.merge(overlay.features);
        self.installation.merge(overlay.installation);
        self.integrity.merge(overlay.integrity);
        self.extra.merge(overlay.extra);
    }
}

/// `framework` section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameworkInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Merge for FrameworkInfo {
    fn merge(&mut self, overlay: Self) {
        merge_field(&mut self.version, overlay.version);
        merge_field(&mut self.release_date, overlay.release_date);
        merge_field(&mut self.updated_at, overlay.updated_at);
        self.extra.merge(overlay.extra);
    }
}

/// One entry of the `components` section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComponentRecord {
    #[serde(default)]
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub installed_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Merge for ComponentRecord {
    fn merge(&mut self, overlay: Self) {
        self.version = overlay.version;
        merge_field(&mut self.category, overlay.category);
        merge_field(&mut self.installed_at, overlay.installed_at);
        merge_field(&mut self.updated_at, overlay.updated_at);
        merge_field(&mut self.status, overlay.status);
        self.extra.merge(overlay.extra);
    }
}

/// `installation` section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InstallationInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub install_dir: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub installed_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub installer_version: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Merge for InstallationInfo {
    fn merge(&mut self, overlay: Self) {
        merge_field(&mut self.install_dir, overlay.install_dir);
        merge_field(&mut self.installed_at, overlay.installed_at);
        merge_field(&mut self.last_updated, overlay.last_updated);
        merge_field(&mut self.installer_version, overlay.installer_version);
        self.extra.merge(overlay.extra);
    }
}

/// `integrity` section: per-file hashes plus the result of the last scan.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IntegrityState {
    /// Keyed by forward-slash path relative to the install root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_hashes: Option<BTreeMap<String, FileHashRecord>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_scan: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_files: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clean_files: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_files: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub missing_files: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub corrupted_files: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl IntegrityState {
    /// Recorded hashes; empty when the section has none.
    pub fn file_hashes(&self) -> &BTreeMap<String, FileHashRecord> {
        self.file_hashes.as_ref().unwrap_or(&NO_FILE_HASHES)
    }

    pub fn file_hashes_mut(&mut self) -> &mut BTreeMap<String, FileHashRecord> {
        self.file_hashes.get_or_insert_with(BTreeMap::new)
    }
}

impl Merge for IntegrityState {
    fn merge(&mut self, overlay: Self) {
        if let Some(hashes) = overlay.file_hashes {
            self.file_hashes_mut().extend(hashes);
        }
        merge_field(&mut self.last_scan, overlay.last_scan);
        merge_field(&mut self.total_files, overlay.total_files);
        merge_field(&mut self.clean_files, overlay.clean_files);
        merge_field(&mut self.modified_files, overlay.modified_files);
        merge_field(&mut self.missing_files, overlay.missing_files);
        merge_field(&mut self.corrupted_files, overlay.corrupted_files);
        merge_field(&mut self.status, overlay.status);
        self.extra.merge(overlay.extra);
    }
}

/// Integrity record for one installed file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileHashRecord {
    /// `sha256:<hex>`
    pub hash: String,
    /// Owning component, inferred from the path.
    pub component: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recorded_at: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_document_serializes_to_empty_object() {
        let doc = UnifiedMetadata::default();
        assert_eq!(doc.to_value().unwrap(), json!({}));
    }

    #[test]
    fn test_unknown_keys_survive_round_trip() {
        let raw = json!({
            "framework": {"version": "4.0.0", "codename": "atlas"},
            "components": {"core": {"version": "4.0.0", "files": 12}},
            "crew": {"agents": ["a"]},
            "integrity": {"file_hashes": {}, "scanner": "v2"}
        });
        let doc = UnifiedMetadata::from_value(raw.clone()).unwrap();
        assert_eq!(doc.extra.get("crew"), Some(&json!({"agents": ["a"]})));
        assert_eq!(doc.to_value().unwrap(), raw);
    }

    #[test]
    fn test_empty_sections_survive_round_trip() {
        let raw = json!({
            "framework": {"version": "4.1.0"},
            "components": {},
            "documents": {},
            "features": {},
            "integrity": {"status": "clean"}
        });
        let doc = UnifiedMetadata::from_value(raw.clone()).unwrap();
        assert!(doc.components().is_empty());
        assert!(doc.integrity.as_ref().unwrap().file_hashes().is_empty());
        assert_eq!(doc.to_value().unwrap(), raw);
    }

    #[test]
    fn test_component_version_ignores_empty() {
        let mut doc = UnifiedMetadata::default();
        doc.components_mut().insert("core".into(), ComponentRecord::default());
        assert_eq!(doc.component_version("core"), None);

        doc.components_mut().get_mut("core").unwrap().version = "1.0.0".into();
        assert_eq!(doc.component_version("core"), Some("1.0.0"));
    }

    #[test]
    fn test_typed_merge_matches_deep_merge() {
        let base_json = json!({
            "components": {"core": {"version": "1.0.0", "status": "installed"}},
            "framework": {"version": "1.0.0", "release_date": "2026-01-01"}
        });
        let overlay_json = json!({
            "components": {"core": {"version": "1.1.0"}, "hooks": {"version": ""}},
            "framework": {"version": "1.1.0"}
        });

        let mut typed = UnifiedMetadata::from_value(base_json.clone()).unwrap();
        typed.merge(UnifiedMetadata::from_value(overlay_json.clone()).unwrap());

        let mut untyped = base_json;
        crate::metadata::deep_merge(&mut untyped, overlay_json);

        assert_eq!(typed.to_value().unwrap(), untyped);
    }
}
