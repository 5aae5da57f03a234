//! JSON document I/O.
//!
//! All writes go through [`super::atomic::atomic_write`].

use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs;
use std::path::Path;

use crate::core::InstallerError;

/// Reads and deserializes a JSON file.
///
/// Parse failures are reported as [`InstallerError::MetadataCorrupt`] so the
/// CLI can point the user at the backups directory.
pub fn read_json_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read JSON file: {}", path.display()))?;

    serde_json::from_str(&content).map_err(|e| {
        anyhow::Error::from(InstallerError::MetadataCorrupt {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
    })
}

/// Serializes `data` to JSON and writes it atomically.
///
/// Pretty output uses two-space indentation and a trailing newline.
pub fn write_json_file<T: Serialize>(path: &Path, data: &T, pretty: bool) -> Result<()> {
    let mut json = if pretty {
        serde_json::to_string_pretty(data)?
    } else {
        serde_json::to_string(data)?
    };
    json.push('\n');

    super::atomic::safe_write(path, &json)
        .with_context(|| format!("Failed to write JSON file: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};
    use tempfile::tempdir;

    #[test]
    fn test_json_round_trip() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("doc.json");

        write_json_file(&path, &json!({"a": {"b": 1}}), true).unwrap();
        let loaded: Value = read_json_file(&path).unwrap();
        assert_eq!(loaded, json!({"a": {"b": 1}}));
        assert!(fs::read_to_string(&path).unwrap().ends_with("}\n"));
    }

    #[test]
    fn test_read_corrupt_json_is_metadata_error() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("broken.json");
        fs::write(&path, "{ not json").unwrap();

        let err = read_json_file::<Value>(&path).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<InstallerError>(),
            Some(InstallerError::MetadataCorrupt { .. })
        ));
    }
}
