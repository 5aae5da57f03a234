//! Dot-path accessors over nested JSON objects (`"a.b.c"`).
//!
//! Shared by the settings and metadata accessors so both documents are
//! addressed the same way.

use anyhow::{Result, bail};
use serde_json::{Map, Value};
use tracing::debug;

fn split_key(key: &str) -> Result<Vec<&str>> {
    let parts: Vec<&str> = key.split('.').collect();
    if key.is_empty() || parts.iter().any(|p| p.is_empty()) {
        bail!("Invalid key '{key}': expected dot-separated, non-empty segments");
    }
    Ok(parts)
}

/// Looks up `key` by walking nested objects.
pub fn get_path<'a>(root: &'a Value, key: &str) -> Option<&'a Value> {
    let parts = split_key(key).ok()?;
    parts.iter().try_fold(root, |current, part| current.as_object()?.get(*part))
}

/// Sets `key` to `value`, creating intermediate objects as needed.
///
/// An intermediate value that is not an object is replaced by one.
pub fn set_path(root: &mut Value, key: &str, value: Value) -> Result<()> {
    let parts = split_key(key)?;
    let (last, parents) = parts.split_last().ok_or_else(|| anyhow::anyhow!("Empty key"))?;

    if !root.is_object() {
        *root = Value::Object(Map::new());
    }

    let mut current = root;
    for part in parents {
        let map = ensure_object(current);
        let entry = map.entry((*part).to_string()).or_insert_with(|| Value::Object(Map::new()));
        if !entry.is_object() {
            debug!(key, segment = *part, "Replacing non-object value on dot path");
            *entry = Value::Object(Map::new());
        }
        current = entry;
    }

    ensure_object(current).insert((*last).to_string(), value);
    Ok(())
}

/// Removes `key`. Returns whether anything was removed.
pub fn remove_path(root: &mut Value, key: &str) -> Result<bool> {
    let parts = split_key(key)?;
    let (last, parents) = parts.split_last().ok_or_else(|| anyhow::anyhow!("Empty key"))?;

    let mut current = root;
    for part in parents {
        match current.as_object_mut().and_then(|m| m.get_mut(*part)) {
            Some(next) => current = next,
            None => return Ok(false),
        }
    }

    Ok(current.as_object_mut().is_some_and(|m| m.remove(*last).is_some()))
}

fn ensure_object(value: &mut Value) -> &mut Map<String, Value> {
    if !value.is_object() {
        *value = Value::Object(Map::new());
    }
    match value {
        Value::Object(map) => map,
        _ => unreachable!("value was just made an object"),
    }
}
