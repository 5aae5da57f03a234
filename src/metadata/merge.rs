//! Deep merge of JSON documents.
//!
//! Objects merge key by key, recursively; every other value (scalars, arrays,
//! null) in the overlay replaces what was there. This is the primitive behind
//! [`super::MetadataStore::update_metadata`], which lets several components
//! write disjoint parts of the same document without clobbering each other.

use serde_json::Value;

/// Merges `overlay` into `base` in place.
///
/// # Examples
///
/// ```rust
/// use crew_installer::metadata::deep_merge;
/// use serde_json::json;
///
/// let mut base = json!({"a": {"y": 2}});
/// deep_merge(&mut base, json!({"a": {"x": 1}}));
/// assert_eq!(base, json!({"a": {"x": 1, "y": 2}}));
///
/// let mut base = json!({"a": 2});
/// deep_merge(&mut base, json!({"a": 1}));
/// assert_eq!(base, json!({"a": 1}));
/// ```
pub fn deep_merge(base: &mut Value, overlay: Value) {
    match overlay {
        Value::Object(overlay_map) => {
            if let Value::Object(base_map) = base {
                for (key, value) in overlay_map {
                    match base_map.get_mut(&key) {
                        Some(existing) => deep_merge(existing, value),
                        None => {
                            base_map.insert(key, value);
                        }
                    }
                }
            } else {
                *base = Value::Object(overlay_map);
            }
        }
        other => *base = other,
    }
}

/// Typed counterpart of [`deep_merge`] for the metadata document sections.
///
/// Implementations follow the same rules: nested maps union, present scalar
/// fields in the overlay win, absent (`None`) fields leave the base alone.
pub trait Merge {
    fn merge(&mut self, overlay: Self);
}

impl Merge for serde_json::Map<String, Value> {
    fn merge(&mut self, overlay: Self) {
        for (key, value) in overlay {
            match self.get_mut(&key) {
                Some(existing) => deep_merge(existing, value),
                None => {
                    self.insert(key, value);
                }
            }
        }
    }
}

impl<T> Merge for Option<T>
where
    T: Merge,
{
    fn merge(&mut self, overlay: Self) {
        match (self.as_mut(), overlay) {
            (Some(base), Some(overlay)) => base.merge(overlay),
            (None, Some(overlay)) => *self = Some(overlay),
            (_, None) => {}
        }
    }
}

impl<T> Merge for std::collections::BTreeMap<String, T>
where
    T: Merge,
{
    fn merge(&mut self, overlay: Self) {
        for (key, value) in overlay {
            match self.get_mut(&key) {
                Some(existing) => existing.merge(value),
                None => {
                    self.insert(key, value);
                }
            }
        }
    }
}

/// Overwrites `base` when the overlay carries a value.
pub(crate) fn merge_field<T>(base: &mut Option<T>, overlay: Option<T>) {
    if overlay.is_some() {
        *base = overlay;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_disjoint_subtrees_union() {
        let mut base = json!({"a": {"y": 2}});
        deep_merge(&mut base, json!({"a": {"x": 1}}));
        assert_eq!(base, json!({"a": {"x": 1, "y": 2}}));
    }

    #[test]
    fn test_overlay_scalar_wins() {
        let mut base = json!({"a": 2});
        deep_merge(&mut base, json!({"a": 1}));
        assert_eq!(base, json!({"a": 1}));
    }

    #[test]
    fn test_arrays_are_replaced_not_concatenated() {
        let mut base = json!({"list": [1, 2, 3]});
        deep_merge(&mut base, json!({"list": [4]}));
        assert_eq!(base, json!({"list": [4]}));
    }

    #[test]
    fn test_object_replaces_scalar_and_vice_versa() {
        let mut base = json!({"a": 1, "b": {"c": 1}});
        deep_merge(&mut base, json!({"a": {"nested": true}, "b": "flat"}));
        assert_eq!(base, json!({"a": {"nested": true}, "b": "flat"}));
    }

    #[test]
    fn test_deeply_nested_merge() {
        let mut base = json!({"components": {"core": {"version": "1.0.0", "status": "installed"}}});
        deep_merge(
            &mut base,
            json!({"components": {"core": {"version": "1.1.0"}, "hooks": {"version": "1.0.0"}}}),
        );
        assert_eq!(
            base,
            json!({"components": {
                "core": {"version": "1.1.0", "status": "installed"},
                "hooks": {"version": "1.0.0"}
            }})
        );
    }

    #[test]
    fn test_null_overlay_replaces() {
        let mut base = json!({"a": {"b": 1}});
        deep_merge(&mut base, json!({"a": null}));
        assert_eq!(base, json!({"a": null}));
    }

    #[test]
    fn test_option_merge() {
        let mut base: Option<serde_json::Map<String, Value>> = None;
        let overlay = json!({"k": 1}).as_object().cloned();
        base.merge(overlay);
        assert_eq!(base.unwrap().get("k"), Some(&json!(1)));
    }
}
