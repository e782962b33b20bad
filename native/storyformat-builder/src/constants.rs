//! Constant Flattener
//!
//! Turns a nested configuration record into a flat table of dotted keys to
//! pre-serialized JS literals. The bundler substitutes these at compile time,
//! so unused fields never reach the output and branches on them fold away.

use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// Keys stripped by default: dependency manifests and tooling config that must
/// never leak into a bundle.
pub const DEFAULT_EXCLUSIONS: &[&str] = &["dependencies", "devDependencies", "eslintConfig"];

/// Set of object keys that are skipped entirely while flattening.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExclusionSet(BTreeSet<String>);

impl ExclusionSet {
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ExclusionSet(keys.into_iter().map(Into::into).collect())
    }

    pub fn empty() -> Self {
        ExclusionSet(BTreeSet::new())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl Default for ExclusionSet {
    fn default() -> Self {
        ExclusionSet::new(DEFAULT_EXCLUSIONS.iter().copied())
    }
}

/// Dotted key → literal JS source text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConstantMap(BTreeMap<String, String>);

impl ConstantMap {
    pub fn new() -> Self {
        ConstantMap(BTreeMap::new())
    }

    pub fn insert(&mut self, key: impl Into<String>, literal: impl Into<String>) {
        self.0.insert(key.into(), literal.into());
    }

    /// Inserts `text` as a JSON string literal.
    pub fn insert_string(&mut self, key: impl Into<String>, text: &str) {
        let literal = Value::String(text.to_string()).to_string();
        self.0.insert(key.into(), literal);
    }

    /// Later layers win.
    pub fn extend_from(&mut self, other: &ConstantMap) {
        for (key, value) in &other.0 {
            self.0.insert(key.clone(), value.clone());
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl FromIterator<(String, String)> for ConstantMap {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        ConstantMap(iter.into_iter().collect())
    }
}

/// Flattens `value` under `prefix`.
///
/// Objects recurse with `prefix + key + "."`; every other value (arrays and
/// `null` included) is a leaf serialized whole. A key found in `exclude` is
/// dropped together with everything below it, at any depth. A non-object root
/// produces an empty map.
pub fn flatten_constants(value: &Value, prefix: &str, exclude: &ExclusionSet) -> ConstantMap {
    let mut out = ConstantMap::new();
    if let Value::Object(_) = value {
        flatten_into(value, prefix, exclude, &mut out);
    }
    out
}

fn flatten_into(value: &Value, prefix: &str, exclude: &ExclusionSet, out: &mut ConstantMap) {
    let Value::Object(map) = value else {
        return;
    };
    for (key, child) in map {
        if exclude.contains(key) {
            continue;
        }
        match child {
            Value::Object(_) => {
                let nested = format!("{prefix}{key}.");
                flatten_into(child, &nested, exclude, out);
            }
            leaf => {
                out.insert(format!("{prefix}{key}"), leaf.to_string());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_flatten_nested_leaves() {
        let flat = flatten_constants(&json!({"a": {"b": 1, "c": "x"}}), "P.", &ExclusionSet::empty());
        let expected: ConstantMap = vec![
            ("P.a.b".to_string(), "1".to_string()),
            ("P.a.c".to_string(), "\"x\"".to_string()),
        ]
        .into_iter()
        .collect();
        assert_eq!(flat, expected);
    }

    #[test]
    fn test_arrays_and_null_are_leaves() {
        let flat = flatten_constants(
            &json!({"keywords": ["a", "b"], "homepage": null, "private": true}),
            "PACKAGE.",
            &ExclusionSet::empty(),
        );
        assert_eq!(flat.get("PACKAGE.keywords"), Some(r#"["a","b"]"#));
        assert_eq!(flat.get("PACKAGE.homepage"), Some("null"));
        assert_eq!(flat.get("PACKAGE.private"), Some("true"));
        assert!(!flat.contains_key("PACKAGE.keywords.0"));
    }

    #[test]
    fn test_excluded_keys_never_appear() {
        let value = json!({
            "name": "fmt",
            "dependencies": {"left-pad": "1.0.0"},
            "devDependencies": {"esbuild": "^0.14"},
            "eslintConfig": {"rules": {"semi": "off"}},
            "nested": {"dependencies": {"deep": "1"}, "kept": 2}
        });
        let flat = flatten_constants(&value, "PACKAGE.", &ExclusionSet::default());
        for (key, literal) in flat.iter() {
            assert!(!key.contains("dependencies"), "leaked key {key}");
            assert!(!key.contains("eslintConfig"), "leaked key {key}");
            assert!(!literal.contains("left-pad"));
        }
        assert_eq!(flat.get("PACKAGE.name"), Some("\"fmt\""));
        assert_eq!(flat.get("PACKAGE.nested.kept"), Some("2"));
        assert_eq!(flat.len(), 2);
    }

    #[test]
    fn test_reflatten_of_leaf_only_map_is_stable() {
        let flat = flatten_constants(&json!({"a": 1, "b": "two"}), "", &ExclusionSet::empty());
        let as_value: serde_json::Map<String, Value> = flat
            .iter()
            .map(|(k, v)| (k.to_string(), serde_json::from_str(v).unwrap()))
            .collect();
        let again = flatten_constants(&Value::Object(as_value), "", &ExclusionSet::empty());
        assert_eq!(flat, again);
    }

    #[test]
    fn test_non_object_root_is_empty() {
        assert!(flatten_constants(&json!([1, 2]), "P.", &ExclusionSet::empty()).is_empty());
        assert!(flatten_constants(&json!("s"), "P.", &ExclusionSet::empty()).is_empty());
    }

    #[test]
    fn test_insert_string_escapes() {
        let mut map = ConstantMap::new();
        map.insert_string("SOURCE", "<p class=\"x\">\n</p>");
        assert_eq!(map.get("SOURCE"), Some(r#""<p class=\"x\">\n</p>""#));
    }

    #[test]
    fn test_extend_from_later_wins() {
        let mut base = ConstantMap::new();
        base.insert("A", "1");
        base.insert("B", "2");
        let mut layer = ConstantMap::new();
        layer.insert("B", "3");
        base.extend_from(&layer);
        assert_eq!(base.get("A"), Some("1"));
        assert_eq!(base.get("B"), Some("3"));
    }
}
