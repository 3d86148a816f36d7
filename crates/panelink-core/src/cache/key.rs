use std::collections::BTreeMap;
use std::fmt;

use serde_json::{Map, Value};

/// Deterministic cache key for a read request: `{path}:{params as JSON}`.
///
/// The path goes through [`normalize_path`] first, so `api/v1/nodes` and
/// `/api/v1/nodes` share one entry. Parameters are serialized with their keys sorted at every nesting level,
/// so declaration order never produces a different key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn build(path: &str, params: &BTreeMap<String, Value>) -> Self {
        let object: Map<String, Value> = params
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        let rendered = sorted_json(&Value::Object(object));
        Self(format!("{}:{rendered}", normalize_path(path)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<CacheKey> for String {
    fn from(key: CacheKey) -> Self {
        key.0
    }
}

/// Canonical form of a request path: one leading `/`, no query or fragment.
///
/// `ApiClient` resolves `nodes` and `/nodes` to the same URL, so keys and
/// invalidation scopes must not tell them apart either.
pub fn normalize_path(path: &str) -> String {
    let path = path.split(['?', '#']).next().unwrap_or_default();
    format!("/{}", path.trim_start_matches('/'))
}

/// Render JSON with object keys in sorted order regardless of how
/// `serde_json::Map` is configured.
fn sorted_json(value: &Value) -> String {
    match value {
        Value::Object(map) => {
            let sorted: BTreeMap<&String, &Value> = map.iter().collect();
            let body: Vec<String> = sorted
                .into_iter()
                .map(|(k, v)| format!("{}:{}", Value::String(k.clone()), sorted_json(v)))
                .collect();
            format!("{{{}}}", body.join(","))
        }
        Value::Array(items) => {
            let body: Vec<String> = items.iter().map(sorted_json).collect();
            format!("[{}]", body.join(","))
        }
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn params(pairs: &[(&str, Value)]) -> BTreeMap<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn parameter_order_does_not_matter() {
        let a = CacheKey::build("/v1/nodes", &params(&[("b", json!(2)), ("a", json!(1))]));
        let b = CacheKey::build("/v1/nodes", &params(&[("a", json!(1)), ("b", json!(2))]));
        assert_eq!(a, b);
        assert_eq!(a.as_str(), r#"/v1/nodes:{"a":1,"b":2}"#);
    }

    #[test]
    fn nested_objects_are_sorted() {
        let a = CacheKey::build("/x", &params(&[("f", json!({ "z": 1, "y": { "b": 1, "a": 2 } }))]));
        assert_eq!(a.as_str(), r#"/x:{"f":{"y":{"a":2,"b":1},"z":1}}"#);
    }

    #[test]
    fn empty_params() {
        assert_eq!(CacheKey::build("/v1/nodes", &BTreeMap::new()).as_str(), "/v1/nodes:{}");
    }

    #[test]
    fn different_values_differ() {
        let a = CacheKey::build("/v1/nodes", &params(&[("page", json!(1))]));
        let b = CacheKey::build("/v1/nodes", &params(&[("page", json!(2))]));
        assert_ne!(a, b);
    }

    #[test]
    fn relative_and_absolute_paths_share_a_key() {
        let a = CacheKey::build("api/v1/nodes", &BTreeMap::new());
        let b = CacheKey::build("/api/v1/nodes", &BTreeMap::new());
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "/api/v1/nodes:{}");
    }

    #[test]
    fn normalize_strips_query_and_extra_slashes() {
        assert_eq!(normalize_path("//api/v1/nodes?page=2"), "/api/v1/nodes");
        assert_eq!(normalize_path(""), "/");
    }
}
