//! C3 — Field Extractor (spec §4.3): `Extract(obj, path) -> (string, error)`.

use discovery_core::DiscoveryError;
use serde_json::Value;

/// One parsed path segment: a plain object key, or a key plus an array index
/// (`field[n]`, evaluated left to right — `a.b[0].c` visits `a`, `b[0]`, `c`).
enum Segment<'a> {
    Key(&'a str),
    Index(&'a str, usize),
}

fn parse_segment(raw: &str) -> Result<Segment<'_>, DiscoveryError> {
    match raw.find('[') {
        None => Ok(Segment::Key(raw)),
        Some(open) => {
            if !raw.ends_with(']') {
                return Err(DiscoveryError::InvalidExpression(format!(
                    "malformed array index in path segment {raw:?}"
                )));
            }
            let key = &raw[..open];
            let index_str = &raw[open + 1..raw.len() - 1];
            let index: usize = index_str.parse().map_err(|_| {
                DiscoveryError::InvalidExpression(format!("array index in {raw:?} is not a non-negative integer"))
            })?;
            Ok(Segment::Index(key, index))
        }
    }
}

/// Walks a dotted path (with optional `[n]` array indices) and returns a
/// reference to whatever node it lands on, without rendering a leaf value.
/// Used both by `extract` (which renders the result) and by callers that
/// need the raw node itself, e.g. the Reference Resolver reading a
/// `{name, namespace, kind}`-shaped reference object.
pub fn navigate<'a>(obj: &'a Value, path: &str) -> Result<&'a Value, DiscoveryError> {
    let mut current = obj;
    for raw_segment in path.split('.') {
        if raw_segment.is_empty() {
            return Err(DiscoveryError::InvalidExpression(format!(
                "empty path segment in {path:?}"
            )));
        }
        match parse_segment(raw_segment)? {
            Segment::Key(key) => {
                let Value::Object(map) = current else {
                    return Err(path_type_mismatch(path, raw_segment));
                };
                current = map
                    .get(key)
                    .ok_or_else(|| DiscoveryError::InvalidExpression(format!("path {path:?} not found at {key:?}")))?;
            }
            Segment::Index(key, idx) => {
                let Value::Object(map) = current else {
                    return Err(path_type_mismatch(path, raw_segment));
                };
                let array = map
                    .get(key)
                    .ok_or_else(|| DiscoveryError::InvalidExpression(format!("path {path:?} not found at {key:?}")))?;
                let Value::Array(items) = array else {
                    return Err(path_type_mismatch(path, raw_segment));
                };
                current = items
                    .get(idx)
                    .ok_or_else(|| DiscoveryError::InvalidExpression(format!("index {idx} out of range in {path:?}")))?;
            }
        }
    }
    Ok(current)
}

/// Evaluates a dotted path (with optional `[n]` array indices) against `obj`
/// and renders the leaf value lexically. Strings pass through; integers and
/// booleans render as their literal text; objects/arrays/null at the leaf
/// are a `PathTypeMismatch`-class error (spec §4.3).
pub fn extract(obj: &Value, path: &str) -> Result<String, DiscoveryError> {
    render_leaf(navigate(obj, path)?, path)
}

/// Best-effort lookup of an object-shaped node at `path`, used by the
/// Reference Resolver: missing paths and non-object/null nodes are silently
/// skipped there (spec §4.8), so this returns `Option` rather than `Result`.
pub fn extract_object<'a>(obj: &'a Value, path: &str) -> Option<&'a serde_json::Map<String, Value>> {
    navigate(obj, path).ok().and_then(Value::as_object)
}

fn path_type_mismatch(path: &str, segment: &str) -> DiscoveryError {
    DiscoveryError::InvalidExpression(format!(
        "PathTypeMismatch: {path:?} expected an object at segment {segment:?}"
    ))
}

fn render_leaf(value: &Value, path: &str) -> Result<String, DiscoveryError> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Null => Err(DiscoveryError::InvalidExpression(format!("path {path:?} resolved to null"))),
        Value::Object(_) | Value::Array(_) => Err(DiscoveryError::InvalidExpression(format!(
            "path {path:?} resolved to a composite value, cannot render as a string"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extracts_nested_string() {
        let obj = json!({"metadata": {"name": "demo"}});
        assert_eq!(extract(&obj, "metadata.name").unwrap(), "demo");
    }

    #[test]
    fn extracts_array_index() {
        let obj = json!({"spec": {"refs": [{"name": "a"}, {"name": "b"}]}});
        assert_eq!(extract(&obj, "spec.refs[1].name").unwrap(), "b");
    }

    #[test]
    fn renders_integers_and_booleans_lexically() {
        let obj = json!({"spec": {"replicas": 3, "enabled": true}});
        assert_eq!(extract(&obj, "spec.replicas").unwrap(), "3");
        assert_eq!(extract(&obj, "spec.enabled").unwrap(), "true");
    }

    #[test]
    fn composite_leaf_is_an_error() {
        let obj = json!({"spec": {"nested": {"a": 1}}});
        assert!(extract(&obj, "spec.nested").is_err());
    }

    #[test]
    fn non_object_intermediate_is_path_type_mismatch() {
        let obj = json!({"spec": "not-an-object"});
        let err = extract(&obj, "spec.name").unwrap_err();
        assert!(matches!(err, DiscoveryError::InvalidExpression(msg) if msg.contains("PathTypeMismatch")));
    }

    #[test]
    fn out_of_range_index_errors() {
        let obj = json!({"spec": {"refs": []}});
        assert!(extract(&obj, "spec.refs[0].name").is_err());
    }
}
