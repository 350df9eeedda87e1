//! JSON-patch document operations.
//!
//! Grounded on `server/objvisitor/objvisitor.go`'s Map/Slice/Bool/Float64/
//! String/Null visitor and `server/document/document.go`'s `Patch`/
//! `SplitPath`. The generic JSON visitor harness named in the
//! specification as an external collaborator is, here, simply an
//! exhaustive match over `serde_json::Value`'s variants — `serde_json`
//! already gives us the closed sum type a visitor would otherwise
//! abstract over, so a separate trait object graph would add nothing.

use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum PatchOp {
    ObjectAdd,
    ArrayAdd,
    ArrayRemove,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PatchOperation {
    pub op: PatchOp,
    pub path: String,
    pub value: Value,
}

/// Splits a patch path of the form `/a/b/c` into `["a", "b", "c"]`. The
/// root path `/` splits to a single empty segment, matching the original
/// `SplitPath`'s `strings.Split(strings.Trim(path, "/"), "/")` behaviour.
pub fn split_path(path: &str) -> Result<Vec<String>, String> {
    if !path.starts_with('/') {
        return Err("path must start with a forward slash".to_string());
    }
    let trimmed = path.trim_matches('/');
    Ok(trimmed.split('/').map(|s| s.to_string()).collect())
}

/// Applies a single patch operation to `doc` in place. On success `doc` is
/// mutated; on failure `doc` is left exactly as it was and an in-band
/// failure message is returned (this is not an `owldb_core::Error` —
/// patch failure is reported to the client as `patchFailed: true` with
/// `HTTP 200`, per the specification).
pub fn apply(doc: &mut Value, op: &PatchOperation) -> Result<(), String> {
    let segments = split_path(&op.path)?;
    let segments: Vec<&str> = segments.iter().map(String::as_str).collect();
    apply_at(doc, &segments, op)
}

fn apply_at(node: &mut Value, segments: &[&str], op: &PatchOperation) -> Result<(), String> {
    match node {
        Value::Object(map) => {
            if op.op == PatchOp::ObjectAdd && segments.len() == 1 {
                map.entry(segments[0].to_string())
                    .or_insert_with(|| op.value.clone());
                return Ok(());
            }
            if op.op == PatchOp::ObjectAdd && segments.is_empty() {
                map.entry(String::new()).or_insert_with(|| op.value.clone());
                return Ok(());
            }
            if segments.is_empty() {
                return Err("invalid type".to_string());
            }
            let head = segments[0];
            let child = map
                .get_mut(head)
                .ok_or_else(|| "error applying patches: map has no key in the middle of the path".to_string())?;
            apply_at(child, &segments[1..], op)
        }
        Value::Array(arr) => {
            if !segments.is_empty() {
                return Err("invalid patch, unfinished in Slice".to_string());
            }
            match op.op {
                PatchOp::ObjectAdd => Err("cannot perform ObjectAdd in Slice".to_string()),
                PatchOp::ArrayAdd => {
                    if !arr.iter().any(|existing| existing == &op.value) {
                        arr.push(op.value.clone());
                    }
                    Ok(())
                }
                PatchOp::ArrayRemove => {
                    if let Some(pos) = arr.iter().position(|existing| existing == &op.value) {
                        arr.remove(pos);
                    }
                    Ok(())
                }
            }
        }
        _ => {
            if !segments.is_empty() {
                Err("invalid patch, unfinished".to_string())
            } else {
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn op(kind: PatchOp, path: &str, value: Value) -> PatchOperation {
        PatchOperation {
            op: kind,
            path: path.to_string(),
            value,
        }
    }

    #[test]
    fn object_add_inserts_new_key() {
        let mut doc = json!({"a": {}});
        apply(&mut doc, &op(PatchOp::ObjectAdd, "/a/b", json!(1))).unwrap();
        assert_eq!(doc, json!({"a": {"b": 1}}));
    }

    #[test]
    fn object_add_is_idempotent() {
        let mut doc = json!({"a": {"b": 1}});
        apply(&mut doc, &op(PatchOp::ObjectAdd, "/a/b", json!(2))).unwrap();
        assert_eq!(doc, json!({"a": {"b": 1}}));
    }

    #[test]
    fn array_add_set_semantics() {
        let mut doc = json!({"items": [1, 2]});
        apply(&mut doc, &op(PatchOp::ArrayAdd, "/items", json!(2))).unwrap();
        assert_eq!(doc, json!({"items": [1, 2]}));
        apply(&mut doc, &op(PatchOp::ArrayAdd, "/items", json!(3))).unwrap();
        assert_eq!(doc, json!({"items": [1, 2, 3]}));
    }

    #[test]
    fn array_remove_absent_is_noop() {
        let mut doc = json!({"items": [1, 2]});
        apply(&mut doc, &op(PatchOp::ArrayRemove, "/items", json!(99))).unwrap();
        assert_eq!(doc, json!({"items": [1, 2]}));
    }

    #[test]
    fn array_remove_present() {
        let mut doc = json!({"items": [1, 2, 3]});
        apply(&mut doc, &op(PatchOp::ArrayRemove, "/items", json!(2))).unwrap();
        assert_eq!(doc, json!({"items": [1, 3]}));
    }

    #[test]
    fn missing_intermediate_key_fails_in_band() {
        let mut doc = json!({"a": {}});
        let result = apply(&mut doc, &op(PatchOp::ObjectAdd, "/missing/b", json!(1)));
        assert!(result.is_err());
        assert_eq!(doc, json!({"a": {}}));
    }

    #[test]
    fn object_add_into_array_errors() {
        let mut doc = json!({"items": [1]});
        let result = apply(&mut doc, &op(PatchOp::ObjectAdd, "/items", json!(1)));
        assert!(result.is_err());
    }
}
