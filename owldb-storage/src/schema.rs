//! JSON Schema validation wrapper.
//!
//! Grounded on `database/validation/validation.go`, which wraps the Go
//! `santhosh-tekuri/jsonschema` library behind a single `Validate` call.
//! Rust's equivalent ecosystem crate is `jsonschema`; this module gives it
//! the same narrow, single-purpose wrapper so callers never touch the
//! validator directly.

use jsonschema::JSONSchema;
use owldb_core::{Error, Result};
use serde_json::Value;

/// A compiled JSON Schema, shared read-only across every document write.
///
/// `jsonschema::JSONSchema` borrows from the `Value` it was compiled from,
/// but a schema loaded once at startup needs to outlive every request task
/// it's shared with. Rather than threading that lifetime through
/// `AppState` and every handler, the source document is leaked once here —
/// one schema per process, for the life of the process, same as the
/// original's compile-at-startup validator.
pub struct Schema {
    compiled: JSONSchema<'static>,
}

impl Schema {
    /// Compiles `definition` (already-parsed JSON Schema) once at startup.
    pub fn compile(definition: Value) -> Result<Self> {
        let leaked: &'static Value = Box::leak(Box::new(definition));
        let compiled = JSONSchema::compile(leaked)
            .map_err(|e| Error::BadRequest(format!("invalid schema: {e}")))?;
        Ok(Schema { compiled })
    }

    /// Validates `doc` against the compiled schema, returning a
    /// human-readable error describing the first violation.
    pub fn validate(&self, doc: &Value) -> Result<()> {
        self.compiled.validate(doc).map_err(|mut errors| {
            let message = errors
                .next()
                .map(|e| e.to_string())
                .unwrap_or_else(|| "schema validation failed".to_string());
            Error::BadRequest(message)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_matching_document() {
        let schema = Schema::compile(json!({
            "type": "object",
            "properties": { "name": { "type": "string" } },
            "required": ["name"]
        }))
        .unwrap();
        assert!(schema.validate(&json!({"name": "alice"})).is_ok());
    }

    #[test]
    fn rejects_mismatched_document() {
        let schema = Schema::compile(json!({
            "type": "object",
            "properties": { "name": { "type": "string" } },
            "required": ["name"]
        }))
        .unwrap();
        assert!(schema.validate(&json!({"name": 5})).is_err());
        assert!(schema.validate(&json!({})).is_err());
    }
}
