//! The document node: a JSON body plus metadata, owning a child map of
//! sub-collections.
//!
//! Grounded on `server/document/document.go`'s `Document`/`DocumentContent`
//! and `Patch`, with the canonical path kept as a clean, consistently
//! slash-joined string rather than the original's `strings.Index`-based
//! truncation (see `DESIGN.md` for this and the other deliberate
//! deviations from the source).

use crate::patch::{self, PatchOperation};
use crate::schema::Schema;
use crate::skiplist::SkipList;
use crate::store::collection::Collection;
use owldb_core::{now_ms, Error, Metadata, Result, Timestamp};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// The JSON body, path, and bookkeeping metadata for one document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentContent {
    pub path: String,
    pub doc: Value,
    #[serde(rename = "meta")]
    pub metadata: Metadata,
}

/// Result of applying a batch of patch operations, mirroring the
/// original's `PatchResult`.
#[derive(Debug, Clone, Serialize)]
pub struct PatchResult {
    pub uri: String,
    #[serde(rename = "patchFailed")]
    pub patch_failed: bool,
    pub message: String,
}

pub struct Document {
    content: RwLock<DocumentContent>,
    collections: SkipList<String, Arc<Collection>>,
}

impl Document {
    pub fn new(path: impl Into<String>, doc: Value, user: &str, at: Timestamp) -> Self {
        Document {
            content: RwLock::new(DocumentContent {
                path: path.into(),
                doc,
                metadata: Metadata::new(user, at),
            }),
            collections: SkipList::new(),
        }
    }

    /// Constructs a replacement document preserving the original's
    /// `created_by`/`created_at`, for the timestamp-preconditioned PUT
    /// path.
    pub fn replace(path: impl Into<String>, doc: Value, original: &Metadata, user: &str, at: Timestamp) -> Self {
        Document {
            content: RwLock::new(DocumentContent {
                path: path.into(),
                doc,
                metadata: original.touched(user, at),
            }),
            collections: SkipList::new(),
        }
    }

    pub fn path(&self) -> String {
        self.content.read().path.clone()
    }

    pub fn metadata(&self) -> Metadata {
        self.content.read().metadata.clone()
    }

    pub fn content(&self) -> DocumentContent {
        self.content.read().clone()
    }

    pub fn get(&self) -> (Value, u16) {
        let body = serde_json::to_value(self.content()).unwrap_or(Value::Null);
        (body, 200)
    }

    /// Inserts a fresh sub-collection at `col_name`, failing if one
    /// already exists there.
    pub fn put(&self, col_name: &str, path: &str) -> Result<(Value, u16)> {
        if self.collections.find(&col_name.to_string()).is_some() {
            let message = format!("unable to create collection {col_name}: exists");
            return Ok((Value::String(message), 400));
        }
        let collection = Arc::new(Collection::new(path.to_string()));
        let inserted = self
            .collections
            .upsert(col_name.to_string(), |_, _, exists| {
                if exists {
                    Err(Error::Internal("cannot update existing collection".into()))
                } else {
                    Ok(Arc::clone(&collection))
                }
            })?;
        if !inserted {
            return Err(Error::Internal("inserting into document failed".into()));
        }
        let uri = serde_json::json!({ "uri": format!("/v1/{path}/") });
        Ok((uri, 201))
    }

    pub fn delete(&self, col_name: &str) -> (Value, u16) {
        if self.collections.find(&col_name.to_string()).is_none() {
            let message = format!("unable to delete collection {col_name}: does not exist");
            return (Value::String(message), 404);
        }
        self.collections.delete(&col_name.to_string());
        (Value::String("collection successfully deleted".into()), 204)
    }

    pub fn next(&self, key: &str) -> Result<Arc<Collection>> {
        self.collections
            .find(&key.to_string())
            .map(|node| node.value())
            .ok_or(Error::NotFound)
    }

    /// Applies a sequence of patch operations. Every operation is applied
    /// and re-validated against `schema`; a schema violation aborts with
    /// `Error::BadRequest`. A traversal failure (a path segment that
    /// cannot be resolved) is reported in-band as `patch_failed: true`
    /// with the document left unmodified, per the specification.
    pub fn patch(
        &self,
        user: &str,
        operations: &[PatchOperation],
        schema: &Schema,
        at: Timestamp,
    ) -> Result<PatchResult> {
        let original = self.content();
        let mut working = original.doc.clone();
        let mut patch_failed = false;
        let mut message = "patch applied".to_string();

        for op in operations {
            if let Err(failure) = patch::apply(&mut working, op) {
                patch_failed = true;
                message = failure;
                break;
            }
            if let Err(e) = schema.validate(&working) {
                return Err(e);
            }
        }

        if !patch_failed {
            let mut content = self.content.write();
            content.doc = working;
            content.metadata = original.metadata.touched(user, at);
        }

        Ok(PatchResult {
            uri: format!("/v1/{}", original.path),
            patch_failed,
            message,
        })
    }
}
