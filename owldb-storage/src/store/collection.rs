//! The collection node: an ordered map of document names to documents.
//!
//! Grounded on `database/collection/collection.go`'s `Collection`, including
//! its range-scan based `Get` (honoring `interval`/`mode` query semantics)
//! and its token-generating `Post`.

use crate::skiplist::SkipList;
use crate::store::document::Document;
use owldb_core::{now_ms, CancelToken, Error, Result, Timestamp};
use serde_json::Value;
use std::sync::Arc;

pub struct Collection {
    path: String,
    documents: SkipList<String, Arc<Document>>,
}

impl Collection {
    pub fn new(path: impl Into<String>) -> Self {
        Collection {
            path: path.into(),
            documents: SkipList::new(),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Creates or overwrites the document at `doc_name`. When `precondition`
    /// is `Some(ts)`, the write is a `VerifyTime`-style guarded replace: the
    /// document must already exist (404 if not) and its `last_modified_at`
    /// must equal `ts` (400 on mismatch, no mutation either way), matching
    /// `collection.go`'s `VerifyTime`.
    pub fn put(
        &self,
        doc_name: &str,
        body: Value,
        user: &str,
        at: Timestamp,
        precondition: Option<Timestamp>,
    ) -> Result<(Value, u16)> {
        let doc_path = join_path(&self.path, doc_name);
        let existing = self.documents.find(&doc_name.to_string());

        if let Some(ts) = precondition {
            match &existing {
                Some(node) => {
                    if node.value().metadata().last_modified_at != ts {
                        return Ok((
                            Value::String("pre-condition timestamp doesn't match current timestamp".into()),
                            400,
                        ));
                    }
                }
                None => {
                    return Ok((Value::String(format!("document {doc_name} not found")), 404));
                }
            }
        }

        let new_doc = match &existing {
            Some(node) => Arc::new(Document::replace(
                doc_path.clone(),
                body,
                &node.value().metadata(),
                user,
                at,
            )),
            None => Arc::new(Document::new(doc_path.clone(), body, user, at)),
        };
        let created = existing.is_none();

        let inserted = self
            .documents
            .upsert(doc_name.to_string(), |_, _, _| Ok(Arc::clone(&new_doc)))?;
        if !inserted {
            return Err(Error::Internal("document upsert failed".into()));
        }

        let uri = serde_json::json!({ "uri": format!("/v1/{doc_path}") });
        Ok((uri, if created { 201 } else { 200 }))
    }

    /// Returns either a single document (if `doc_name` resolves) or, for a
    /// collection-level `GET`, the full set of documents in `[lo, hi]`
    /// order as a JSON array, honoring cancellation mid-scan.
    pub fn get_all(&self, cancel: &CancelToken, lo: Option<&String>, hi: Option<&String>) -> Result<Value> {
        let nodes = self
            .documents
            .range(cancel, lo, hi)
            .ok_or_else(|| Error::Internal("collection scan observed inconsistent state".into()))?;
        let docs: Vec<Value> = nodes
            .iter()
            .map(|node| serde_json::to_value(node.value().content()).unwrap_or(Value::Null))
            .collect();
        Ok(Value::Array(docs))
    }

    pub fn delete(&self, doc_name: &str) -> (Value, u16) {
        match self.documents.delete(&doc_name.to_string()) {
            Some(_) => (Value::String("document successfully deleted".into()), 204),
            None => (
                Value::String(format!("unable to delete document {doc_name}: does not exist")),
                404,
            ),
        }
    }

    /// Creates a document with a server-generated name, the `POST`
    /// semantics: a 12-byte random token turned into a document name via
    /// the same encoding the auth layer uses for bearer tokens.
    pub fn post(&self, body: Value, user: &str, at: Timestamp) -> Result<(Value, u16)> {
        loop {
            let name = crate::token::generate_name();
            if self.documents.find(&name).is_some() {
                continue;
            }
            return self.put(&name, body, user, at, None);
        }
    }

    pub fn next(&self, key: &str) -> Result<Arc<Document>> {
        self.documents
            .find(&key.to_string())
            .map(|node| node.value())
            .ok_or(Error::NotFound)
    }
}

fn join_path(base: &str, segment: &str) -> String {
    if base.is_empty() {
        segment.to_string()
    } else {
        format!("{base}/{segment}")
    }
}
