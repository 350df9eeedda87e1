//! The polymorphic store-node hierarchy: `System`, `Collection`, and
//! `Document`, each an ordered map keyed by one path segment, differing
//! only in what they hold at that segment and what operations make sense
//! there.
//!
//! Grounded on the shared shape of `database/system/system.go`,
//! `database/collection/collection.go`, and `server/document/document.go`:
//! all three expose `Put`/`Delete`/`Next`, which the original dispatches on
//! through a `StoreNode` interface. Rust's trait objects would force every
//! variant's `put`/`get` to share one signature, but they don't (a database
//! `put` takes only a name, a document `put` takes a body and a
//! concurrency precondition) — so the uniform part of the contract (`next`,
//! used purely for path traversal) is expressed as an enum method, and the
//! kind-specific operations are called directly on the concrete type the
//! dispatcher in `owldb-server` resolves to.

pub mod collection;
pub mod document;
pub mod system;

use collection::Collection;
use document::Document;
use owldb_core::{Error, Result};
use std::sync::Arc;
use system::System;

/// A resolved store node, as returned by path traversal. Alternates
/// Collection/Document by depth below the root `System`.
#[derive(Clone)]
pub enum Node {
    System(Arc<System>),
    Collection(Arc<Collection>),
    Document(Arc<Document>),
}

impl Node {
    /// Advances one path segment, dispatching to the concrete node's
    /// `next`. `System` and `Document` both descend into a `Collection`;
    /// `Collection` descends into a `Document`, matching the alternating
    /// collection/document structure every path has below the root.
    /// Returns `Error::NotFound` if `key` doesn't resolve.
    pub fn next(&self, key: &str) -> Result<Node> {
        match self {
            Node::System(system) => system.next(key).map(Node::Collection),
            Node::Collection(collection) => collection.next(key).map(Node::Document),
            Node::Document(document) => document.next(key).map(Node::Collection),
        }
    }

    pub fn as_system(&self) -> Result<&Arc<System>> {
        match self {
            Node::System(system) => Ok(system),
            _ => Err(Error::MethodNotAllowed),
        }
    }

    pub fn as_collection(&self) -> Result<&Arc<Collection>> {
        match self {
            Node::Collection(collection) => Ok(collection),
            _ => Err(Error::MethodNotAllowed),
        }
    }

    pub fn as_document(&self) -> Result<&Arc<Document>> {
        match self {
            Node::Document(document) => Ok(document),
            _ => Err(Error::MethodNotAllowed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn traversal_alternates_collection_and_document() {
        let system = Arc::new(System::new());
        system.put("db1").unwrap();
        let root = Node::System(Arc::clone(&system));

        let db = root.next("db1").unwrap();
        assert!(matches!(db, Node::Collection(_)));

        db.as_collection()
            .unwrap()
            .put("doc1", serde_json::json!({}), "alice", 1000, None)
            .unwrap();
        let doc = db.next("doc1").unwrap();
        assert!(matches!(doc, Node::Document(_)));
    }

    #[test]
    fn next_on_missing_segment_is_not_found() {
        let system = Arc::new(System::new());
        let root = Node::System(system);
        assert!(matches!(root.next("nope"), Err(Error::NotFound)));
    }
}
