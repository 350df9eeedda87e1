//! The system node: the root of the database, an ordered map of database
//! names to top-level collections.
//!
//! Grounded on `database/system/system.go`'s `System`, minus the
//! request-dispatch logic (`handleRequest`/`handlePath`), which belongs to
//! `owldb-server` rather than the storage layer — the storage layer here
//! exposes only `put`/`delete`/`next`, the same uniform shape every other
//! store node exposes.

use crate::skiplist::SkipList;
use crate::store::collection::Collection;
use owldb_core::{Error, Result};
use serde_json::Value;
use std::sync::Arc;

/// The database root. There is exactly one `System` per running server.
pub struct System {
    databases: SkipList<String, Arc<Collection>>,
}

impl Default for System {
    fn default() -> Self {
        Self::new()
    }
}

impl System {
    pub fn new() -> Self {
        System {
            databases: SkipList::new(),
        }
    }

    /// Creates a new top-level database named `db_name`.
    pub fn put(&self, db_name: &str) -> Result<(Value, u16)> {
        if self.databases.find(&db_name.to_string()).is_some() {
            let message = format!("unable to create database {db_name}: exists");
            return Ok((Value::String(message), 400));
        }
        let collection = Arc::new(Collection::new(db_name.to_string()));
        let inserted = self
            .databases
            .upsert(db_name.to_string(), |_, _, exists| {
                if exists {
                    Err(Error::Internal("cannot overwrite existing database".into()))
                } else {
                    Ok(Arc::clone(&collection))
                }
            })?;
        if !inserted {
            return Err(Error::Internal("inserting database failed".into()));
        }
        let uri = serde_json::json!({ "uri": format!("/v1/{db_name}") });
        Ok((uri, 201))
    }

    pub fn delete(&self, db_name: &str) -> (Value, u16) {
        match self.databases.delete(&db_name.to_string()) {
            Some(_) => (Value::String("database successfully deleted".into()), 204),
            None => (
                Value::String(format!("unable to delete database {db_name}: does not exist")),
                404,
            ),
        }
    }

    pub fn next(&self, key: &str) -> Result<Arc<Collection>> {
        self.databases
            .find(&key.to_string())
            .map(|node| node.value())
            .ok_or(Error::NotFound)
    }

    /// There is no document content at the system level; a resolved path of
    /// depth zero is a dispatcher bug, not a client-reachable state (the
    /// path resolver in `owldb-server` rejects `GET /v1/` before it ever
    /// calls here).
    pub fn get(&self) -> Result<Value> {
        Err(Error::Internal("GET at system root is not a reachable path".into()))
    }
}
