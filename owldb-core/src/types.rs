//! Core types used throughout OwlDB
//!
//! This module contains the fundamental data types shared by the storage
//! and server crates: timestamps, document metadata, and a lightweight
//! cancellation primitive that keeps the engine crates independent of any
//! particular HTTP framework's request-cancellation type.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Milliseconds since the Unix epoch.
pub type Timestamp = i64;

/// Current wall-clock time in milliseconds since the Unix epoch.
pub fn now_ms() -> Timestamp {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before epoch")
        .as_millis() as Timestamp
}

/// Metadata carried alongside every document's JSON body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    pub created_by: String,
    pub created_at: Timestamp,
    pub last_modified_by: String,
    pub last_modified_at: Timestamp,
}

impl Metadata {
    pub fn new(user: impl Into<String>, at: Timestamp) -> Self {
        let user = user.into();
        Metadata {
            created_by: user.clone(),
            created_at: at,
            last_modified_by: user,
            last_modified_at: at,
        }
    }

    /// Returns metadata with `created_by`/`created_at` preserved and the
    /// `last_modified_*` fields stamped with `user`/`at`.
    pub fn touched(&self, user: impl Into<String>, at: Timestamp) -> Self {
        Metadata {
            created_by: self.created_by.clone(),
            created_at: self.created_at,
            last_modified_by: user.into(),
            last_modified_at: at,
        }
    }
}

/// A cheap, clonable cancellation flag.
///
/// Threaded from the HTTP layer's request/connection lifecycle into
/// `range` scans and subscription serve loops, so `owldb-storage` never
/// needs to depend on axum's request type.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        CancelToken(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
