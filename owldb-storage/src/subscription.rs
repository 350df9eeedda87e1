//! Per-path SSE subscription registry.
//!
//! Grounded on `server/subscription/subscription.go`: listeners are
//! registered under the exact URL path they subscribed to (trailing slash
//! preserved for database/collection paths), each carrying an optional
//! `[lo, hi]` key interval. `notify` classifies the changed path the same
//! way the original does: a trailing slash means a database/collection
//! target (with possible array-to-per-document event splitting), anything
//! else is a document target that also fans out to its parent collection
//! with the interval filter applied to the document's terminal segment.

use crate::skiplist::SkipList;
use log::error;
use owldb_core::now_ms;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;

/// SSE keep-alive cadence.
pub const KEEP_ALIVE_SECS: u64 = 15;

#[derive(Clone)]
struct Listener {
    id: u64,
    sender: mpsc::Sender<String>,
    lo: Option<String>,
    hi: Option<String>,
}

/// A single subscriber's handle: an id (for deregistration) and the
/// receiving half of its event channel.
pub struct Subscription {
    pub id: u64,
    pub receiver: mpsc::Receiver<String>,
}

pub struct SubscriptionRegistry {
    content: SkipList<String, Vec<Listener>>,
    next_id: AtomicU64,
}

impl Default for SubscriptionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        SubscriptionRegistry {
            content: SkipList::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Registers a new listener on `path` with an optional key interval,
    /// returning its id (for later `unsubscribe`) and the receiving end of
    /// its channel. The channel has capacity 1, approximating the
    /// original's unbuffered Go channel: a send blocks until this listener
    /// (and only this listener) receives it.
    pub fn subscribe(&self, path: &str, lo: Option<String>, hi: Option<String>) -> Subscription {
        let (sender, receiver) = mpsc::channel(1);
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let entry = Listener { id, sender, lo, hi };
        let _ = self.content.upsert(path.to_string(), move |_, current, _| {
            let mut listeners = current.cloned().unwrap_or_default();
            listeners.push(entry.clone());
            Ok(listeners)
        });
        Subscription { id, receiver }
    }

    /// Removes the listener `id` from `path`'s registration.
    pub fn unsubscribe(&self, path: &str, id: u64) {
        let _ = self.content.upsert(path.to_string(), move |_, current, exists| {
            if !exists {
                return Err(owldb_core::Error::NotFound);
            }
            let mut listeners = current.cloned().unwrap_or_default();
            listeners.retain(|l| l.id != id);
            Ok(listeners)
        });
    }

    /// Notifies subscribers of a change at `path`. `event` is `"update"` or
    /// `"delete"`; `payload` is the JSON to deliver (a document content
    /// object, an array of document contents for a collection snapshot, or
    /// a bare JSON string path for a structural delete).
    pub async fn notify(&self, path: &str, event: &str, payload: &Value) {
        if path.ends_with('/') {
            if let Some(node) = self.content.find(&path.to_string()) {
                let listeners = node.value();
                if is_structural_delete(payload) {
                    self.send_all(&listeners, event, payload).await;
                } else if let Value::Array(items) = payload {
                    for item in items {
                        self.send_all(&listeners, event, item).await;
                    }
                } else {
                    error!("notify: expected array payload for collection path {path}");
                }
            }
        } else {
            let (parent, last_segment) = split_parent(path);
            if let Some(node) = self.content.find(&parent) {
                let listeners = node.value();
                self.send_filtered(&listeners, event, payload, &last_segment)
                    .await;
            }
            if let Some(node) = self.content.find(&path.to_string()) {
                let listeners = node.value();
                self.send_all(&listeners, event, payload).await;
            }
        }
    }

    async fn send_all(&self, listeners: &[Listener], event: &str, payload: &Value) {
        let id = now_ms();
        let frame = sse_frame(event, payload, id);
        for listener in listeners {
            if listener.sender.send(frame.clone()).await.is_err() {
                error!("notify: listener {} disconnected", listener.id);
            }
        }
    }

    async fn send_filtered(&self, listeners: &[Listener], event: &str, payload: &Value, key: &str) {
        let id = now_ms();
        let frame = sse_frame(event, payload, id);
        for listener in listeners {
            let lo_ok = listener.lo.as_deref().map_or(true, |lo| lo.is_empty() || key >= lo);
            let hi_ok = listener.hi.as_deref().map_or(true, |hi| hi.is_empty() || key <= hi);
            if lo_ok && hi_ok {
                if listener.sender.send(frame.clone()).await.is_err() {
                    error!("notify: listener {} disconnected", listener.id);
                }
            }
        }
    }
}

fn is_structural_delete(payload: &Value) -> bool {
    matches!(payload, Value::String(s) if s.starts_with('/'))
}

fn sse_frame(event: &str, payload: &Value, id: i64) -> String {
    format!("event: {event}\ndata: {payload}\nid: {id}\n\n")
}

/// Splits `/db/col/doc` into (`"/db/col/"`, `"doc"`).
fn split_parent(path: &str) -> (String, String) {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(idx) => {
            let (parent, rest) = trimmed.split_at(idx);
            let last = &rest[1..];
            (format!("{parent}/"), last.to_string())
        }
        None => ("/".to_string(), trimmed.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn document_update_reaches_document_and_collection_listeners() {
        let registry = SubscriptionRegistry::new();
        let mut doc_sub = registry.subscribe("/db1/doc1", None, None);
        let mut col_sub = registry.subscribe("/db1/", None, None);

        registry
            .notify("/db1/doc1", "update", &json!({"a": 1}))
            .await;

        assert!(doc_sub.receiver.recv().await.unwrap().contains("event: update"));
        assert!(col_sub.receiver.recv().await.unwrap().contains("event: update"));
    }

    #[tokio::test]
    async fn collection_array_payload_splits_per_document() {
        let registry = SubscriptionRegistry::new();
        let mut sub = registry.subscribe("/db1/", None, None);
        let payload = json!([{"a": 1}, {"a": 2}]);

        registry.notify("/db1/", "update", &payload).await;

        let first = sub.receiver.recv().await.unwrap();
        let second = sub.receiver.recv().await.unwrap();
        assert!(first.contains("\"a\":1"));
        assert!(second.contains("\"a\":2"));
    }

    #[tokio::test]
    async fn interval_filter_excludes_out_of_range_document() {
        let registry = SubscriptionRegistry::new();
        let mut sub = registry.subscribe("/db1/", Some("m".to_string()), Some("z".to_string()));

        registry.notify("/db1/aaa", "update", &json!({"x": 1})).await;
        registry.notify("/db1/zzz", "update", &json!({"x": 2})).await;

        let frame = tokio::time::timeout(std::time::Duration::from_millis(50), sub.receiver.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(frame.contains("\"x\":2"));
    }

    #[tokio::test]
    async fn unsubscribe_stops_delivery() {
        let registry = SubscriptionRegistry::new();
        let sub = registry.subscribe("/db1/doc1", None, None);
        registry.unsubscribe("/db1/doc1", sub.id);

        registry
            .notify("/db1/doc1", "update", &json!({"a": 1}))
            .await;
        // No listener remains; nothing to assert beyond "doesn't hang/panic".
    }
}
