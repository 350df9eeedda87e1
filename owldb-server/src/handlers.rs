//! Path resolution and HTTP verb dispatch for `/v1/*`.
//!
//! Grounded on `database/system/system.go`'s `handlePath`/`handleRequest`:
//! the path is split on `/` (leading/trailing slashes trimmed), walked
//! segment by segment through [`owldb_storage::store::Node::next`], and the
//! last segment is handled by the verb-appropriate operation on whatever
//! kind of node the walk stopped one short of. Unlike the original (which
//! returns 400 for every `Next` miss along the way, and inconsistently 400
//! or 404 at the final segment), every resolution failure here is a
//! uniform 404 — see `DESIGN.md` open question 5.

use crate::auth::authenticate;
use crate::error_response::{status_response, ApiError};
use crate::state::AppState;
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use owldb_core::{now_ms, CancelToken, Error};
use owldb_storage::patch::PatchOperation;
use owldb_storage::store::Node;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Splits a `/v1/`-relative path into its non-empty segments.
fn split_segments(path: &str) -> Vec<&str> {
    path.trim_matches('/').split('/').filter(|s| !s.is_empty()).collect()
}

fn resolve_parent(state: &AppState, segments: &[&str]) -> Result<Node, Error> {
    let mut node = Node::System(Arc::clone(&state.system));
    for segment in segments {
        node = node.next(segment)?;
    }
    Ok(node)
}

fn node_body(node: &Node, cancel: &CancelToken, lo: Option<&String>, hi: Option<&String>) -> Result<Value, Error> {
    match node {
        Node::Collection(collection) => collection.get_all(cancel, lo, hi),
        Node::Document(document) => Ok(document.get().0),
        Node::System(_) => Err(Error::Internal("GET resolved to the system root".into())),
    }
}

fn node_path(node: &Node) -> String {
    match node {
        Node::Collection(collection) => collection.path().to_string(),
        Node::Document(document) => document.path(),
        Node::System(_) => String::new(),
    }
}

pub async fn dispatch_get(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(path): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    if let Err(e) = authenticate(&headers, &state.tokens) {
        return ApiError::from(e).into_response();
    }
    if params.get("mode").map(String::as_str) == Some("subscribe") {
        return crate::sse::subscribe(&state, &path, &params).await;
    }
    match handle_get(&state, &headers, &path, &params).await {
        Ok(resp) => resp,
        Err(e) => ApiError::from(e).into_response(),
    }
}

async fn handle_get(
    state: &AppState,
    headers: &HeaderMap,
    path: &str,
    params: &HashMap<String, String>,
) -> Result<Response, Error> {
    authenticate(headers, &state.tokens)?;
    let segments = split_segments(path);
    let (parent_segments, last) = split_last(&segments)?;
    let parent = resolve_parent(state, parent_segments)?;
    let resolved = parent.next(last)?;

    let (lo, hi) = interval_bounds(params.get("interval"));
    let cancel = CancelToken::new();
    let body = node_body(&resolved, &cancel, lo.as_ref(), hi.as_ref())?;
    Ok(status_response(body, 200))
}

pub async fn dispatch_put(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(path): Path<String>,
    Query(params): Query<HashMap<String, String>>,
    body: axum::body::Bytes,
) -> Response {
    match handle_put(&state, &headers, &path, &params, &body).await {
        Ok(resp) => resp,
        Err(e) => ApiError::from(e).into_response(),
    }
}

async fn handle_put(
    state: &AppState,
    headers: &HeaderMap,
    path: &str,
    params: &HashMap<String, String>,
    body: &[u8],
) -> Result<Response, Error> {
    let user = authenticate(headers, &state.tokens)?;
    let segments = split_segments(path);
    let (parent_segments, last) = split_last(&segments)?;
    let parent = resolve_parent(state, parent_segments)?;
    let at = now_ms();

    let (response_body, status) = match &parent {
        Node::System(system) => system.put(last)?,
        Node::Document(document) => document.put(last, &format!("{}/{}", document.path(), last))?,
        Node::Collection(collection) => {
            let payload: Value =
                serde_json::from_slice(body).map_err(|e| Error::BadRequest(format!("invalid JSON: {e}")))?;
            state.schema.validate(&payload)?;
            let precondition = match params.get("timestamp") {
                Some(ts) => Some(
                    ts.parse::<i64>()
                        .map_err(|_| Error::BadRequest("timestamp must be a number".into()))?,
                ),
                None => None,
            };
            collection.put(last, payload, &user, at, precondition)?
        }
    };

    if status == 201 || status == 200 {
        notify_put(state, &parent, last, path).await;
    }
    Ok(status_response(response_body, status))
}

pub async fn dispatch_delete(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(path): Path<String>,
) -> Response {
    match handle_delete(&state, &headers, &path).await {
        Ok(resp) => resp,
        Err(e) => ApiError::from(e).into_response(),
    }
}

async fn handle_delete(state: &AppState, headers: &HeaderMap, path: &str) -> Result<Response, Error> {
    authenticate(headers, &state.tokens)?;
    let segments = split_segments(path);
    let (parent_segments, last) = split_last(&segments)?;
    let parent = resolve_parent(state, parent_segments)?;

    let (response_body, status) = match &parent {
        Node::System(system) => system.delete(last),
        Node::Collection(collection) => collection.delete(last),
        Node::Document(document) => document.delete(last),
    };

    if status == 204 {
        let notify_path = if segments.len() == 1 {
            format!("/{}/", segments[0])
        } else {
            format!("/{}", segments.join("/"))
        };
        // The payload is the deleted path relative to the first segment (the
        // database name), not just the deleted node's own name: deleting
        // `db1/doc1/col1` reports `/doc1/col1`, not `/col1`, matching
        // `system.go`'s `pathDel2` (everything after the first `/` once the
        // `/v1/` prefix is stripped). Deleting a database itself collapses to
        // exactly `"/"`.
        let payload = if segments.len() == 1 {
            "/".to_string()
        } else {
            format!("/{}", segments[1..].join("/"))
        };
        state.subscriptions.notify(&notify_path, "delete", &Value::String(payload)).await;
    }
    Ok(status_response(response_body, status))
}

pub async fn dispatch_post(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(path): Path<String>,
    body: axum::body::Bytes,
) -> Response {
    match handle_post(&state, &headers, &path, &body).await {
        Ok(resp) => resp,
        Err(e) => ApiError::from(e).into_response(),
    }
}

async fn handle_post(state: &AppState, headers: &HeaderMap, path: &str, body: &[u8]) -> Result<Response, Error> {
    let user = authenticate(headers, &state.tokens)?;
    let segments = split_segments(path);
    let resolved = resolve_parent(state, &segments)?;
    let collection = resolved.as_collection()?;

    let payload: Value = serde_json::from_slice(body).map_err(|e| Error::BadRequest(format!("invalid JSON: {e}")))?;
    state.schema.validate(&payload)?;
    let (response_body, status) = collection.post(payload, &user, now_ms())?;

    if status == 201 {
        if let Some(uri) = response_body.get("uri").and_then(Value::as_str) {
            if let Some(doc_name) = uri.rsplit('/').next() {
                if let Ok(doc_node) = collection.next(doc_name) {
                    let full_path = format!("/{}/{doc_name}", collection.path());
                    state
                        .subscriptions
                        .notify(&full_path, "update", &doc_node.get().0)
                        .await;
                }
            }
        }
    }
    Ok(status_response(response_body, status))
}

pub async fn dispatch_patch(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(path): Path<String>,
    body: axum::body::Bytes,
) -> Response {
    match handle_patch(&state, &headers, &path, &body).await {
        Ok(resp) => resp,
        Err(e) => ApiError::from(e).into_response(),
    }
}

async fn handle_patch(state: &AppState, headers: &HeaderMap, path: &str, body: &[u8]) -> Result<Response, Error> {
    let user = authenticate(headers, &state.tokens)?;
    let segments = split_segments(path);
    let resolved = resolve_parent(state, &segments)?;
    let document = resolved.as_document()?;

    let operations: Vec<PatchOperation> =
        serde_json::from_slice(body).map_err(|e| Error::BadRequest(format!("invalid JSON: {e}")))?;
    let result = document.patch(&user, &operations, &state.schema, now_ms())?;

    if !result.patch_failed {
        let full_path = format!("/{}", document.path());
        state.subscriptions.notify(&full_path, "update", &document.get().0).await;
    }
    Ok(status_response(serde_json::to_value(&result).unwrap_or(Value::Null), 200))
}

async fn notify_put(state: &AppState, parent: &Node, last: &str, _path: &str) {
    if let Ok(resolved) = parent.next(last) {
        let cancel = CancelToken::new();
        if let Ok(body) = node_body(&resolved, &cancel, None, None) {
            let full_path = match &resolved {
                Node::Collection(_) => format!("/{}/", node_path(&resolved)),
                Node::Document(_) => format!("/{}", node_path(&resolved)),
                Node::System(_) => return,
            };
            state.subscriptions.notify(&full_path, "update", &body).await;
        }
    }
}

fn split_last<'a>(segments: &'a [&'a str]) -> Result<(&'a [&'a str], &'a str), Error> {
    segments
        .split_last()
        .map(|(last, rest)| (rest, *last))
        .ok_or_else(|| Error::BadRequest("empty path".into()))
}

fn interval_bounds(raw: Option<&String>) -> (Option<String>, Option<String>) {
    let Some(itv) = raw else { return (None, None) };
    match itv.find(',') {
        Some(idx) if itv.len() >= 2 => {
            let lo = itv[1..idx].to_string();
            let hi = itv[idx + 1..itv.len() - 1].to_string();
            (
                if lo.is_empty() { None } else { Some(lo) },
                if hi.is_empty() { None } else { Some(hi) },
            )
        }
        _ => (None, None),
    }
}

pub async fn options_handler() -> impl IntoResponse {
    use axum::http::{HeaderValue, StatusCode};
    let mut response = StatusCode::OK.into_response();
    let headers = response.headers_mut();
    headers.insert("Allow", HeaderValue::from_static("GET,POST,PUT,DELETE,OPTIONS,PATCH"));
    headers.insert("Access-Control-Allow-Origin", HeaderValue::from_static("*"));
    headers.insert(
        "Access-Control-Allow-Methods",
        HeaderValue::from_static("GET,POST,PUT,DELETE,OPTIONS,PATCH"),
    );
    headers.insert(
        "Access-Control-Allow-Headers",
        HeaderValue::from_static("Content-Type,Authorization"),
    );
    response
}
