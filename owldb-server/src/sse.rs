//! Server-Sent Events streaming for `GET .../?mode=subscribe`.
//!
//! Grounded on `server/subscription/subscription.go`'s `Serve`: a listener
//! is registered for the request path (plus any `interval` bound), and
//! every notification delivered to it is forwarded as one SSE frame until
//! the client disconnects. `owldb_storage::subscription` already formats
//! each frame as the literal wire text (`event: …\ndata: …\nid: …\n\n`), so
//! this module writes that text straight to the response body instead of
//! handing it to axum's `Event`/`Sse` wrapper — `Event::data` would treat
//! the pre-built frame as a single opaque data value and fold its
//! `event:`/`id:` lines into more `data:` lines, degrading every event to
//! the default `message` type.

use crate::state::AppState;
use axum::body::{Body, Bytes};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use futures::stream::{self, StreamExt};
use owldb_storage::subscription::KEEP_ALIVE_SECS;
use std::collections::HashMap;
use std::convert::Infallible;
use std::time::Duration;
use tokio_stream::wrappers::{IntervalStream, ReceiverStream};

/// Registers a listener for `path` (the full `/v1/...`-relative request
/// path) and streams its notifications as raw SSE frames until the client
/// disconnects. Called directly from `handlers::dispatch_get` when the
/// request carries `?mode=subscribe`, after authentication has already
/// succeeded.
pub async fn subscribe(state: &AppState, path: &str, params: &HashMap<String, String>) -> Response {
    let (lo, hi) = match params.get("interval") {
        Some(itv) => parse_interval(itv),
        None => (None, None),
    };
    let full_path = format!("/{path}");
    let subscription = state.subscriptions.subscribe(&full_path, lo, hi);

    let notifications = ReceiverStream::new(subscription.receiver).map(Bytes::from);
    let first_tick = tokio::time::Instant::now() + Duration::from_secs(KEEP_ALIVE_SECS);
    let ticker = tokio::time::interval_at(first_tick, Duration::from_secs(KEEP_ALIVE_SECS));
    let keep_alive = IntervalStream::new(ticker).map(|_| Bytes::from_static(b"15 sec\n"));
    let body = stream::select(notifications, keep_alive).map(Ok::<_, Infallible>);

    Response::builder()
        .header(header::CONTENT_TYPE, "text/event-stream")
        .header(header::CACHE_CONTROL, "no-cache")
        .header(header::CONNECTION, "keep-alive")
        .body(Body::from_stream(body))
        .unwrap_or_else(|_| Response::new(Body::empty()))
        .into_response()
}

fn parse_interval(itv: &str) -> (Option<String>, Option<String>) {
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
