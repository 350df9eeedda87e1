//! Maps [`owldb_core::Error`] onto an axum HTTP response.
//!
//! Grounded on `knhk-workflow-engine`'s `ApiError::to_http_status` pattern
//! (dispatch a domain error to a status code behind a single conversion
//! point) but driven by `owldb_core::Error::status_code()` directly rather
//! than a string-keyed error code, since this crate already has a real
//! closed enum to match on.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use owldb_core::Error;
use serde_json::json;

pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = json!(self.0.to_string());
        (status, Json(body)).into_response()
    }
}

/// Wraps a `(Value, status)` pair produced directly by a store node
/// operation (these already carry their own in-band status, e.g. a 400
/// precondition mismatch, distinct from an `owldb_core::Error`).
pub fn status_response(body: serde_json::Value, status: u16) -> Response {
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::OK);
    (status, Json(body)).into_response()
}
