//! `/auth`: token issuance and revocation.
//!
//! Grounded on `database/system/system.go`'s `handleAuth`: `POST` with a
//! `{"username": "..."}` body returns a fresh bearer token, `DELETE` with
//! an `Authorization: Bearer <token>` header revokes it.

use crate::error_response::{status_response, ApiError};
use crate::state::AppState;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use owldb_core::Error;
use serde::Deserialize;
use serde_json::json;

#[derive(Deserialize)]
struct UsernameBody {
    #[serde(default)]
    username: String,
}

pub async fn issue_token(State(state): State<AppState>, body: axum::body::Bytes) -> Response {
    let parsed: UsernameBody = serde_json::from_slice(&body).unwrap_or(UsernameBody { username: String::new() });
    match state.tokens.issue(&parsed.username) {
        Ok(token) => status_response(json!({ "token": token }), 200),
        Err(e) => ApiError::from(e).into_response(),
    }
}

pub async fn revoke_token(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let Some(header) = headers.get("Authorization") else {
        return ApiError::from(Error::AuthMissing).into_response();
    };
    let Ok(value) = header.to_str() else {
        return ApiError::from(Error::AuthInvalid).into_response();
    };
    let Some(token) = value.strip_prefix("Bearer ") else {
        return ApiError::from(Error::AuthInvalid).into_response();
    };
    if state.tokens.revoke(token) {
        status_response(json!("token revoked"), 204)
    } else {
        ApiError::from(Error::AuthInvalid).into_response()
    }
}
