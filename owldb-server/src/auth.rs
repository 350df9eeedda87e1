//! Bearer-token extraction for the `/v1/*` routes.
//!
//! Grounded on `database/system/system.go`'s `handleRequest`: a missing or
//! unrecognized `Authorization: Bearer <token>` header is rejected before
//! any path resolution happens.

use axum::http::HeaderMap;
use owldb_core::Error;
use owldb_storage::token::TokenTable;

/// Extracts and checks the bearer token from `headers`, returning the
/// username it belongs to.
pub fn authenticate(headers: &HeaderMap, tokens: &TokenTable) -> Result<String, Error> {
    let header = headers.get("Authorization").ok_or(Error::AuthMissing)?;
    let value = header.to_str().map_err(|_| Error::AuthInvalid)?;
    let token = value.strip_prefix("Bearer ").ok_or(Error::AuthInvalid)?;
    tokens.check(token).ok_or(Error::AuthInvalid)
}
