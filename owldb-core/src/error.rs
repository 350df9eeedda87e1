//! Error types for OwlDB
//!
//! A single error enum is shared by the storage and server crates so that
//! every handler maps an error to an HTTP status the same way, via
//! [`Error::status_code`], rather than hand-rolling status codes per call
//! site.

use thiserror::Error;

/// The main error type for OwlDB operations.
#[derive(Error, Debug)]
pub enum Error {
    /// No `Authorization` header was present.
    #[error("missing authorization")]
    AuthMissing,

    /// The bearer token was malformed, unknown, or expired.
    #[error("invalid authorization")]
    AuthInvalid,

    /// Malformed path, malformed JSON, a schema violation, or a failed
    /// precondition.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The requested path segment does not exist.
    #[error("not found")]
    NotFound,

    /// The HTTP method is not valid for this path.
    #[error("method not allowed")]
    MethodNotAllowed,

    /// An invariant of the ordered map or store was violated, or a
    /// response could not be marshaled.
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// The HTTP status code this error renders as.
    pub fn status_code(&self) -> u16 {
        match self {
            Error::AuthMissing | Error::AuthInvalid => 401,
            Error::BadRequest(_) => 400,
            Error::NotFound => 404,
            Error::MethodNotAllowed => 405,
            Error::Internal(_) => 500,
        }
    }
}

/// A specialized Result type for OwlDB operations.
pub type Result<T> = std::result::Result<T, Error>;
