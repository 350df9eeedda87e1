//! Core types and error handling for OwlDB
//!
//! This crate contains the fundamental types shared by the storage and
//! server crates. It provides:
//!
//! - A common error type with [`Error`] and [`Result`]
//! - [`Timestamp`]/[`now_ms`] and [`Metadata`] for document bookkeeping
//! - [`CancelToken`], a framework-independent cancellation flag
//!
//! # Example
//!
//! ```
//! use owldb_core::{now_ms, Metadata};
//!
//! let meta = Metadata::new("alice", now_ms());
//! ```

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::*;
