//! OwlDB HTTP server: route table, handlers, and shared application state.
//!
//! Split into a library and a thin binary (`main.rs`) the way
//! `knhk-workflow-engine` separates its `knhk_workflow_engine` lib from
//! `src/bin/knhk-workflow.rs`, so the router and its handlers can be
//! exercised directly from integration tests without spawning a process.

pub mod auth;
pub mod auth_endpoint;
pub mod config;
pub mod error_response;
pub mod handlers;
pub mod routes;
pub mod sse;
pub mod state;
