//! OwlDB server entry point.
//!
//! Grounded on the original's `main.go` startup sequence (parse flags,
//! compile schema, preload tokens, listen) and on the teacher's own
//! `clap`/`env_logger` pairing for CLI parsing and log initialization.

use clap::Parser;
use owldb_server::config::ServerConfig;
use owldb_server::state::AppState;
use owldb_storage::schema::Schema;
use std::fs;

#[tokio::main]
async fn main() {
    let config = ServerConfig::parse();

    let log_level = if config.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    let schema_text = fs::read_to_string(&config.schema).unwrap_or_else(|e| {
        log::error!("failed to read schema file {}: {e}", config.schema);
        std::process::exit(1);
    });
    let schema_json: serde_json::Value = serde_json::from_str(&schema_text).unwrap_or_else(|e| {
        log::error!("schema file {} is not valid JSON: {e}", config.schema);
        std::process::exit(1);
    });
    let schema = Schema::compile(schema_json).unwrap_or_else(|e| {
        log::error!("invalid schema passed with -s: {e}");
        std::process::exit(1);
    });

    let state = AppState::new(schema);

    if let Some(token_path) = &config.tokens {
        preload_tokens(token_path, &state);
    }

    let app = owldb_server::routes::build_router(state);
    let addr = config.bind_addr();
    log::info!("listening on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await.unwrap_or_else(|e| {
        log::error!("failed to bind {addr}: {e}");
        std::process::exit(1);
    });
    if let Err(e) = axum::serve(listener, app).await {
        log::error!("server error: {e}");
    }
}

/// Preloads a `{"username": "token", ...}` JSON object, each entry valid
/// for 24h instead of the usual 1h, matching `UnexpiredToken`'s token-file
/// format in the original.
fn preload_tokens(path: &str, state: &AppState) {
    let Ok(contents) = fs::read_to_string(path) else {
        log::error!("failed to read token file {path}");
        return;
    };
    let entries: std::collections::HashMap<String, String> = match serde_json::from_str(&contents) {
        Ok(entries) => entries,
        Err(e) => {
            log::error!("token file {path} is not a valid {{username: token}} JSON object: {e}");
            return;
        }
    };
    for (username, token) in entries {
        state.tokens.preload(&username, &token);
    }
}
