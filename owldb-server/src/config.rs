//! Server configuration: command-line flags plus their resolved values.
//!
//! Grounded on `ferrisdb-storage::config::StorageConfig`'s struct-plus-
//! `Default` shape, with the flag set itself taken from the original's
//! `main.go` invocation (`-p port -s schema -t tokens`), realized with
//! `clap` (the teacher's own `ferrisdb-server` dependency) rather than
//! hand-rolled `env::args` parsing.

use clap::Parser;

/// Command-line configuration for the OwlDB server.
#[derive(Debug, Clone, Parser)]
#[command(name = "owldb", about = "A hierarchical JSON document database")]
pub struct ServerConfig {
    /// Port to listen on.
    #[arg(short = 'p', long, default_value_t = 8080)]
    pub port: u16,

    /// Path to a JSON Schema file that every document body must satisfy.
    #[arg(short = 's', long)]
    pub schema: String,

    /// Optional path to a `{"username": "token", ...}` JSON file to
    /// preload with a 24h lifetime, bypassing the usual `/auth` POST flow.
    #[arg(short = 't', long)]
    pub tokens: Option<String>,

    /// Enable verbose (debug-level) logging.
    #[arg(short = 'v', long, default_value_t = false)]
    pub verbose: bool,
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("0.0.0.0:{}", self.port)
    }
}
