use std::time::Duration;

use clap::{Parser, ValueEnum};

use crate::repo::document::DocumentStoreConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BackendKind {
    /// Process-local map, lost on exit
    Memory,
    /// JSON documents in an embedded SQLite database
    Document,
}

#[derive(Parser, Debug)]
#[command(author, version, about = "todoapi — todo REST API with completion metrics", long_about = None)]
pub struct Args {
    /// Port to listen on (`8080` or `:8080`)
    #[arg(long, env = "PORT", value_parser = parse_port)]
    pub port: u16,

    /// Address to bind
    #[arg(long, env = "TODO_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Storage backend
    #[arg(long, env = "TODO_BACKEND", value_enum, default_value_t = BackendKind::Document)]
    pub backend: BackendKind,

    /// Document store location: `memory:`, `sqlite://<dir>` or a directory (default: OS data dir)
    #[arg(long, env = "DOCUMENT_STORE_URI")]
    pub store_uri: Option<String>,

    #[arg(long, env = "DOCUMENT_STORE_DATABASE", default_value = "todo_app")]
    pub database: String,

    #[arg(long, env = "DOCUMENT_STORE_COLLECTION", default_value = "todos")]
    pub collection: String,

    /// Budget for each repository call in milliseconds
    #[arg(long, env = "TODO_OP_TIMEOUT_MS", default_value_t = 5_000)]
    pub op_timeout_ms: u64,

    /// Start the in-memory backend with demo tasks
    #[arg(long, default_value_t = false)]
    pub demo: bool,

    /// Budget for a metrics request in seconds
    #[arg(long, env = "TODO_METRICS_TIMEOUT_SECS", default_value_t = 10)]
    pub metrics_timeout_secs: u64,
}

impl Args {
    pub fn document_store(&self) -> DocumentStoreConfig {
        DocumentStoreConfig {
            uri: self.store_uri.clone(),
            database: self.database.clone(),
            collection: self.collection.clone(),
        }
    }

    pub fn op_timeout(&self) -> Duration {
        Duration::from_millis(self.op_timeout_ms)
    }

    pub fn metrics_timeout(&self) -> Duration {
        Duration::from_secs(self.metrics_timeout_secs)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_port(raw: &str) -> Result<u16, String> {
    let trimmed = raw.trim();
    let digits = trimmed.strip_prefix(':').unwrap_or(trimmed);
    digits
        .parse::<u16>()
        .map_err(|_| format!("invalid port {raw:?}"))
}
