//! Runtime configuration.
//!
//! The database location follows the usual priority: `--db` flag >
//! `DOCGATE_DB` environment variable > default path in the working
//! directory. The logical database layout (the `data` and `settings`
//! tables) is fixed and not configurable.

use clap::Parser;
use std::path::PathBuf;

/// Environment variable naming the SQLite database path.
pub const DB_ENV_VAR: &str = "DOCGATE_DB";

const DEFAULT_DB_PATH: &str = "docgate.db";

#[derive(Debug, Parser)]
#[command(
    name = "docgate",
    version,
    about = "Password-gated CRUD HTTP service over a SQLite document store"
)]
pub struct Config {
    /// Address to bind.
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// Port to listen on.
    #[arg(long, default_value_t = 8000)]
    pub port: u16,

    /// Database path. Overrides the DOCGATE_DB environment variable.
    #[arg(long)]
    pub db: Option<PathBuf>,
}

impl Config {
    /// Resolve the database path: flag > environment > default.
    pub fn db_path(&self) -> PathBuf {
        if let Some(ref path) = self.db {
            return path.clone();
        }
        std::env::var(DB_ENV_VAR)
            .ok()
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_PATH))
    }
}
