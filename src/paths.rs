//! Where the database lives.

use std::path::Path;

use anyhow::{Context, Result};

/// Resolve the todotree database path.
/// Takes `explicit` when given, then the `TODOTREE_DB` env var, and falls back
/// to `$HOME/.todotree/todotree.db`.
pub fn db_path(explicit: Option<String>) -> String {
    explicit
        .or_else(|| std::env::var("TODOTREE_DB").ok())
        .unwrap_or_else(|| {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".into());
            format!("{home}/.todotree/todotree.db")
        })
}

/// Create the directory holding `db_path` unless it already exists.
pub fn create_db_dir(db_path: &str) -> Result<()> {
    match Path::new(db_path).parent() {
        Some(dir) if !dir.as_os_str().is_empty() => std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create directory {}", dir.display())),
        _ => Ok(()),
    }
}
