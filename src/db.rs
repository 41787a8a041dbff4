//! SQLite connection management for the build artifact.
//!
//! The artifact ships to the mobile app as a single file, so connections use
//! the rollback journal rather than WAL: nothing may be left in a `-wal`
//! sidecar once the build exits. Foreign keys are enforced so the
//! `collection_items` cascades hold during the build as they do on device.

use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;

use crate::config::Config;

/// Create a connection pool to the configured database, creating the file
/// and its parent directories if they don't exist.
pub async fn connect(config: &Config) -> Result<SqlitePool> {
    connect_path(&config.db.path).await
}

/// Create a connection pool to an arbitrary database path.
pub async fn connect_path(db_path: &Path) -> Result<SqlitePool> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Cannot create database directory: {}", parent.display())
            })?;
        }
    }

    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Delete);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .with_context(|| format!("Cannot open database: {}", db_path.display()))?;

    Ok(pool)
}

/// Open an existing database, failing if the file is absent.
pub async fn connect_existing(config: &Config) -> Result<SqlitePool> {
    if !config.db.path.exists() {
        anyhow::bail!(
            "Database file does not exist: {} (run `poemdb build` first)",
            config.db.path.display()
        );
    }
    connect(config).await
}

/// Remove a previous artifact and its journal sidecars so the next build
/// starts from an empty file. Returns `true` if an old file was removed.
pub fn remove_artifact(db_path: &Path) -> Result<bool> {
    let existed = db_path.exists();
    for suffix in ["", "-wal", "-shm", "-journal"] {
        let mut name = db_path.as_os_str().to_owned();
        name.push(suffix);
        let path = Path::new(&name);
        if path.exists() {
            std::fs::remove_file(path)
                .with_context(|| format!("Cannot remove old database: {}", path.display()))?;
        }
    }
    Ok(existed)
}
