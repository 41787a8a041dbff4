//! Schema initialization for the poem artifact.
//!
//! The DDL here is the contract with the mobile app's queries: table names,
//! column names, and nullability must not drift. Every statement is
//! `IF NOT EXISTS` and the default collection is guarded by a count, so
//! running it any number of times leaves at most one default collection.
//! If a non-default collection already uses the default name, none is
//! created.

use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

pub const DEFAULT_COLLECTION_NAME: &str = "默认收藏";
pub const DEFAULT_COLLECTION_DESCRIPTION: &str = "默认收藏夹";

/// Open the configured database and initialize it.
pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    initialize_schema(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Create tables, indexes, and the default collection if they are absent.
pub async fn initialize_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS poems (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL,
            author TEXT,
            dynasty TEXT,
            content TEXT NOT NULL,
            hot INTEGER DEFAULT 0
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS collections (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            description TEXT,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            is_default INTEGER DEFAULT 0
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS collection_items (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            collection_id INTEGER NOT NULL,
            poem_id INTEGER NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            FOREIGN KEY (collection_id) REFERENCES collections(id) ON DELETE CASCADE,
            FOREIGN KEY (poem_id) REFERENCES poems(id) ON DELETE CASCADE,
            UNIQUE(collection_id, poem_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_author ON poems(author)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_title ON poems(title)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_collection_id ON collection_items(collection_id)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_poem_id ON collection_items(poem_id)")
        .execute(pool)
        .await?;

    let mut tx = pool.begin().await?;
    let defaults: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM collections WHERE is_default = 1")
        .fetch_one(&mut *tx)
        .await?;
    if defaults == 0 {
        let inserted =
            sqlx::query("INSERT INTO collections (name, description, is_default) VALUES (?, ?, 1)")
                .bind(DEFAULT_COLLECTION_NAME)
                .bind(DEFAULT_COLLECTION_DESCRIPTION)
                .execute(&mut *tx)
                .await;
        match inserted {
            Ok(_) => {}
            // A user collection already holds the name; leave zero defaults.
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {}
            Err(e) => return Err(e.into()),
        }
    }
    tx.commit().await?;

    Ok(())
}
