//! Verification report for a built artifact.
//!
//! Used by `poemdb stats` after a build to confirm the file holds what the
//! app expects: the three tables with their columns, the indexes, row
//! counts per dynasty, the hot subset, and a clean `integrity_check`.

use anyhow::{bail, Result};
use sqlx::{Row, SqlitePool};
use std::path::Path;

use crate::config::Config;
use crate::db;
use crate::progress::format_number;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableInfo {
    pub name: String,
    /// `(column name, declared type)` in schema order.
    pub columns: Vec<(String, String)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SamplePoem {
    pub id: i64,
    pub title: String,
    pub author: Option<String>,
    pub dynasty: Option<String>,
}

#[derive(Debug, Clone)]
pub struct DatabaseReport {
    pub size_bytes: u64,
    pub tables: Vec<TableInfo>,
    pub total_poems: i64,
    pub authors: i64,
    pub dynasties: i64,
    /// `(dynasty, count)`, largest first.
    pub by_dynasty: Vec<(Option<String>, i64)>,
    pub hot: i64,
    pub collections: i64,
    pub samples: Vec<SamplePoem>,
    pub indexes: Vec<String>,
    pub integrity: String,
}

impl DatabaseReport {
    pub fn integrity_ok(&self) -> bool {
        self.integrity == "ok"
    }
}

pub async fn collect_report(pool: &SqlitePool, db_path: &Path) -> Result<DatabaseReport> {
    let size_bytes = std::fs::metadata(db_path).map(|m| m.len()).unwrap_or(0);

    let table_names: Vec<String> =
        sqlx::query_scalar("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
            .fetch_all(pool)
            .await?;

    let mut tables = Vec::with_capacity(table_names.len());
    for name in table_names {
        let rows = sqlx::query(&format!(
            "PRAGMA table_info(\"{}\")",
            name.replace('"', "\"\"")
        ))
        .fetch_all(pool)
        .await?;
        let columns = rows
            .iter()
            .map(|row| (row.get::<String, _>("name"), row.get::<String, _>("type")))
            .collect();
        tables.push(TableInfo { name, columns });
    }

    if !tables.iter().any(|t| t.name == "poems") {
        return Ok(DatabaseReport {
            size_bytes,
            tables,
            total_poems: 0,
            authors: 0,
            dynasties: 0,
            by_dynasty: Vec::new(),
            hot: 0,
            collections: 0,
            samples: Vec::new(),
            indexes: Vec::new(),
            integrity: integrity_check(pool).await?,
        });
    }

    let totals = sqlx::query(
        "SELECT COUNT(*) AS total, COUNT(DISTINCT author) AS authors, \
         COUNT(DISTINCT dynasty) AS dynasties FROM poems",
    )
    .fetch_one(pool)
    .await?;

    let by_dynasty = sqlx::query(
        "SELECT dynasty, COUNT(*) AS count FROM poems GROUP BY dynasty ORDER BY count DESC, dynasty",
    )
    .fetch_all(pool)
    .await?
    .iter()
    .map(|row| (row.get::<Option<String>, _>("dynasty"), row.get::<i64, _>("count")))
    .collect();

    let hot: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM poems WHERE hot = 1")
        .fetch_one(pool)
        .await?;

    let collections: i64 = if tables.iter().any(|t| t.name == "collections") {
        sqlx::query_scalar("SELECT COUNT(*) FROM collections")
            .fetch_one(pool)
            .await?
    } else {
        0
    };

    let samples = sqlx::query("SELECT id, title, author, dynasty FROM poems ORDER BY id LIMIT 3")
        .fetch_all(pool)
        .await?
        .iter()
        .map(|row| SamplePoem {
            id: row.get("id"),
            title: row.get("title"),
            author: row.get("author"),
            dynasty: row.get("dynasty"),
        })
        .collect();

    let indexes: Vec<String> = sqlx::query_scalar(
        "SELECT name FROM sqlite_master WHERE type = 'index' AND name NOT LIKE 'sqlite_%' ORDER BY name",
    )
    .fetch_all(pool)
    .await?;

    Ok(DatabaseReport {
        size_bytes,
        tables,
        total_poems: totals.get("total"),
        authors: totals.get("authors"),
        dynasties: totals.get("dynasties"),
        by_dynasty,
        hot,
        collections,
        samples,
        indexes,
        integrity: integrity_check(pool).await?,
    })
}

async fn integrity_check(pool: &SqlitePool) -> Result<String> {
    let rows: Vec<String> = sqlx::query_scalar("PRAGMA integrity_check")
        .fetch_all(pool)
        .await?;
    Ok(rows.join("; "))
}

/// CLI entry point for `poemdb stats`. Fails when the file has no tables or
/// does not pass the integrity check.
pub async fn run_stats(config: &Config) -> Result<DatabaseReport> {
    let pool = db::connect_existing(config).await?;
    let report = collect_report(&pool, &config.db.path).await?;
    pool.close().await;

    print_report(config, &report);

    if report.tables.is_empty() {
        bail!("No tables found in {}", config.db.path.display());
    }
    if !report.integrity_ok() {
        bail!("Integrity check failed: {}", report.integrity);
    }
    Ok(report)
}

pub fn print_report(config: &Config, report: &DatabaseReport) {
    println!("Pocket Poem — Database Report");
    println!("=============================");
    println!();
    println!("  Database:    {}", config.db.path.display());
    println!("  Size:        {}", format_bytes(report.size_bytes));

    println!();
    println!("  Tables:");
    for table in &report.tables {
        println!("    {}", table.name);
        for (column, ty) in &table.columns {
            println!("      {:<16} {}", column, ty);
        }
    }

    println!();
    println!("  Poems:       {}", format_number(report.total_poems.max(0) as u64));
    println!("  Authors:     {}", format_number(report.authors.max(0) as u64));
    println!("  Dynasties:   {}", report.dynasties);
    println!(
        "  Hot:         {} ({}%)",
        report.hot,
        if report.total_poems > 0 {
            (report.hot * 100) / report.total_poems
        } else {
            0
        }
    );
    println!("  Collections: {}", report.collections);

    if !report.by_dynasty.is_empty() {
        println!();
        println!("  By dynasty:");
        for (dynasty, count) in &report.by_dynasty {
            println!(
                "    {:<8} {:>10}",
                dynasty.as_deref().unwrap_or("-"),
                format_number((*count).max(0) as u64)
            );
        }
    }

    if !report.samples.is_empty() {
        println!();
        println!("  Samples:");
        for poem in &report.samples {
            println!(
                "    {:>6}  {} ({} · {})",
                poem.id,
                poem.title,
                poem.author.as_deref().unwrap_or("-"),
                poem.dynasty.as_deref().unwrap_or("-")
            );
        }
    }

    println!();
    println!("  Indexes:     {}", report.indexes.join(", "));
    println!("  Integrity:   {}", report.integrity);
    println!();
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrate;
    use tempfile::TempDir;

    #[test]
    fn bytes_are_humanized() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.0 MB");
    }

    #[tokio::test]
    async fn report_counts_rows_and_lists_schema() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("p.db");
        let pool = db::connect_path(&path).await.unwrap();
        migrate::initialize_schema(&pool).await.unwrap();

        for (title, dynasty, hot) in [("静夜思", "唐", 1), ("春望", "唐", 0), ("水调歌头", "宋", 0)] {
            sqlx::query(
                "INSERT INTO poems (title, author, dynasty, content, hot) VALUES (?, '某', ?, '句', ?)",
            )
            .bind(title)
            .bind(dynasty)
            .bind(hot)
            .execute(&pool)
            .await
            .unwrap();
        }

        let report = collect_report(&pool, &path).await.unwrap();
        assert_eq!(report.total_poems, 3);
        assert_eq!(report.authors, 1);
        assert_eq!(report.dynasties, 2);
        assert_eq!(report.by_dynasty[0], (Some("唐".to_string()), 2));
        assert_eq!(report.hot, 1);
        assert_eq!(report.collections, 1);
        assert_eq!(report.samples.len(), 3);
        assert!(report.integrity_ok());

        let poems = report.tables.iter().find(|t| t.name == "poems").unwrap();
        let columns: Vec<&str> = poems.columns.iter().map(|(c, _)| c.as_str()).collect();
        assert_eq!(columns, vec!["id", "title", "author", "dynasty", "content", "hot"]);
        assert!(report.indexes.contains(&"idx_author".to_string()));
    }
}
