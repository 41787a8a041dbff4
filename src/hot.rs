//! Hot-poem marking.
//!
//! Matches the popularity shortlist against `poems` by exact
//! `(author, title)` and sets `hot = 1` on at most one row per pair. The
//! first row by id wins when the corpus holds duplicates, and a pair that
//! appears more than once in the shortlist still marks a single row. The
//! flag only ever moves from 0 to 1.

use anyhow::Result;
use sqlx::SqlitePool;
use std::collections::HashSet;

use crate::config::Config;
use crate::db;
use crate::models::PopularityRecord;
use crate::progress::{ProgressEvent, ProgressReporter};
use crate::rank;

const PROGRESS_EVERY: u64 = 100;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MarkSummary {
    /// Shortlist entries considered.
    pub entries: usize,
    /// Entries without an author or title.
    pub skipped: usize,
    /// Entries with no matching row.
    pub unmatched: usize,
    /// Rows flagged by this run.
    pub marked: u64,
    pub hot_total: i64,
    pub poems_total: i64,
}

/// Flag matching rows inside one transaction.
pub async fn mark_hot(
    pool: &SqlitePool,
    shortlist: &[PopularityRecord],
    reporter: &dyn ProgressReporter,
) -> Result<MarkSummary> {
    let mut summary = MarkSummary {
        entries: shortlist.len(),
        ..MarkSummary::default()
    };
    let mut matched: HashSet<i64> = HashSet::new();

    let mut tx = pool.begin().await?;

    for entry in shortlist {
        let author = entry.author.trim();
        let title = entry.title.trim();
        if author.is_empty() || title.is_empty() {
            summary.skipped += 1;
            continue;
        }

        let id: Option<i64> = sqlx::query_scalar(
            "SELECT id FROM poems WHERE author = ? AND title = ? ORDER BY id LIMIT 1",
        )
        .bind(author)
        .bind(title)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(id) = id else {
            summary.unmatched += 1;
            continue;
        };

        if !matched.insert(id) {
            continue;
        }

        let updated = sqlx::query("UPDATE poems SET hot = 1 WHERE id = ? AND hot = 0")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        if updated > 0 {
            summary.marked += 1;
            if summary.marked % PROGRESS_EVERY == 0 {
                reporter.report(ProgressEvent::Marking { n: summary.marked });
            }
        }
    }

    tx.commit().await?;

    summary.hot_total = sqlx::query_scalar("SELECT COUNT(*) FROM poems WHERE hot = 1")
        .fetch_one(pool)
        .await?;
    summary.poems_total = sqlx::query_scalar("SELECT COUNT(*) FROM poems")
        .fetch_one(pool)
        .await?;

    Ok(summary)
}

/// CLI entry point for `poemdb mark-hot`.
pub async fn run_mark_hot(config: &Config, reporter: &dyn ProgressReporter) -> Result<MarkSummary> {
    let pool = db::connect_existing(config).await?;
    let shortlist = rank::read_shortlist(&config.ranking.output)?;

    let summary = mark_hot(&pool, &shortlist, reporter).await?;
    pool.close().await;

    let share = if summary.poems_total > 0 {
        summary.hot_total as f64 * 100.0 / summary.poems_total as f64
    } else {
        0.0
    };

    println!("mark-hot");
    println!("  shortlist entries: {}", summary.entries);
    println!("  skipped (no author/title): {}", summary.skipped);
    println!("  unmatched: {}", summary.unmatched);
    println!("  marked: {}", summary.marked);
    println!("  hot poems: {} / {} ({:.2}%)", summary.hot_total, summary.poems_total, share);
    println!("ok");

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrate;
    use crate::models::RankClass;
    use crate::progress::NoProgress;
    use tempfile::TempDir;

    fn entry(author: &str, title: &str) -> PopularityRecord {
        PopularityRecord {
            author: author.to_string(),
            title: title.to_string(),
            rhythmic: String::new(),
            baidu: 1,
            bing: 0,
            bing_en: 0,
            google: 0,
            so360: 0,
            class: RankClass::Tang,
        }
    }

    async fn pool_with(rows: &[(&str, &str)]) -> (TempDir, SqlitePool) {
        let tmp = TempDir::new().unwrap();
        let pool = db::connect_path(&tmp.path().join("p.db")).await.unwrap();
        migrate::initialize_schema(&pool).await.unwrap();
        for (author, title) in rows {
            sqlx::query("INSERT INTO poems (title, author, dynasty, content) VALUES (?, ?, '唐', '句')")
                .bind(*title)
                .bind(*author)
                .execute(&pool)
                .await
                .unwrap();
        }
        (tmp, pool)
    }

    async fn hot_ids(pool: &SqlitePool) -> Vec<i64> {
        sqlx::query_scalar("SELECT id FROM poems WHERE hot = 1 ORDER BY id")
            .fetch_all(pool)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn duplicate_rows_get_exactly_one_mark() {
        let (_tmp, pool) = pool_with(&[("李白", "静夜思"), ("李白", "静夜思"), ("杜甫", "春望")]).await;

        let summary = mark_hot(&pool, &[entry("李白", "静夜思")], &NoProgress)
            .await
            .unwrap();

        assert_eq!(summary.marked, 1);
        assert_eq!(hot_ids(&pool).await, vec![1]);
    }

    #[tokio::test]
    async fn repeated_shortlist_entry_marks_once() {
        let (_tmp, pool) = pool_with(&[("李白", "静夜思"), ("李白", "静夜思")]).await;
        let shortlist = vec![entry("李白", "静夜思"), entry("李白", "静夜思")];

        let summary = mark_hot(&pool, &shortlist, &NoProgress).await.unwrap();
        assert_eq!(summary.marked, 1);
        assert_eq!(hot_ids(&pool).await.len(), 1);
    }

    #[tokio::test]
    async fn incomplete_and_unmatched_entries_are_skipped() {
        let (_tmp, pool) = pool_with(&[("杜甫", "春望")]).await;
        let shortlist = vec![entry("", "春望"), entry("杜甫", ""), entry("王维", "鹿柴")];

        let summary = mark_hot(&pool, &shortlist, &NoProgress).await.unwrap();
        assert_eq!(summary.skipped, 2);
        assert_eq!(summary.unmatched, 1);
        assert_eq!(summary.marked, 0);
        assert!(hot_ids(&pool).await.is_empty());
    }

    #[tokio::test]
    async fn rerun_never_unmarks_or_double_counts() {
        let (_tmp, pool) = pool_with(&[("杜甫", "春望")]).await;
        let shortlist = vec![entry("杜甫", "春望")];

        mark_hot(&pool, &shortlist, &NoProgress).await.unwrap();
        let second = mark_hot(&pool, &shortlist, &NoProgress).await.unwrap();

        assert_eq!(second.marked, 0);
        assert_eq!(second.hot_total, 1);
    }
}
