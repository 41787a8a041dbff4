//! Bulk loading of normalized poems into a fresh artifact.
//!
//! The build always starts from an empty database: the old file is removed,
//! the schema is initialized, and every catalog group is loaded in turn.
//!
//! A *group* is all catalog entries sharing `(corpus type, dynasty)`. Files
//! in a group are read and normalized one by one; a file that cannot be
//! read or parsed is logged and skipped while the rest of the group still
//! loads. The group's rows are then inserted inside one transaction, so a
//! group is either fully present or absent, and a failure rolls back only
//! the group in flight.

use anyhow::{Context, Result};
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use std::collections::HashSet;
use std::path::PathBuf;

use crate::catalog;
use crate::config::Config;
use crate::db;
use crate::error::SourceError;
use crate::migrate;
use crate::models::{CorpusType, NormalizedPoem, SourceDescriptor};
use crate::normalize::normalize;
use crate::progress::{ProgressEvent, ProgressReporter};

/// Rows per multi-row `INSERT` statement (4 bound parameters each).
const INSERT_CHUNK_ROWS: usize = 200;

/// Catalog entries that load together in one transaction.
#[derive(Debug, Clone)]
pub struct SourceGroup {
    pub corpus_type: CorpusType,
    pub dynasty: String,
    pub sources: Vec<SourceDescriptor>,
}

impl SourceGroup {
    pub fn label(&self) -> String {
        format!("{}·{}", self.corpus_type.display_name(), self.dynasty)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupSummary {
    pub corpus_type: CorpusType,
    pub dynasty: String,
    pub files_total: usize,
    pub files_loaded: usize,
    pub rows: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

/// Outcome of a build (or a dry run, where nothing is written).
#[derive(Debug, Clone, Default)]
pub struct BuildSummary {
    pub replaced_existing: bool,
    pub groups: Vec<GroupSummary>,
    pub skipped: Vec<SkippedFile>,
    pub total_rows: u64,
    pub authors: u64,
    pub dynasties: u64,
}

impl BuildSummary {
    pub fn files_loaded(&self) -> usize {
        self.groups.iter().map(|g| g.files_loaded).sum()
    }
}

/// Group descriptors by `(corpus type, dynasty)`, keeping the order in
/// which groups first appear in the catalog.
pub fn group_sources(descriptors: Vec<SourceDescriptor>) -> Vec<SourceGroup> {
    let mut groups: Vec<SourceGroup> = Vec::new();
    for descriptor in descriptors {
        match groups
            .iter_mut()
            .find(|g| g.corpus_type == descriptor.corpus_type && g.dynasty == descriptor.dynasty)
        {
            Some(group) => group.sources.push(descriptor),
            None => groups.push(SourceGroup {
                corpus_type: descriptor.corpus_type,
                dynasty: descriptor.dynasty.clone(),
                sources: vec![descriptor],
            }),
        }
    }
    groups
}

/// Read and normalize one catalog entry.
pub fn read_source(descriptor: &SourceDescriptor) -> Result<Vec<NormalizedPoem>, SourceError> {
    let path = &descriptor.path;
    if !path.exists() {
        return Err(SourceError::Missing(path.clone()));
    }

    let text = std::fs::read_to_string(path).map_err(|source| SourceError::Io {
        path: path.clone(),
        source,
    })?;

    normalize(descriptor.corpus_type, &text, &descriptor.dynasty).map_err(|source| {
        SourceError::Parse {
            path: path.clone(),
            source,
        }
    })
}

/// Read every file of a group, skipping the ones that fail.
fn read_group(
    group: &SourceGroup,
    reporter: &dyn ProgressReporter,
) -> (Vec<NormalizedPoem>, GroupSummary, Vec<SkippedFile>) {
    let label = group.label();
    let total = group.sources.len();
    let mut poems = Vec::new();
    let mut skipped = Vec::new();
    let mut files_loaded = 0;

    for (i, descriptor) in group.sources.iter().enumerate() {
        match read_source(descriptor) {
            Ok(records) => {
                poems.extend(records);
                files_loaded += 1;
            }
            Err(e) => {
                eprintln!("Warning: skipping {}: {}", descriptor.display_name, e);
                skipped.push(SkippedFile {
                    path: e.path().clone(),
                    reason: e.to_string(),
                });
            }
        }

        let n = i + 1;
        if n % 10 == 0 || n == total {
            reporter.report(ProgressEvent::Reading {
                group: label.clone(),
                n: n as u64,
                total: total as u64,
            });
        }
    }

    let summary = GroupSummary {
        corpus_type: group.corpus_type,
        dynasty: group.dynasty.clone(),
        files_total: total,
        files_loaded,
        rows: 0,
    };
    (poems, summary, skipped)
}

/// Insert poems in one transaction, reporting every `progress_every` rows.
pub async fn insert_poems(
    pool: &SqlitePool,
    label: &str,
    poems: &[NormalizedPoem],
    progress_every: u64,
    reporter: &dyn ProgressReporter,
) -> Result<u64> {
    let mut tx = pool.begin().await?;
    let mut inserted: u64 = 0;

    for chunk in poems.chunks(INSERT_CHUNK_ROWS) {
        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new("INSERT INTO poems (title, author, dynasty, content) ");
        qb.push_values(chunk, |mut row, poem| {
            row.push_bind(poem.title.as_str())
                .push_bind(poem.author.as_str())
                .push_bind(poem.dynasty.as_str())
                .push_bind(poem.content.as_str());
        });
        qb.build().execute(&mut *tx).await?;

        let before = inserted;
        inserted += chunk.len() as u64;
        if inserted / progress_every > before / progress_every {
            reporter.report(ProgressEvent::Inserting {
                group: label.to_string(),
                n: inserted,
            });
        }
    }

    tx.commit().await?;
    Ok(inserted)
}

/// Remove the old artifact, initialize the schema, and load every group.
pub async fn build_database(
    config: &Config,
    reporter: &dyn ProgressReporter,
) -> Result<BuildSummary> {
    let catalog = catalog::resolve_catalog(&config.corpus.root)?;

    let replaced_existing = db::remove_artifact(&config.db.path)?;
    let pool = db::connect(config).await?;
    migrate::initialize_schema(&pool)
        .await
        .context("Failed to initialize schema")?;

    let mut summary = BuildSummary {
        replaced_existing,
        ..BuildSummary::default()
    };

    for group in group_sources(catalog) {
        let label = group.label();
        let (poems, mut group_summary, skipped) = read_group(&group, reporter);
        summary.skipped.extend(skipped);

        if !poems.is_empty() {
            group_summary.rows = insert_poems(
                &pool,
                &label,
                &poems,
                config.corpus.progress_every,
                reporter,
            )
            .await
            .with_context(|| format!("Failed to load group {}", label))?;
        }

        summary.total_rows += group_summary.rows;
        summary.groups.push(group_summary);
    }

    let row = sqlx::query(
        "SELECT COUNT(DISTINCT author) AS authors, COUNT(DISTINCT dynasty) AS dynasties FROM poems",
    )
    .fetch_one(&pool)
    .await?;
    summary.authors = row.get::<i64, _>("authors") as u64;
    summary.dynasties = row.get::<i64, _>("dynasties") as u64;

    pool.close().await;
    Ok(summary)
}

/// Resolve and normalize everything without touching the database.
pub fn plan_build(config: &Config, reporter: &dyn ProgressReporter) -> Result<BuildSummary> {
    let catalog = catalog::resolve_catalog(&config.corpus.root)?;

    let mut summary = BuildSummary::default();
    let mut authors = HashSet::new();
    let mut dynasties = HashSet::new();

    for group in group_sources(catalog) {
        let (poems, mut group_summary, skipped) = read_group(&group, reporter);
        for poem in &poems {
            authors.insert(poem.author.clone());
            dynasties.insert(poem.dynasty.clone());
        }
        group_summary.rows = poems.len() as u64;
        summary.total_rows += group_summary.rows;
        summary.skipped.extend(skipped);
        summary.groups.push(group_summary);
    }

    summary.authors = authors.len() as u64;
    summary.dynasties = dynasties.len() as u64;
    Ok(summary)
}

/// CLI entry point for `poemdb build`.
pub async fn run_build(
    config: &Config,
    dry_run: bool,
    reporter: &dyn ProgressReporter,
) -> Result<BuildSummary> {
    let summary = if dry_run {
        plan_build(config, reporter)?
    } else {
        build_database(config, reporter).await?
    };
    print_summary(config, &summary, dry_run);
    Ok(summary)
}

pub fn print_summary(config: &Config, summary: &BuildSummary, dry_run: bool) {
    if dry_run {
        println!("build (dry-run)");
    } else {
        println!("build");
        println!("  database: {}", config.db.path.display());
        if summary.replaced_existing {
            println!("  replaced existing database");
        }
    }

    for group in &summary.groups {
        println!(
            "  {:<16} {:<6} files {}/{}  poems {}",
            group.corpus_type.display_name(),
            group.dynasty,
            group.files_loaded,
            group.files_total,
            group.rows
        );
    }

    println!("  files loaded: {}", summary.files_loaded());
    println!("  files skipped: {}", summary.skipped.len());
    for skipped in &summary.skipped {
        println!("    {}", skipped.reason);
    }
    println!("  total poems: {}", summary.total_rows);
    println!("  authors: {}", summary.authors);
    println!("  dynasties: {}", summary.dynasties);
    println!("ok");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NoProgress;
    use tempfile::TempDir;

    fn descriptor(corpus_type: CorpusType, dynasty: &str, path: &str) -> SourceDescriptor {
        SourceDescriptor {
            path: PathBuf::from(path),
            corpus_type,
            dynasty: dynasty.to_string(),
            display_name: path.to_string(),
        }
    }

    #[test]
    fn groups_keep_first_appearance_order() {
        let groups = group_sources(vec![
            descriptor(CorpusType::Tangshi, "唐", "a"),
            descriptor(CorpusType::Songci, "宋", "b"),
            descriptor(CorpusType::Tangshi, "唐", "c"),
        ]);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].corpus_type, CorpusType::Tangshi);
        assert_eq!(groups[0].sources.len(), 2);
        assert_eq!(groups[1].label(), "宋词·宋");
    }

    #[test]
    fn missing_file_is_reported_as_missing() {
        let d = descriptor(CorpusType::Tangshi, "唐", "/definitely/not/here.json");
        assert!(matches!(read_source(&d), Err(SourceError::Missing(_))));
    }

    #[tokio::test]
    async fn insert_poems_spans_multiple_chunks() {
        let tmp = TempDir::new().unwrap();
        let pool = db::connect_path(&tmp.path().join("p.db")).await.unwrap();
        migrate::initialize_schema(&pool).await.unwrap();

        let poems: Vec<NormalizedPoem> = (0..450)
            .map(|i| NormalizedPoem {
                title: format!("诗{}", i),
                author: "佚名".to_string(),
                dynasty: "唐".to_string(),
                content: "一句".to_string(),
            })
            .collect();

        let inserted = insert_poems(&pool, "test", &poems, 100, &NoProgress)
            .await
            .unwrap();
        assert_eq!(inserted, 450);

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM poems WHERE hot = 0")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 450);
    }
}
