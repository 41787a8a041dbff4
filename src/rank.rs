//! Popularity shortlist extraction.
//!
//! Search-engine ranking files annotate poems with per-engine hit counters.
//! Each poem is scored by its strongest single engine
//! ([`PopularityRecord::search_metric`]), and the top `ranking.top_n` of
//! each [`RankClass`] is kept. The three classes are cut independently and
//! then concatenated (tang, song, ci) into one shortlist tagged by `type`.
//!
//! Ties are broken explicitly: title ascending, then author ascending, then
//! input order.

use anyhow::{bail, Context, Result};
use serde::de::IgnoredAny;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::catalog::{compare_file_names, logical_name};
use crate::config::Config;
use crate::error::SourceError;
use crate::ingest::SkippedFile;
use crate::models::{PopularityRecord, RankClass};

/// A hit counter as found in ranking files. Non-numeric values count as 0.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Counter {
    Int(u64),
    Float(f64),
    Other(IgnoredAny),
}

impl Counter {
    fn value(field: &Option<Counter>) -> u64 {
        match field {
            Some(Counter::Int(n)) => *n,
            Some(Counter::Float(f)) if f.is_finite() && *f > 0.0 => *f as u64,
            _ => 0,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RankEntry {
    author: Option<String>,
    title: Option<String>,
    rhythmic: Option<String>,
    baidu: Option<Counter>,
    bing: Option<Counter>,
    bing_en: Option<Counter>,
    google: Option<Counter>,
    so360: Option<Counter>,
}

impl RankEntry {
    fn into_record(self, class: RankClass) -> PopularityRecord {
        let rhythmic = self.rhythmic.unwrap_or_default();
        let title = match self.title {
            Some(title) if !title.is_empty() => title,
            _ => rhythmic.clone(),
        };
        PopularityRecord {
            author: self.author.unwrap_or_default(),
            title,
            rhythmic,
            baidu: Counter::value(&self.baidu),
            bing: Counter::value(&self.bing),
            bing_en: Counter::value(&self.bing_en),
            google: Counter::value(&self.google),
            so360: Counter::value(&self.so360),
            class,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Shortlist {
    pub records: Vec<PopularityRecord>,
    pub skipped: Vec<SkippedFile>,
}

impl Shortlist {
    pub fn count(&self, class: RankClass) -> usize {
        self.records.iter().filter(|r| r.class == class).count()
    }
}

/// Ranking files of one class, in numeric file order. As with corpus files,
/// a `.simplified.json` variant replaces its raw sibling. A missing class
/// directory yields none.
pub fn rank_files(dir: &Path, class: RankClass) -> Result<Vec<PathBuf>> {
    let class_dir = dir.join(class.subdir());
    if !class_dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut by_key: HashMap<String, PathBuf> = HashMap::new();
    for entry in WalkDir::new(&class_dir).min_depth(1).max_depth(1) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        let Some(logical) = logical_name(&name) else {
            continue;
        };
        if !logical.starts_with(class.file_prefix()) {
            continue;
        }
        if name != logical || !by_key.contains_key(&logical) {
            by_key.insert(logical, entry.path().to_path_buf());
        }
    }

    let mut files: Vec<(String, PathBuf)> = by_key.into_iter().collect();
    files.sort_by(|a, b| compare_file_names(&a.0, &b.0));
    Ok(files.into_iter().map(|(_, path)| path).collect())
}

pub fn read_rank_file(path: &Path, class: RankClass) -> Result<Vec<PopularityRecord>, SourceError> {
    let text = std::fs::read_to_string(path).map_err(|source| SourceError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let entries: Vec<RankEntry> =
        serde_json::from_str(&text).map_err(|source| SourceError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(entries.into_iter().map(|e| e.into_record(class)).collect())
}

/// Sort by descending search metric with the explicit tie-break, then cut.
pub fn top_records(mut records: Vec<PopularityRecord>, top_n: usize) -> Vec<PopularityRecord> {
    records.sort_by(|a, b| {
        b.search_metric()
            .cmp(&a.search_metric())
            .then_with(|| a.title.cmp(&b.title))
            .then_with(|| a.author.cmp(&b.author))
    });
    records.truncate(top_n);
    records
}

/// Extract the shortlist for every class from the configured ranking dir.
pub fn extract_popular(config: &Config) -> Result<Shortlist> {
    let dir = &config.ranking.dir;
    if !dir.is_dir() {
        bail!("Ranking directory does not exist: {}", dir.display());
    }

    let mut shortlist = Shortlist::default();
    for class in RankClass::ALL {
        let mut class_records = Vec::new();
        for path in rank_files(dir, class)? {
            match read_rank_file(&path, class) {
                Ok(records) => class_records.extend(records),
                Err(e) => {
                    eprintln!("Warning: skipping ranking file: {}", e);
                    shortlist.skipped.push(SkippedFile {
                        path: path.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }
        shortlist
            .records
            .extend(top_records(class_records, config.ranking.top_n));
    }

    Ok(shortlist)
}

pub fn write_shortlist(path: &Path, records: &[PopularityRecord]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let json = serde_json::to_string_pretty(records)?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write shortlist: {}", path.display()))?;
    Ok(())
}

pub fn read_shortlist(path: &Path) -> Result<Vec<PopularityRecord>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read shortlist: {}", path.display()))?;
    let records = serde_json::from_str(&text)
        .with_context(|| format!("Failed to parse shortlist: {}", path.display()))?;
    Ok(records)
}

/// CLI entry point for `poemdb rank`.
pub fn run_rank(config: &Config) -> Result<Shortlist> {
    let shortlist = extract_popular(config)?;
    write_shortlist(&config.ranking.output, &shortlist.records)?;

    println!("rank");
    for class in RankClass::ALL {
        println!("  {:<5} {}", class.as_str(), shortlist.count(class));
    }
    println!("  files skipped: {}", shortlist.skipped.len());
    println!("  total: {}", shortlist.records.len());
    println!("  output: {}", config.ranking.output.display());
    println!("ok");

    Ok(shortlist)
}
