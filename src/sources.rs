//! Catalog overview for `poemdb sources`.
//!
//! Shows, per corpus family, whether its directory exists and how many
//! files the catalog resolves for it, without reading any file contents.

use anyhow::{bail, Result};

use crate::catalog::{self, FAMILIES};
use crate::config::Config;
use crate::models::CorpusType;

/// What the catalog resolves for one corpus family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FamilyStatus {
    pub corpus_type: CorpusType,
    pub dir: &'static str,
    pub dir_exists: bool,
    pub files: usize,
    /// Files resolved to their `.simplified.json` variant.
    pub simplified: usize,
}

pub fn family_status(config: &Config) -> Result<Vec<FamilyStatus>> {
    let root = &config.corpus.root;
    if !root.is_dir() {
        bail!("Corpus root does not exist: {}", root.display());
    }

    let mut statuses = Vec::with_capacity(FAMILIES.len());
    for family in FAMILIES {
        let sources = catalog::resolve_family(root, family)?;
        let simplified = sources
            .iter()
            .filter(|s| {
                s.path
                    .to_string_lossy()
                    .ends_with(catalog::SIMPLIFIED_SUFFIX)
            })
            .count();
        statuses.push(FamilyStatus {
            corpus_type: family.corpus_type,
            dir: family.dir,
            dir_exists: root.join(family.dir).is_dir(),
            files: sources.len(),
            simplified,
        });
    }
    Ok(statuses)
}

pub fn list_sources(config: &Config) -> Result<()> {
    let statuses = family_status(config)?;

    println!("corpus root: {}", config.corpus.root.display());
    println!(
        "{:<18} {:<20} {:<10} {:>6} {:>11}",
        "FAMILY", "DIRECTORY", "STATUS", "FILES", "SIMPLIFIED"
    );
    for s in &statuses {
        let status = if !s.dir_exists {
            "MISSING"
        } else if s.files == 0 {
            "EMPTY"
        } else {
            "OK"
        };
        println!(
            "{:<18} {:<20} {:<10} {:>6} {:>11}",
            s.corpus_type.as_str(),
            s.dir,
            status,
            s.files,
            s.simplified
        );
    }

    let total: usize = statuses.iter().map(|s| s.files).sum();
    println!("{} file(s) in catalog", total);
    Ok(())
}
