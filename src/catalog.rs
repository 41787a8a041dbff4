//! Source catalog resolution.
//!
//! Turns a corpus root into the ordered list of [`SourceDescriptor`]s the
//! loader consumes. Each corpus family is a directory plus filename globs.
//! Resolution runs in two phases per family:
//!
//! 1. **Enumerate** every candidate `.json` file in the family directory and
//!    compute its *logical name* (`x.simplified.json` → `x.json`).
//! 2. **Select** one file per logical name, preferring the simplified
//!    variant, then order by the integer embedded in the name
//!    (`poet.tang.2.json` before `poet.tang.10.json`).
//!
//! A family whose directory is absent contributes nothing; only a missing
//! root is an error.

use anyhow::{bail, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::models::{CorpusType, SourceDescriptor};

/// Filename suffix written by the conversion pass.
pub const SIMPLIFIED_SUFFIX: &str = ".simplified.json";

/// Files matching these are never corpus data.
const ALWAYS_EXCLUDE: &[&str] = &["*_error.json"];

/// A known corpus family and how to find its files.
#[derive(Debug)]
pub struct Family {
    pub corpus_type: CorpusType,
    /// Directory relative to the corpus root.
    pub dir: &'static str,
    pub dynasty: &'static str,
    /// Globs matched against the logical file name.
    pub include: &'static [&'static str],
    pub exclude: &'static [&'static str],
}

pub const FAMILIES: &[Family] = &[
    Family {
        corpus_type: CorpusType::Tangshi,
        dir: "全唐诗",
        dynasty: "唐",
        include: &["poet.tang.*.json"],
        exclude: &[],
    },
    Family {
        corpus_type: CorpusType::Songshi,
        dir: "全唐诗",
        dynasty: "宋",
        include: &["poet.song.*.json"],
        exclude: &[],
    },
    Family {
        corpus_type: CorpusType::Songci,
        dir: "宋词",
        dynasty: "宋",
        include: &["ci.song.*.json"],
        exclude: &[],
    },
    Family {
        corpus_type: CorpusType::Yuanqu,
        dir: "元曲",
        dynasty: "元",
        include: &["yuanqu*.json"],
        exclude: &[],
    },
    Family {
        corpus_type: CorpusType::Huajianji,
        dir: "五代诗词/huajianji",
        dynasty: "五代",
        include: &["*.json"],
        exclude: &[],
    },
    Family {
        corpus_type: CorpusType::Nantang,
        dir: "五代诗词/nantang",
        dynasty: "五代",
        include: &["*.json"],
        exclude: &["intro.json", "authors.json"],
    },
    Family {
        corpus_type: CorpusType::Caocao,
        dir: "曹操诗集",
        dynasty: "汉",
        include: &["*.json"],
        exclude: &[],
    },
    Family {
        corpus_type: CorpusType::Narlan,
        dir: "纳兰性德",
        dynasty: "清",
        include: &["*.json"],
        exclude: &[],
    },
    Family {
        corpus_type: CorpusType::Chuci,
        dir: "楚辞",
        dynasty: "战国",
        include: &["*.json"],
        exclude: &[],
    },
    Family {
        corpus_type: CorpusType::Shijing,
        dir: "诗经",
        dynasty: "周",
        include: &["*.json"],
        exclude: &[],
    },
    Family {
        corpus_type: CorpusType::Qianjiashi,
        dir: "蒙学",
        dynasty: "宋",
        include: &["qianjiashi.json"],
        exclude: &[],
    },
    Family {
        corpus_type: CorpusType::Tangshisanbaishou,
        dir: "蒙学",
        dynasty: "唐",
        include: &["tangshisanbaishou.json"],
        exclude: &[],
    },
];

/// A file found during enumeration, before variant selection.
#[derive(Debug)]
struct Candidate {
    path: PathBuf,
    file_name: String,
    logical_name: String,
    simplified: bool,
}

/// Resolve the full catalog under `root`, family by family in table order.
pub fn resolve_catalog(root: &Path) -> Result<Vec<SourceDescriptor>> {
    if !root.is_dir() {
        bail!("Corpus root does not exist: {}", root.display());
    }

    let mut descriptors = Vec::new();
    for family in FAMILIES {
        descriptors.extend(resolve_family(root, family)?);
    }
    Ok(descriptors)
}

/// Resolve a single family. An absent directory yields an empty list.
pub fn resolve_family(root: &Path, family: &Family) -> Result<Vec<SourceDescriptor>> {
    let dir = root.join(family.dir);
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let include = build_globset(family.include.iter())?;
    let exclude = build_globset(family.exclude.iter().chain(ALWAYS_EXCLUDE.iter()))?;

    let candidates = enumerate_candidates(&dir, &include, &exclude)?;
    let selected = select_variants(candidates);

    Ok(selected
        .into_iter()
        .map(|c| SourceDescriptor {
            display_name: format!("{} ({})", family.corpus_type.display_name(), c.file_name),
            path: c.path,
            corpus_type: family.corpus_type,
            dynasty: family.dynasty.to_string(),
        })
        .collect())
}

fn enumerate_candidates(
    dir: &Path,
    include: &GlobSet,
    exclude: &GlobSet,
) -> Result<Vec<Candidate>> {
    let mut candidates = Vec::new();

    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let file_name = entry.file_name().to_string_lossy().to_string();
        let Some(logical_name) = logical_name(&file_name) else {
            continue;
        };

        if exclude.is_match(&logical_name) || !include.is_match(&logical_name) {
            continue;
        }

        candidates.push(Candidate {
            path: entry.path().to_path_buf(),
            simplified: file_name != logical_name,
            file_name,
            logical_name,
        });
    }

    Ok(candidates)
}

/// Keep one candidate per logical name, the simplified one when present,
/// and order the survivors numerically.
fn select_variants(candidates: Vec<Candidate>) -> Vec<Candidate> {
    let mut by_key: HashMap<String, Candidate> = HashMap::new();
    for candidate in candidates {
        let keep_existing = by_key
            .get(&candidate.logical_name)
            .is_some_and(|existing| existing.simplified);
        if !keep_existing {
            by_key.insert(candidate.logical_name.clone(), candidate);
        }
    }

    let mut selected: Vec<Candidate> = by_key.into_values().collect();
    selected.sort_by(|a, b| compare_file_names(&a.logical_name, &b.logical_name));
    selected
}

/// The name a file has once its simplified marker is stripped, or `None`
/// for non-JSON files.
pub fn logical_name(file_name: &str) -> Option<String> {
    if let Some(stem) = file_name.strip_suffix(SIMPLIFIED_SUFFIX) {
        Some(format!("{}.json", stem))
    } else if file_name.ends_with(".json") {
        Some(file_name.to_string())
    } else {
        None
    }
}

/// First run of ASCII digits in a file name, parsed as an integer.
pub fn embedded_number(name: &str) -> Option<u64> {
    let start = name.find(|c: char| c.is_ascii_digit())?;
    let digits: String = name[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

/// Numeric order on the embedded integer, then lexicographic.
pub fn compare_file_names(a: &str, b: &str) -> Ordering {
    embedded_number(a)
        .cmp(&embedded_number(b))
        .then_with(|| a.cmp(b))
}

fn build_globset<'a>(patterns: impl Iterator<Item = &'a &'a str>) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}
