//! Core data types that flow through the build pipeline.
//!
//! Catalog entries ([`SourceDescriptor`]) become [`NormalizedPoem`]s, which
//! become `poems` rows ([`PersistedPoem`]). Popularity data
//! ([`PopularityRecord`]) lives only in the shortlist file and drives the
//! `hot` flag.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// One corpus family. Each variant has exactly one normalizer
/// (see [`crate::normalize::normalize`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CorpusType {
    Tangshi,
    Songshi,
    Songci,
    Yuanqu,
    Huajianji,
    Nantang,
    Caocao,
    Narlan,
    Chuci,
    Shijing,
    Qianjiashi,
    Tangshisanbaishou,
}

impl CorpusType {
    pub const ALL: [CorpusType; 12] = [
        CorpusType::Tangshi,
        CorpusType::Songshi,
        CorpusType::Songci,
        CorpusType::Yuanqu,
        CorpusType::Huajianji,
        CorpusType::Nantang,
        CorpusType::Caocao,
        CorpusType::Narlan,
        CorpusType::Chuci,
        CorpusType::Shijing,
        CorpusType::Qianjiashi,
        CorpusType::Tangshisanbaishou,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CorpusType::Tangshi => "tangshi",
            CorpusType::Songshi => "songshi",
            CorpusType::Songci => "songci",
            CorpusType::Yuanqu => "yuanqu",
            CorpusType::Huajianji => "huajianji",
            CorpusType::Nantang => "nantang",
            CorpusType::Caocao => "caocao",
            CorpusType::Narlan => "narlan",
            CorpusType::Chuci => "chuci",
            CorpusType::Shijing => "shijing",
            CorpusType::Qianjiashi => "qianjiashi",
            CorpusType::Tangshisanbaishou => "tangshisanbaishou",
        }
    }

    /// Human-facing corpus name used in catalog listings and build output.
    pub fn display_name(&self) -> &'static str {
        match self {
            CorpusType::Tangshi => "唐诗",
            CorpusType::Songshi => "宋诗",
            CorpusType::Songci => "宋词",
            CorpusType::Yuanqu => "元曲",
            CorpusType::Huajianji => "五代花间集",
            CorpusType::Nantang => "五代南唐二主词",
            CorpusType::Caocao => "曹操诗集",
            CorpusType::Narlan => "纳兰性德诗集",
            CorpusType::Chuci => "楚辞",
            CorpusType::Shijing => "诗经",
            CorpusType::Qianjiashi => "千家诗",
            CorpusType::Tangshisanbaishou => "唐诗三百首",
        }
    }
}

impl fmt::Display for CorpusType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single corpus file selected by the catalog resolver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDescriptor {
    pub path: PathBuf,
    pub corpus_type: CorpusType,
    pub dynasty: String,
    pub display_name: String,
}

/// The common record shape every normalizer produces.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct NormalizedPoem {
    pub title: String,
    pub author: String,
    pub dynasty: String,
    /// Verse lines joined with `\n`. Never blank.
    pub content: String,
}

/// A row of the `poems` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PersistedPoem {
    pub id: i64,
    pub title: String,
    pub author: Option<String>,
    pub dynasty: Option<String>,
    pub content: String,
    pub hot: bool,
}

/// A row of the `collections` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Collection {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub created_at: Option<String>,
    pub is_default: bool,
}

/// A row of the `collection_items` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollectionItem {
    pub id: i64,
    pub collection_id: i64,
    pub poem_id: i64,
    pub created_at: Option<String>,
}

/// The three independent popularity cuts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RankClass {
    Tang,
    Song,
    Ci,
}

impl RankClass {
    pub const ALL: [RankClass; 3] = [RankClass::Tang, RankClass::Song, RankClass::Ci];

    /// Subdirectory of the ranking dir holding this class's files.
    pub fn subdir(&self) -> &'static str {
        match self {
            RankClass::Tang | RankClass::Song => "poet",
            RankClass::Ci => "ci",
        }
    }

    /// Filename prefix of this class's ranking files.
    pub fn file_prefix(&self) -> &'static str {
        match self {
            RankClass::Tang => "poet.tang.rank",
            RankClass::Song => "poet.song.rank",
            RankClass::Ci => "ci.song.rank",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RankClass::Tang => "tang",
            RankClass::Song => "song",
            RankClass::Ci => "ci",
        }
    }
}

/// One entry of the popularity shortlist, as written to `popular-poems.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PopularityRecord {
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub rhythmic: String,
    #[serde(default)]
    pub baidu: u64,
    #[serde(default)]
    pub bing: u64,
    #[serde(default)]
    pub bing_en: u64,
    #[serde(default)]
    pub google: u64,
    #[serde(default)]
    pub so360: u64,
    #[serde(rename = "type")]
    pub class: RankClass,
}

impl PopularityRecord {
    /// The strongest single-engine signal. Engines are not comparable in
    /// absolute scale, so the counters are never summed.
    pub fn search_metric(&self) -> u64 {
        [self.baidu, self.bing, self.bing_en, self.google, self.so360]
            .into_iter()
            .max()
            .unwrap_or(0)
    }
}
