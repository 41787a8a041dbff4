//! Per-corpus normalization into [`NormalizedPoem`].
//!
//! Every corpus type maps to exactly one rule set through an exhaustive
//! `match` in [`normalize`]; dispatch is by the catalog's [`CorpusType`],
//! never by sniffing the JSON shape. Three families of rules exist:
//!
//! | Family | Corpora | Title |
//! |--------|---------|-------|
//! | Simple array | tangshi, songshi, songci, yuanqu, huajianji, nantang, caocao, narlan | `title` (or `rhythmic`) |
//! | Title composition | chuci, shijing | `section`/`chapter`/`title` joined with `·` |
//! | Nested chapter | qianjiashi, tangshisanbaishou | `chapter`, plus `（subchapter）` |
//!
//! Absent or wrongly typed optional fields fall back to defaults. Records
//! whose verse content is blank are dropped, so every returned record has
//! non-empty `content`.

use serde::de::IgnoredAny;
use serde::Deserialize;

use crate::models::{CorpusType, NormalizedPoem};

pub const DEFAULT_TITLE: &str = "无题";
pub const DEFAULT_AUTHOR: &str = "佚名";

const TITLE_SEPARATOR: &str = "·";

/// Verse lines as found in the source: usually an array, sometimes a
/// single string. Anything else counts as absent. A non-string element
/// inside the array becomes an empty line.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Lines {
    Many(Vec<Text>),
    One(String),
    Other(IgnoredAny),
}

impl Lines {
    fn joined(&self) -> Option<String> {
        match self {
            Lines::Many(lines) => Some(
                lines
                    .iter()
                    .map(|line| line.as_str().unwrap_or(""))
                    .collect::<Vec<_>>()
                    .join("\n"),
            ),
            Lines::One(text) => Some(text.clone()),
            Lines::Other(_) => None,
        }
    }
}

/// A text field that tolerates non-string values by ignoring them.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Text {
    Str(String),
    Other(IgnoredAny),
}

impl Text {
    fn as_str(&self) -> Option<&str> {
        match self {
            Text::Str(s) => Some(s.as_str()),
            Text::Other(_) => None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FlatRecord {
    title: Option<Text>,
    author: Option<Text>,
    rhythmic: Option<Text>,
    section: Option<Text>,
    chapter: Option<Text>,
    paragraphs: Option<Lines>,
    para: Option<Lines>,
    content: Option<Lines>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct NestedAnthology {
    content: Vec<AnthologySection>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AnthologySection {
    content: Vec<AnthologyItem>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AnthologyItem {
    chapter: Option<Text>,
    subchapter: Option<Text>,
    author: Option<Text>,
    paragraphs: Option<Lines>,
}

#[derive(Debug, Clone, Copy)]
enum TitleRule {
    /// `title`, else the default.
    Title,
    /// `title`, else `rhythmic` (tune name), else the default.
    TitleOrRhythmic,
    /// Non-empty segments joined with `·`; the title segment defaults.
    Composed(&'static [TitleSegment]),
}

#[derive(Debug, Clone, Copy)]
enum TitleSegment {
    Chapter,
    Section,
    Title,
}

#[derive(Debug, Clone, Copy)]
enum ContentField {
    Paragraphs,
    Para,
    Content,
}

#[derive(Debug, Clone, Copy)]
struct FlatRule {
    title: TitleRule,
    default_author: &'static str,
    content: ContentField,
}

const POEM: FlatRule = FlatRule {
    title: TitleRule::Title,
    default_author: DEFAULT_AUTHOR,
    content: ContentField::Paragraphs,
};

const LYRIC: FlatRule = FlatRule {
    title: TitleRule::TitleOrRhythmic,
    default_author: DEFAULT_AUTHOR,
    content: ContentField::Paragraphs,
};

/// Normalize one corpus file's JSON text.
///
/// Fails only when the document's overall shape does not match the corpus
/// type (e.g. an object where an array of poems is expected).
pub fn normalize(
    corpus_type: CorpusType,
    json: &str,
    dynasty: &str,
) -> Result<Vec<NormalizedPoem>, serde_json::Error> {
    match corpus_type {
        CorpusType::Tangshi | CorpusType::Songshi | CorpusType::Yuanqu => {
            normalize_flat(json, dynasty, POEM)
        }
        CorpusType::Songci | CorpusType::Huajianji | CorpusType::Nantang => {
            normalize_flat(json, dynasty, LYRIC)
        }
        CorpusType::Caocao => normalize_flat(
            json,
            dynasty,
            FlatRule {
                default_author: "曹操",
                ..POEM
            },
        ),
        CorpusType::Narlan => normalize_flat(
            json,
            dynasty,
            FlatRule {
                title: TitleRule::Title,
                default_author: "纳兰性德",
                content: ContentField::Para,
            },
        ),
        CorpusType::Chuci => normalize_flat(
            json,
            dynasty,
            FlatRule {
                title: TitleRule::Composed(&[TitleSegment::Section, TitleSegment::Title]),
                default_author: DEFAULT_AUTHOR,
                content: ContentField::Content,
            },
        ),
        CorpusType::Shijing => normalize_flat(
            json,
            dynasty,
            FlatRule {
                title: TitleRule::Composed(&[
                    TitleSegment::Chapter,
                    TitleSegment::Section,
                    TitleSegment::Title,
                ]),
                default_author: DEFAULT_AUTHOR,
                content: ContentField::Content,
            },
        ),
        CorpusType::Qianjiashi | CorpusType::Tangshisanbaishou => normalize_nested(json, dynasty),
    }
}

fn normalize_flat(
    json: &str,
    dynasty: &str,
    rule: FlatRule,
) -> Result<Vec<NormalizedPoem>, serde_json::Error> {
    let records: Vec<FlatRecord> = serde_json::from_str(json)?;

    Ok(records
        .iter()
        .filter_map(|record| {
            let lines = match rule.content {
                ContentField::Paragraphs => record.paragraphs.as_ref(),
                ContentField::Para => record.para.as_ref(),
                ContentField::Content => record.content.as_ref(),
            };
            let content = non_blank_content(lines)?;

            Some(NormalizedPoem {
                title: flat_title(record, rule.title),
                author: text(&record.author)
                    .unwrap_or(rule.default_author)
                    .to_string(),
                dynasty: dynasty.to_string(),
                content,
            })
        })
        .collect())
}

fn flat_title(record: &FlatRecord, rule: TitleRule) -> String {
    match rule {
        TitleRule::Title => text(&record.title).unwrap_or(DEFAULT_TITLE).to_string(),
        TitleRule::TitleOrRhythmic => text(&record.title)
            .or_else(|| text(&record.rhythmic))
            .unwrap_or(DEFAULT_TITLE)
            .to_string(),
        TitleRule::Composed(segments) => {
            let parts: Vec<&str> = segments
                .iter()
                .filter_map(|segment| match segment {
                    TitleSegment::Chapter => text(&record.chapter),
                    TitleSegment::Section => text(&record.section),
                    TitleSegment::Title => Some(text(&record.title).unwrap_or(DEFAULT_TITLE)),
                })
                .collect();
            parts.join(TITLE_SEPARATOR)
        }
    }
}

fn normalize_nested(json: &str, dynasty: &str) -> Result<Vec<NormalizedPoem>, serde_json::Error> {
    let anthology: NestedAnthology = serde_json::from_str(json)?;

    Ok(anthology
        .content
        .iter()
        .flat_map(|section| section.content.iter())
        .filter_map(|item| {
            let chapter = text(&item.chapter)?;
            let content = non_blank_content(item.paragraphs.as_ref())?;

            let title = match text(&item.subchapter) {
                Some(sub) if sub != chapter => format!("{}（{}）", chapter, sub),
                _ => chapter.to_string(),
            };

            Some(NormalizedPoem {
                title,
                author: text(&item.author).unwrap_or(DEFAULT_AUTHOR).to_string(),
                dynasty: dynasty.to_string(),
                content,
            })
        })
        .collect())
}

/// A present, non-blank string field, as stored in the source.
fn text(field: &Option<Text>) -> Option<&str> {
    field
        .as_ref()
        .and_then(Text::as_str)
        .filter(|s| !s.trim().is_empty())
}

fn non_blank_content(lines: Option<&Lines>) -> Option<String> {
    lines
        .and_then(Lines::joined)
        .filter(|content| !content.trim().is_empty())
}
