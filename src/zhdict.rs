//! Chinese script conversion.
//!
//! Dictionaries use the OpenCC text format, one mapping per line:
//!
//! ```text
//! 乾隆	乾隆
//! 乾	干 乾
//! 頭髮	头发
//! ```
//!
//! The first candidate after the tab is used. A [`Dictionary`] is compiled
//! into a leftmost-longest Aho-Corasick automaton, so phrase entries shadow
//! their single characters. A [`StagedConverter`] chains stages: Hong Kong
//! variant normalization runs before traditional→simplified, each stage
//! seeing the previous stage's output. A stage can also be one of the
//! tables built into `zhconv`, which needs no dictionary files on disk.

use aho_corasick::{AhoCorasick, AhoCorasickBuilder, MatchKind};
use anyhow::{Context, Result};
use std::collections::HashSet;
use std::path::PathBuf;

use crate::config::{BuiltinTarget, ConversionConfig, ConversionStage};

/// Converts text from one script to another.
pub trait TextConverter: Send + Sync {
    fn convert(&self, text: &str) -> String;

    /// Number of dictionary mappings, when the converter has a countable table.
    fn entries(&self) -> Option<usize> {
        None
    }
}

/// Collects mappings before they are compiled into a [`Dictionary`].
#[derive(Debug, Default)]
pub struct DictionaryBuilder {
    keys: Vec<String>,
    values: Vec<String>,
    seen: HashSet<String>,
}

impl DictionaryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a mapping. An existing key keeps its first mapping, so files
    /// listed earlier in a stage take precedence.
    pub fn insert(&mut self, from: &str, to: &str) {
        if from.is_empty() || !self.seen.insert(from.to_string()) {
            return;
        }
        self.keys.push(from.to_string());
        self.values.push(to.to_string());
    }

    /// Add every mapping in OpenCC text format. Blank lines and `#`
    /// comments are ignored.
    pub fn extend_from_str(&mut self, text: &str) {
        for line in text.lines() {
            let line = line.trim_end_matches('\r');
            if line.trim().is_empty() || line.starts_with('#') {
                continue;
            }
            let (key, rest) = match line.split_once('\t') {
                Some((key, rest)) => (key.trim(), rest),
                None => {
                    let mut parts = line.splitn(2, char::is_whitespace);
                    (parts.next().unwrap_or("").trim(), parts.next().unwrap_or(""))
                }
            };
            if let Some(value) = rest.split_whitespace().next() {
                self.insert(key, value);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn build(self) -> Result<Dictionary> {
        let matcher = AhoCorasickBuilder::new()
            .match_kind(MatchKind::LeftmostLongest)
            .build(&self.keys)
            .context("Failed to compile conversion dictionary")?;
        Ok(Dictionary {
            matcher,
            replacements: self.values,
        })
    }
}

/// A compiled dictionary stage.
#[derive(Debug, Clone)]
pub struct Dictionary {
    matcher: AhoCorasick,
    replacements: Vec<String>,
}

impl Dictionary {
    pub fn from_text(text: &str) -> Result<Self> {
        let mut builder = DictionaryBuilder::new();
        builder.extend_from_str(text);
        builder.build()
    }

    pub fn load(paths: &[PathBuf]) -> Result<Self> {
        let mut builder = DictionaryBuilder::new();
        for path in paths {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read dictionary: {}", path.display()))?;
            builder.extend_from_str(&text);
        }
        builder.build()
    }

    pub fn len(&self) -> usize {
        self.replacements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.replacements.is_empty()
    }

    /// Replace every leftmost-longest key in `text`.
    pub fn apply(&self, text: &str) -> String {
        if self.is_empty() {
            return text.to_string();
        }
        self.matcher.replace_all(text, &self.replacements)
    }
}

impl TextConverter for Dictionary {
    fn convert(&self, text: &str) -> String {
        self.apply(text)
    }

    fn entries(&self) -> Option<usize> {
        Some(self.len())
    }
}

/// One of the conversion tables compiled into `zhconv`.
#[derive(Debug, Clone, Copy)]
pub struct BuiltinConverter {
    target: BuiltinTarget,
}

impl BuiltinConverter {
    pub fn new(target: BuiltinTarget) -> Self {
        Self { target }
    }

    fn variant(&self) -> zhconv::Variant {
        match self.target {
            BuiltinTarget::ZhCn => zhconv::Variant::ZhCN,
            BuiltinTarget::ZhHans => zhconv::Variant::ZhHans,
        }
    }
}

impl TextConverter for BuiltinConverter {
    fn convert(&self, text: &str) -> String {
        zhconv::zhconv(text, self.variant())
    }
}

/// A chain of conversion stages applied in order.
#[derive(Default)]
pub struct StagedConverter {
    stages: Vec<Box<dyn TextConverter>>,
}

impl StagedConverter {
    pub fn new(stages: Vec<Box<dyn TextConverter>>) -> Self {
        Self { stages }
    }

    pub fn from_config(config: &ConversionConfig) -> Result<Self> {
        let stages = config
            .stages
            .iter()
            .map(|stage| -> Result<Box<dyn TextConverter>> {
                Ok(match stage {
                    ConversionStage::Builtin { builtin } => {
                        Box::new(BuiltinConverter::new(*builtin))
                    }
                    ConversionStage::Files { files } => Box::new(Dictionary::load(files)?),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(stages))
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Mappings loaded from dictionary files. Built-in stages are not counted.
    pub fn dictionary_entries(&self) -> usize {
        self.stages.iter().filter_map(|s| s.entries()).sum()
    }
}

impl TextConverter for StagedConverter {
    fn convert(&self, text: &str) -> String {
        self.stages
            .iter()
            .fold(text.to_string(), |acc, stage| stage.convert(&acc))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dict(text: &str) -> Dictionary {
        Dictionary::from_text(text).unwrap()
    }

    #[test]
    fn characters_convert_and_unknowns_pass_through() {
        let d = dict("靜\t静\n夜\t夜\n鄉\t乡\n");
        assert_eq!(d.apply("靜夜思，故鄉。abc"), "静夜思，故乡。abc");
    }

    #[test]
    fn longest_match_prefers_phrases() {
        let d = dict("乾\t干 乾\n乾隆\t乾隆\n");
        assert_eq!(d.apply("乾隆乾杯"), "乾隆干杯");
    }

    #[test]
    fn phrase_listed_after_its_prefix_still_wins() {
        let d = dict("頭\t头\n髮\t发\n頭髮\t头发\n頭髮絲\t头发丝\n");
        assert_eq!(d.apply("頭髮絲頭"), "头发丝头");
    }

    #[test]
    fn first_mapping_wins_across_files() {
        let mut builder = DictionaryBuilder::new();
        builder.extend_from_str("髮\t发\n# comment\n\n");
        builder.extend_from_str("髮\t髪\n");
        assert_eq!(builder.len(), 1);

        let d = builder.build().unwrap();
        assert_eq!(d.apply("髮"), "发");
    }

    #[test]
    fn stages_apply_in_order() {
        let hk = dict("着\t著\n");
        let ts = dict("著\t着\n");
        let converter = StagedConverter::new(vec![Box::new(hk), Box::new(ts)]);
        assert_eq!(converter.convert("着"), "着");
        assert_eq!(converter.dictionary_entries(), 2);
    }

    #[test]
    fn empty_converter_is_identity() {
        let converter = StagedConverter::default();
        assert_eq!(converter.convert("床前明月光"), "床前明月光");

        let empty = DictionaryBuilder::new().build().unwrap();
        assert_eq!(empty.apply("床前明月光"), "床前明月光");
    }

    #[test]
    fn builtin_table_simplifies_without_files() {
        let converter = BuiltinConverter::new(BuiltinTarget::ZhCn);
        assert_eq!(converter.convert("東臨碣石，以觀滄海。"), "东临碣石，以观沧海。");
        assert_eq!(converter.entries(), None);
    }
}
