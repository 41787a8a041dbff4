//! Script conversion pass.
//!
//! Every `*.json` file under the corpus root is parsed, each string leaf is
//! run through the configured [`TextConverter`], and the result is written
//! next to the source as `<name>.simplified.json`. Arrays map element-wise
//! and objects map value-wise; keys and non-string leaves are untouched.
//! The source file is never modified.
//!
//! A file that fails to read, parse, or write is recorded in the
//! [`ConversionReport`] and the pass moves on to the next file.

use anyhow::{bail, Context, Result};
use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::catalog::SIMPLIFIED_SUFFIX;
use crate::config::Config;
use crate::error::ConversionError;
use crate::progress::{ProgressEvent, ProgressReporter};
use crate::zhdict::{StagedConverter, TextConverter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversionStatus {
    Success,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConversionDetail {
    pub status: ConversionStatus,
    /// Path relative to the corpus root.
    pub file: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConversionReport {
    pub timestamp: String,
    pub total_files: usize,
    pub successful: usize,
    pub failed: usize,
    pub details: Vec<ConversionDetail>,
}

#[derive(Debug, Clone)]
pub struct ConvertedFile {
    pub original: PathBuf,
    pub simplified: PathBuf,
    /// Bytes written.
    pub size: usize,
}

/// Convert every string leaf of `value`.
pub fn convert_value(value: Value, converter: &dyn TextConverter) -> Value {
    match value {
        Value::String(s) => Value::String(converter.convert(&s)),
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(|item| convert_value(item, converter))
                .collect(),
        ),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, item)| (key, convert_value(item, converter)))
                .collect(),
        ),
        other => other,
    }
}

/// `dir/x.json` → `dir/x.simplified.json`.
pub fn simplified_path(path: &Path) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    path.with_file_name(format!("{}{}", stem, SIMPLIFIED_SUFFIX))
}

/// All convertible files under `root`, recursively, in file-name order.
/// Files that are already conversion outputs are excluded.
pub fn collect_sources(root: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.with_context(|| format!("Failed to walk {}", root.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        if name.ends_with(".json") && !name.ends_with(SIMPLIFIED_SUFFIX) {
            files.push(entry.path().to_path_buf());
        }
    }
    Ok(files)
}

pub fn convert_file(
    path: &Path,
    converter: &dyn TextConverter,
) -> Result<ConvertedFile, ConversionError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConversionError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let value: Value = serde_json::from_str(&text).map_err(|source| ConversionError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    let converted = convert_value(value, converter);
    let json = serde_json::to_string_pretty(&converted).map_err(|source| {
        ConversionError::Parse {
            path: path.to_path_buf(),
            source,
        }
    })?;

    let simplified = simplified_path(path);
    std::fs::write(&simplified, &json).map_err(|source| ConversionError::Write {
        path: simplified.clone(),
        source,
    })?;

    Ok(ConvertedFile {
        original: path.to_path_buf(),
        simplified,
        size: json.len(),
    })
}

/// Convert every source under `root`, collecting per-file outcomes.
pub fn convert_tree(
    root: &Path,
    converter: &dyn TextConverter,
    reporter: &dyn ProgressReporter,
) -> Result<ConversionReport> {
    if !root.is_dir() {
        bail!("Corpus root does not exist: {}", root.display());
    }

    let files = collect_sources(root)?;
    if files.is_empty() {
        bail!("No JSON files found under {}", root.display());
    }

    let total = files.len();
    let mut report = ConversionReport {
        timestamp: chrono::Utc::now().to_rfc3339(),
        total_files: total,
        successful: 0,
        failed: 0,
        details: Vec::with_capacity(total),
    };

    for (i, path) in files.iter().enumerate() {
        let relative = path
            .strip_prefix(root)
            .unwrap_or(path)
            .to_string_lossy()
            .to_string();

        match convert_file(path, converter) {
            Ok(converted) => {
                report.successful += 1;
                report.details.push(ConversionDetail {
                    status: ConversionStatus::Success,
                    file: relative.clone(),
                    size: Some(converted.size),
                    error: None,
                });
            }
            Err(e) => {
                eprintln!("Warning: conversion failed: {}", e);
                report.failed += 1;
                report.details.push(ConversionDetail {
                    status: ConversionStatus::Failed,
                    file: relative.clone(),
                    size: None,
                    error: Some(e.to_string()),
                });
            }
        }

        reporter.report(ProgressEvent::Converting {
            file: relative,
            n: (i + 1) as u64,
            total: total as u64,
        });
    }

    Ok(report)
}

pub fn write_report(path: &Path, report: &ConversionReport) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write conversion report: {}", path.display()))?;
    Ok(())
}

/// CLI entry point for `poemdb convert`.
///
/// With `strict`, any failed file turns into an error after the report has
/// been written.
pub fn run_conversion(
    config: &Config,
    strict: bool,
    reporter: &dyn ProgressReporter,
) -> Result<ConversionReport> {
    if !config.conversion.is_configured() {
        bail!("No conversion stages configured. Add [[conversion.stages]] to the config file.");
    }

    let converter = StagedConverter::from_config(&config.conversion)?;
    let report = convert_tree(&config.corpus.root, &converter, reporter)?;
    write_report(&config.conversion.report, &report)?;

    println!("convert");
    println!("  stages: {}", converter.len());
    println!("  dictionary entries: {}", converter.dictionary_entries());
    println!("  files: {}", report.total_files);
    println!("  converted: {}", report.successful);
    println!("  failed: {}", report.failed);
    for detail in report.details.iter().filter(|d| d.status == ConversionStatus::Failed) {
        println!(
            "    {}: {}",
            detail.file,
            detail.error.as_deref().unwrap_or("unknown error")
        );
    }
    println!("  report: {}", config.conversion.report.display());
    println!("ok");

    if strict && report.failed > 0 {
        bail!("{} file(s) failed conversion", report.failed);
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NoProgress;
    use crate::zhdict::Dictionary;
    use tempfile::TempDir;

    fn converter() -> StagedConverter {
        let dict = Dictionary::from_text("靜\t静\n鄉\t乡\n").unwrap();
        StagedConverter::new(vec![Box::new(dict)])
    }

    #[test]
    fn only_string_values_are_converted() {
        let value: Value = serde_json::from_str(
            r#"{"靜": "靜夜思", "n": 3, "lines": ["故鄉", null, true], "nested": {"t": "鄉"}}"#,
        )
        .unwrap();
        let out = convert_value(value, &converter());

        assert_eq!(out["靜"], "静夜思");
        assert_eq!(out["n"], 3);
        assert_eq!(out["lines"][0], "故乡");
        assert!(out["lines"][1].is_null());
        assert_eq!(out["lines"][2], true);
        assert_eq!(out["nested"]["t"], "乡");

        let keys: Vec<&String> = out.as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["靜", "n", "lines", "nested"]);
    }

    #[test]
    fn simplified_path_is_a_sibling() {
        assert_eq!(
            simplified_path(Path::new("/c/宋词/ci.song.0.json")),
            PathBuf::from("/c/宋词/ci.song.0.simplified.json")
        );
    }

    #[test]
    fn tree_conversion_continues_past_failures() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("全唐诗");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("poet.tang.0.json"), r#"[{"title":"靜夜思"}]"#).unwrap();
        std::fs::write(dir.join("poet.tang.1.json"), "{ not json").unwrap();
        std::fs::write(dir.join("old.simplified.json"), "[]").unwrap();

        let report = convert_tree(tmp.path(), &converter(), &NoProgress).unwrap();
        assert_eq!(report.total_files, 2);
        assert_eq!(report.successful, 1);
        assert_eq!(report.failed, 1);

        let written = std::fs::read_to_string(dir.join("poet.tang.0.simplified.json")).unwrap();
        assert!(written.contains("静夜思"));
        let original = std::fs::read_to_string(dir.join("poet.tang.0.json")).unwrap();
        assert!(original.contains("靜夜思"));
        assert!(!dir.join("poet.tang.1.simplified.json").exists());
    }

    #[test]
    fn empty_tree_is_an_error() {
        let tmp = TempDir::new().unwrap();
        assert!(convert_tree(tmp.path(), &converter(), &NoProgress).is_err());
    }
}
