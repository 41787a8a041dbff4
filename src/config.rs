//! TOML configuration for the build pipeline.
//!
//! Every stage reads its paths and tunables from one file (default
//! `./config/poemdb.toml`). Only `[db]` and `[corpus]` are required; the
//! ranking, conversion, and chat sections fall back to defaults.
//!
//! ```toml
//! [db]
//! path = "./pocket_poem.db"
//!
//! [corpus]
//! root = "./lib/poems"
//!
//! [[conversion.stages]]
//! builtin = "zh-cn"
//!
//! [[conversion.stages]]
//! files = ["./opencc/TSPhrases.txt", "./opencc/TSCharacters.txt"]
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    pub corpus: CorpusConfig,
    #[serde(default)]
    pub ranking: RankingConfig,
    #[serde(default)]
    pub conversion: ConversionConfig,
    #[serde(default)]
    pub chat: ChatConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CorpusConfig {
    pub root: PathBuf,
    #[serde(default = "default_progress_every")]
    pub progress_every: u64,
}

fn default_progress_every() -> u64 {
    5000
}

#[derive(Debug, Deserialize, Clone)]
pub struct RankingConfig {
    #[serde(default = "default_rank_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_rank_output")]
    pub output: PathBuf,
    #[serde(default = "default_top_n")]
    pub top_n: usize,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            dir: default_rank_dir(),
            output: default_rank_output(),
            top_n: default_top_n(),
        }
    }
}

fn default_rank_dir() -> PathBuf {
    PathBuf::from("./lib/poems/rank")
}
fn default_rank_output() -> PathBuf {
    PathBuf::from("./lib/poems/rank/popular-poems.json")
}
fn default_top_n() -> usize {
    300
}

#[derive(Debug, Deserialize, Clone)]
pub struct ConversionConfig {
    #[serde(default = "default_report")]
    pub report: PathBuf,
    /// Conversion stages applied in order. Empty means conversion is not configured.
    #[serde(default)]
    pub stages: Vec<ConversionStage>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            report: default_report(),
            stages: Vec::new(),
        }
    }
}

fn default_report() -> PathBuf {
    PathBuf::from("./conversion_report.json")
}

/// One conversion stage: either a built-in table or OpenCC dictionary files.
#[derive(Debug, Deserialize, Clone)]
#[serde(untagged)]
pub enum ConversionStage {
    Builtin { builtin: BuiltinTarget },
    Files { files: Vec<PathBuf> },
}

/// Target script of a built-in conversion table.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinTarget {
    /// Mainland simplified, with regional vocabulary.
    #[serde(rename = "zh-cn")]
    ZhCn,
    /// Simplified script only.
    #[serde(rename = "zh-hans")]
    ZhHans,
}

impl ConversionConfig {
    pub fn is_configured(&self) -> bool {
        !self.stages.is_empty()
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChatConfig {
    #[serde(default = "default_chat_provider")]
    pub provider: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            provider: default_chat_provider(),
            base_url: default_base_url(),
            model: None,
            api_key_env: default_api_key_env(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }
}

fn default_chat_provider() -> String {
    "disabled".to_string()
}
fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}
fn default_temperature() -> f64 {
    0.7
}
fn default_max_tokens() -> u32 {
    2000
}
fn default_timeout_secs() -> u64 {
    60
}
fn default_max_retries() -> u32 {
    3
}

impl ChatConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    if config.corpus.progress_every == 0 {
        anyhow::bail!("corpus.progress_every must be > 0");
    }

    if config.ranking.top_n == 0 {
        anyhow::bail!("ranking.top_n must be >= 1");
    }

    for (i, stage) in config.conversion.stages.iter().enumerate() {
        if matches!(stage, ConversionStage::Files { files } if files.is_empty()) {
            anyhow::bail!("conversion.stages[{}] must list at least one dictionary file", i);
        }
    }

    if !(0.0..=2.0).contains(&config.chat.temperature) {
        anyhow::bail!("chat.temperature must be in [0.0, 2.0]");
    }

    match config.chat.provider.as_str() {
        "disabled" => {}
        "openai" => {
            if config.chat.model.is_none() {
                anyhow::bail!(
                    "chat.model must be specified when provider is '{}'",
                    config.chat.provider
                );
            }
        }
        other => anyhow::bail!(
            "Unknown chat provider: '{}'. Must be disabled or openai.",
            other
        ),
    }

    Ok(())
}
