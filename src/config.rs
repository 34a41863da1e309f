//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.typeguess.toml` files.

use crate::models::{Vocabulary, MBTI_TYPES};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name of the configuration file looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = ".typeguess.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Input files and record field names.
    #[serde(default)]
    pub data: DataConfig,

    /// Guess-directory scanner settings.
    #[serde(default)]
    pub scanner: ScannerConfig,

    /// Valid category labels.
    #[serde(default)]
    pub vocabulary: VocabularyConfig,

    /// Refusal detection.
    #[serde(default)]
    pub refusal: RefusalConfig,

    /// Plot rendering.
    #[serde(default)]
    pub plot: PlotConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Directory for plots and the summary report.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
        }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("plots")
}

/// Input files and the record fields read from them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    /// Ground-truth JSON Lines file.
    #[serde(default = "default_ground_truth")]
    pub ground_truth: PathBuf,

    /// Field holding the category -> weight map.
    #[serde(default = "default_ground_truth_field")]
    pub ground_truth_field: String,

    /// Guess files aggregated against the ground truth.
    #[serde(default = "default_guess_files")]
    pub guess_files: Vec<PathBuf>,

    /// Guess files for the confidence/refusal statistic.
    #[serde(default = "default_logit_files")]
    pub logit_files: Vec<PathBuf>,

    /// Field holding the guessed label.
    #[serde(default = "default_guess_field")]
    pub guess_field: String,

    /// Field holding the raw guess text.
    #[serde(default = "default_text_field")]
    pub text_field: String,

    /// Field holding token log-probabilities.
    #[serde(default = "default_logprobs_field")]
    pub logprobs_field: String,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            ground_truth: default_ground_truth(),
            ground_truth_field: default_ground_truth_field(),
            guess_files: default_guess_files(),
            logit_files: default_logit_files(),
            guess_field: default_guess_field(),
            text_field: default_text_field(),
            logprobs_field: default_logprobs_field(),
        }
    }
}

fn default_ground_truth() -> PathBuf {
    PathBuf::from("mbti_reddit.jsonl")
}

fn default_ground_truth_field() -> String {
    "commented_types".to_string()
}

fn default_guess_files() -> Vec<PathBuf> {
    vec![
        "llm_guesses/mbti_gpt-4_brief.jsonl",
        "llm_guesses/mbti_gpt-3.5-turbo_brief.jsonl",
        "llm_guesses/mbti_claude-3-opus-20240229_brief.jsonl",
        "llm_guesses/mbti_claude-3-haiku-20240307_brief.jsonl",
        "llm_guesses/mbti_claude-3-haiku-20240307_long.jsonl",
    ]
    .into_iter()
    .map(PathBuf::from)
    .collect()
}

fn default_logit_files() -> Vec<PathBuf> {
    vec![
        "llm_guesses/mbti_gpt-4_brief.jsonl",
        "llm_guesses/mbti_gpt-3.5-turbo_brief.jsonl",
        "llm_guesses/zodiac_gpt-4_brief_manylogs.jsonl",
        "llm_guesses/zodiac_gpt-3.5-turbo_brief_manylogs.jsonl",
    ]
    .into_iter()
    .map(PathBuf::from)
    .collect()
}

fn default_guess_field() -> String {
    "clean_guess".to_string()
}

fn default_text_field() -> String {
    "llm_guess".to_string()
}

fn default_logprobs_field() -> String {
    "logprobs".to_string()
}

/// Guess-directory scanner settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerConfig {
    /// File extensions to include.
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// File or directory names to skip.
    #[serde(default)]
    pub excludes: Vec<String>,

    /// Only pick files whose name starts with this prefix.
    #[serde(default)]
    pub prefix: Option<String>,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            extensions: default_extensions(),
            excludes: Vec::new(),
            prefix: None,
        }
    }
}

fn default_extensions() -> Vec<String> {
    vec!["jsonl".to_string()]
}

/// Valid category labels.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VocabularyConfig {
    #[serde(default = "default_labels")]
    pub labels: Vec<String>,
}

impl Default for VocabularyConfig {
    fn default() -> Self {
        Self {
            labels: default_labels(),
        }
    }
}

fn default_labels() -> Vec<String> {
    MBTI_TYPES.iter().map(|s| s.to_string()).collect()
}

impl VocabularyConfig {
    pub fn to_vocabulary(&self) -> Vocabulary {
        Vocabulary::new(self.labels.iter().cloned())
    }
}

/// Refusal detection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefusalConfig {
    /// Substring of the guess text that marks a refusal.
    #[serde(default = "default_marker")]
    pub marker: String,

    /// Sources whose file name contains one of these get refusal detection.
    #[serde(default = "default_domains")]
    pub domains: Vec<String>,
}

impl Default for RefusalConfig {
    fn default() -> Self {
        Self {
            marker: default_marker(),
            domains: default_domains(),
        }
    }
}

fn default_marker() -> String {
    "The".to_string()
}

fn default_domains() -> Vec<String> {
    vec!["zodiac".to_string()]
}

/// Plot rendering settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlotConfig {
    /// Image width in pixels.
    #[serde(default = "default_width")]
    pub width: u32,

    /// Image height in pixels.
    #[serde(default = "default_height")]
    pub height: u32,
}

impl Default for PlotConfig {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
        }
    }
}

fn default_width() -> u32 {
    1024
}

fn default_height() -> u32 {
    768
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE_NAME);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings, but only
    /// where the CLI provides explicit values.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref ground_truth) = args.ground_truth {
            self.data.ground_truth = ground_truth.clone();
        }

        if !args.logits.is_empty() {
            self.data.logit_files = args.logits.clone();
        }

        if let Some(ref output_dir) = args.output_dir {
            self.general.output_dir = output_dir.clone();
        }

        if let Some(ref marker) = args.refusal_marker {
            self.refusal.marker = marker.clone();
        }

        if let Some(ref prefix) = args.prefix {
            self.scanner.prefix = Some(prefix.clone());
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
