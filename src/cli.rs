//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use clap::Parser;
use std::path::PathBuf;

/// typeguess - aggregate and plot LLM category guesses
///
/// Compares hard-label guesses from one or more models against
/// crowd-labelled ground truth, then writes per-type bar charts,
/// accuracy heatmaps and a summary report.
///
/// Without arguments the file lists from .typeguess.toml (or the
/// built-in defaults) are used.
///
/// Examples:
///   typeguess
///   typeguess --ground-truth mbti_reddit.jsonl --guess-dir llm_guesses --prefix mbti_
///   typeguess --guesses baseline=runs/a.jsonl --guesses runs/mbti_gpt-4_brief.jsonl
///   typeguess --logits llm_guesses/zodiac_gpt-4_brief_manylogs.jsonl --dry-run
///   typeguess --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Ground-truth JSON Lines file
    #[arg(short, long, value_name = "FILE", env = "TYPEGUESS_GROUND_TRUTH")]
    pub ground_truth: Option<PathBuf>,

    /// Guess file to aggregate, optionally named as NAME=FILE
    ///
    /// May be repeated. Without a NAME the display name is derived from
    /// the file name (mbti_gpt-4_brief.jsonl -> gpt-4_brief).
    #[arg(long = "guesses", value_name = "[NAME=]FILE")]
    pub guesses: Vec<String>,

    /// Directory scanned for guess files
    ///
    /// Display names drop the domain segment, so mbti_gpt-4_brief.jsonl and
    /// zodiac_gpt-4_brief.jsonl collide. Use --prefix (e.g. mbti_) to keep
    /// one domain per run.
    #[arg(long, value_name = "DIR")]
    pub guess_dir: Option<PathBuf>,

    /// Only pick guess-directory files starting with this prefix
    #[arg(long, value_name = "PREFIX", requires = "guess_dir")]
    pub prefix: Option<String>,

    /// Guess file for the confidence/refusal statistic (repeatable)
    #[arg(long = "logits", value_name = "FILE")]
    pub logits: Vec<PathBuf>,

    /// Directory for plots and the summary report
    #[arg(short, long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Summary report format (markdown, json)
    #[arg(long, default_value = "markdown", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Substring of the guess text that marks a refusal
    #[arg(long, value_name = "TEXT")]
    pub refusal_marker: Option<String>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .typeguess.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Load and aggregate, print the summary, but write no files
    #[arg(long)]
    pub dry_run: bool,

    /// Generate a default .typeguess.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the summary report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

impl OutputFormat {
    /// File name of the summary report.
    pub fn report_file_name(&self) -> &'static str {
        match self {
            OutputFormat::Markdown => "summary.md",
            OutputFormat::Json => "summary.json",
        }
    }
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        if self.init_config {
            return Ok(());
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(ref dir) = self.guess_dir {
            if !dir.is_dir() {
                return Err(format!("Guess directory does not exist: {}", dir.display()));
            }
        }

        for source in &self.guesses {
            if source.trim().is_empty() || source.ends_with('=') {
                return Err(format!("Invalid guess source: '{}'", source));
            }
        }

        if let Some(ref marker) = self.refusal_marker {
            if marker.is_empty() {
                return Err("Refusal marker must not be empty".to_string());
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
