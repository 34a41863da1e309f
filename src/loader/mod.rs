//! JSON Lines record reader.
//!
//! Each non-empty source yields one record per line, in source order.
//! Any line that fails to parse aborts the whole read.

use crate::error::{Result, StatsError};
use crate::models::{GroundTruthRecord, GuessRecord};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Field names read from guess records.
#[derive(Debug, Clone)]
pub struct GuessFields {
    /// Field holding the guessed label.
    pub guess: String,
    /// Field holding the raw guess text.
    pub text: String,
    /// Field holding the per-token log-probabilities.
    pub logprobs: String,
}

impl Default for GuessFields {
    fn default() -> Self {
        Self {
            guess: "clean_guess".to_string(),
            text: "llm_guess".to_string(),
            logprobs: "logprobs".to_string(),
        }
    }
}

impl From<&crate::config::DataConfig> for GuessFields {
    fn from(config: &crate::config::DataConfig) -> Self {
        Self {
            guess: config.guess_field.clone(),
            text: config.text_field.clone(),
            logprobs: config.logprobs_field.clone(),
        }
    }
}

/// Read ground-truth records from a file.
pub fn read_ground_truth(path: &Path, field: &str) -> Result<Vec<GroundTruthRecord>> {
    let content = read_source(path)?;
    let records = parse_ground_truth(&path.display().to_string(), &content, field)?;
    debug!("Read {} ground-truth records from {}", records.len(), path.display());
    Ok(records)
}

/// Read guess records from a file.
pub fn read_guesses(path: &Path, fields: &GuessFields) -> Result<Vec<GuessRecord>> {
    let content = read_source(path)?;
    let records = parse_guesses(&path.display().to_string(), &content, fields)?;
    debug!("Read {} guess records from {}", records.len(), path.display());
    Ok(records)
}

fn read_source(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|source| StatsError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Parse ground-truth records from JSON Lines text.
///
/// `field` must hold an object of non-negative numeric weights.
pub fn parse_ground_truth(
    origin: &str,
    content: &str,
    field: &str,
) -> Result<Vec<GroundTruthRecord>> {
    let mut records = Vec::new();

    for (i, line) in content.lines().enumerate() {
        let line_no = i + 1;
        let value = parse_line(origin, line_no, line)?;

        let weights = value
            .get(field)
            .ok_or_else(|| StatsError::malformed(origin, line_no, format!("missing field '{}'", field)))?
            .as_object()
            .ok_or_else(|| {
                StatsError::malformed(origin, line_no, format!("field '{}' is not an object", field))
            })?;

        let mut parsed = BTreeMap::new();
        for (category, weight) in weights {
            let weight = weight.as_f64().ok_or_else(|| {
                StatsError::malformed(
                    origin,
                    line_no,
                    format!("weight for '{}' is not a number", category),
                )
            })?;
            if weight < 0.0 {
                return Err(StatsError::malformed(
                    origin,
                    line_no,
                    format!("weight for '{}' is negative", category),
                ));
            }
            parsed.insert(category.clone(), weight);
        }

        records.push(GroundTruthRecord::new(parsed));
    }

    Ok(records)
}

/// Parse guess records from JSON Lines text.
///
/// The guess field must be present; a null or non-string label is kept as
/// `None` so the aggregator can filter it like any other invalid label.
pub fn parse_guesses(origin: &str, content: &str, fields: &GuessFields) -> Result<Vec<GuessRecord>> {
    let mut records = Vec::new();

    for (index, line) in content.lines().enumerate() {
        let value = parse_line(origin, index + 1, line)?;

        let guess = value.get(&fields.guess).ok_or_else(|| {
            StatsError::malformed(origin, index + 1, format!("missing field '{}'", fields.guess))
        })?;

        records.push(GuessRecord {
            index,
            guess: guess.as_str().map(String::from),
            text: value
                .get(&fields.text)
                .and_then(Value::as_str)
                .map(String::from),
            logprobs: value.get(&fields.logprobs).cloned(),
        });
    }

    Ok(records)
}

fn parse_line(origin: &str, line_no: usize, line: &str) -> Result<Value> {
    serde_json::from_str(line)
        .map_err(|e| StatsError::malformed(origin, line_no, format!("invalid JSON: {}", e)))
}
