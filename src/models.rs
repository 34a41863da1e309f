//! Data models for guess aggregation.
//!
//! This module contains the record types read from JSON Lines sources,
//! the label vocabulary, and the aggregate structures handed to the
//! plotting and report layers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// The sixteen MBTI type codes.
pub const MBTI_TYPES: [&str; 16] = [
    "INTP", "ENTP", "ISTP", "ESTP", "ISTJ", "ESTJ", "INFP", "ENFP", "ESFP", "ISFJ", "ISFP", "ESFJ",
    "ENFJ", "INFJ", "INTJ", "ENTJ",
];

/// A closed, alphabetically ordered set of valid category labels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct Vocabulary {
    labels: Vec<String>,
}

impl Vocabulary {
    /// Build a vocabulary from any set of labels. Labels are sorted and
    /// de-duplicated.
    pub fn new<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut labels: Vec<String> = labels.into_iter().map(Into::into).collect();
        labels.sort();
        labels.dedup();
        Self { labels }
    }

    /// The MBTI vocabulary.
    pub fn mbti() -> Self {
        Self::new(MBTI_TYPES)
    }

    pub fn contains(&self, label: &str) -> bool {
        self.labels
            .binary_search_by(|l| l.as_str().cmp(label))
            .is_ok()
    }

    /// Labels in alphabetical order.
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self::mbti()
    }
}

impl From<Vec<String>> for Vocabulary {
    fn from(labels: Vec<String>) -> Self {
        Self::new(labels)
    }
}

impl From<Vocabulary> for Vec<String> {
    fn from(vocabulary: Vocabulary) -> Self {
        vocabulary.labels
    }
}

impl fmt::Display for Vocabulary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.labels.join(", "))
    }
}

/// Crowd-endorsed weights over categories for one observation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroundTruthRecord {
    pub weights: BTreeMap<String, f64>,
}

impl GroundTruthRecord {
    pub fn new<I, S>(weights: I) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        Self {
            weights: weights.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    /// Sum of all weights in the record.
    pub fn total_weight(&self) -> f64 {
        self.weights.values().sum()
    }
}

/// One guess produced by a named guesser.
#[derive(Debug, Clone, PartialEq)]
pub struct GuessRecord {
    /// 0-based position in the source; pairs the guess with the
    /// ground-truth record at the same index.
    pub index: usize,
    /// Guessed label. `None` when the field was null or not a string.
    pub guess: Option<String>,
    /// Raw guess text as produced by the model.
    pub text: Option<String>,
    /// Token position -> candidate list, each candidate carrying a `logprob`.
    pub logprobs: Option<serde_json::Value>,
}

impl GuessRecord {
    /// Creates a record with only a label.
    #[cfg(test)]
    pub fn new(index: usize, guess: impl Into<String>) -> Self {
        Self {
            index,
            guess: Some(guess.into()),
            text: None,
            logprobs: None,
        }
    }

    /// Log-probability of the top candidate at the first token position.
    ///
    /// Token positions are taken in source order.
    pub fn top_logprob(&self) -> Option<f64> {
        let positions = self.logprobs.as_ref()?.as_object()?;
        let (_, candidates) = positions.iter().next()?;
        candidates.as_array()?.first()?.get("logprob")?.as_f64()
    }
}

/// Records from one guesser, keyed by its display name.
#[derive(Debug, Clone, PartialEq)]
pub struct GuessSource {
    pub name: String,
    pub records: Vec<GuessRecord>,
}

impl GuessSource {
    pub fn new(name: impl Into<String>, records: Vec<GuessRecord>) -> Self {
        Self {
            name: name.into(),
            records,
        }
    }
}

/// Accumulated ground-truth weight grouped by guessed label.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AccuracyTable {
    /// guess -> true category -> accumulated weight.
    pub accuracy: BTreeMap<String, BTreeMap<String, f64>>,
    /// guess -> number of records with that guess.
    pub counts: BTreeMap<String, usize>,
}

impl AccuracyTable {
    /// Adds one valid guess paired with its ground truth.
    pub fn record(&mut self, guess: &str, truth: &GroundTruthRecord) {
        *self.counts.entry(guess.to_string()).or_insert(0) += 1;

        let row = self.accuracy.entry(guess.to_string()).or_default();
        for (category, weight) in &truth.weights {
            *row.entry(category.clone()).or_insert(0.0) += weight;
        }
    }

    /// Number of valid guesses recorded.
    pub fn total_count(&self) -> usize {
        self.counts.values().sum()
    }

    /// Sum of all accumulated weight.
    pub fn total_weight(&self) -> f64 {
        self.accuracy.values().flat_map(|row| row.values()).sum()
    }
}

/// Guess-by-truth ratio matrix ready for a heatmap.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RatioMatrix {
    /// Guess labels, alphabetical.
    pub rows: Vec<String>,
    /// True categories, vocabulary order.
    pub columns: Vec<String>,
    /// `values[r][c]` = accumulated weight / guess count.
    pub values: Vec<Vec<f64>>,
}

impl RatioMatrix {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Largest cell value, 0 for an empty matrix.
    pub fn max_value(&self) -> f64 {
        self.values
            .iter()
            .flatten()
            .copied()
            .fold(0.0, f64::max)
    }
}

/// Average top-token confidence and refusal rate for one source.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogitSummary {
    pub source: String,
    pub total: usize,
    pub refusals: usize,
    /// `None` when every record was a refusal.
    pub average_top_probability: Option<f64>,
    /// `None` when the source was empty.
    pub refusal_rate: Option<f64>,
}

/// Everything computed for one guesser.
#[derive(Debug, Clone, Serialize)]
pub struct GuesserSummary {
    pub name: String,
    pub valid_guesses: usize,
    pub counts: BTreeMap<String, usize>,
    pub matrix: RatioMatrix,
}

/// Metadata about a run.
#[derive(Debug, Clone, Serialize)]
pub struct RunMetadata {
    pub generated_at: DateTime<Utc>,
    pub ground_truth_path: String,
    pub ground_truth_records: usize,
    pub vocabulary: Vocabulary,
    pub duration_seconds: f64,
}

/// The complete run summary written next to the plots.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub metadata: RunMetadata,
    pub ground_truth_totals: BTreeMap<String, f64>,
    pub guessers: Vec<GuesserSummary>,
    pub confidence: Vec<LogitSummary>,
}
