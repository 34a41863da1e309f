//! Error types for record loading and aggregation.
//!
//! Invalid guess labels are not represented here: they are filtered
//! silently by the aggregator.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that abort a run.
#[derive(Error, Debug)]
pub enum StatsError {
    /// A line could not be parsed or lacks a required field.
    #[error("malformed record in {origin} at line {line}: {reason}")]
    MalformedRecord {
        origin: String,
        /// 1-indexed line number in the source.
        line: usize,
        reason: String,
    },

    /// A guess record points past the end of the ground truth.
    #[error(
        "guess source '{name}' has a record at index {index} but the ground truth only has {ground_truth_len} records"
    )]
    Alignment {
        name: String,
        index: usize,
        ground_truth_len: usize,
    },

    /// Two guess sources resolved to the same display name.
    #[error("duplicate guess source name: {name}")]
    DuplicateSource { name: String },

    #[error("failed to read {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, StatsError>;

impl StatsError {
    pub(crate) fn malformed(origin: &str, line: usize, reason: impl Into<String>) -> Self {
        StatsError::MalformedRecord {
            origin: origin.to_string(),
            line,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_message_names_line() {
        let err = StatsError::malformed("truth.jsonl", 3, "missing field");
        let msg = err.to_string();
        assert!(msg.contains("truth.jsonl"));
        assert!(msg.contains("line 3"));
        assert!(msg.contains("missing field"));
    }

    #[test]
    fn test_alignment_message() {
        let err = StatsError::Alignment {
            name: "gpt-4_brief".to_string(),
            index: 5,
            ground_truth_len: 5,
        };
        assert!(err.to_string().contains("gpt-4_brief"));
        assert!(err.to_string().contains("only has 5 records"));
    }

    #[test]
    fn test_io_message_leaves_cause_to_source_chain() {
        use std::error::Error as _;

        let err = StatsError::Io {
            path: PathBuf::from("missing.jsonl"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
        };
        assert_eq!(err.to_string(), "failed to read missing.jsonl");
        assert_eq!(
            err.source().map(|s| s.to_string()),
            Some("no such file".to_string())
        );

        let chained = format!("{:#}", anyhow::Error::new(err));
        assert_eq!(chained.matches("no such file").count(), 1);
    }
}
