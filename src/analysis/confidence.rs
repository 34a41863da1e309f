//! Top-token confidence and refusal rate.

use crate::error::{Result, StatsError};
use crate::models::{GuessRecord, LogitSummary};

/// Decides whether a guess record is a refusal.
///
/// `marker` is matched as a plain substring of the guess text. The rule
/// only fires when `enabled` is set for the source's domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefusalRule {
    pub marker: String,
    pub enabled: bool,
}

impl RefusalRule {
    pub fn new(marker: impl Into<String>, enabled: bool) -> Self {
        Self {
            marker: marker.into(),
            enabled,
        }
    }

    /// Enable the rule when the source name mentions one of `domains`.
    pub fn for_source(marker: impl Into<String>, source: &str, domains: &[String]) -> Self {
        let enabled = domains.iter().any(|d| !d.is_empty() && source.contains(d.as_str()));
        Self::new(marker, enabled)
    }

    pub fn matches(&self, record: &GuessRecord) -> bool {
        self.enabled
            && record
                .text
                .as_deref()
                .is_some_and(|text| text.contains(self.marker.as_str()))
    }
}

/// Average top-token probability and refusal rate over `records`.
///
/// Refusals are excluded from the average. Every other record must carry
/// a logprob for its first token.
pub fn logit_info<F>(source: &str, records: &[GuessRecord], is_refusal: F) -> Result<LogitSummary>
where
    F: Fn(&GuessRecord) -> bool,
{
    let mut refusals = 0;
    let mut probabilities = Vec::with_capacity(records.len());

    for record in records {
        if is_refusal(record) {
            refusals += 1;
            continue;
        }

        let logprob = record.top_logprob().ok_or_else(|| {
            StatsError::malformed(source, record.index + 1, "no top-token logprob")
        })?;
        probabilities.push(logprob.exp());
    }

    let average_top_probability = if probabilities.is_empty() {
        None
    } else {
        Some(probabilities.iter().sum::<f64>() / probabilities.len() as f64)
    };

    let refusal_rate = if records.is_empty() {
        None
    } else {
        Some(refusals as f64 / records.len() as f64)
    };

    Ok(LogitSummary {
        source: source.to_string(),
        total: records.len(),
        refusals,
        average_top_probability,
        refusal_rate,
    })
}
