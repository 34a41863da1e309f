//! Summary report generation.
//!
//! This module renders the aggregates of a run as Markdown or JSON.

use crate::analysis::most_common_guess;
use crate::models::{GuesserSummary, LogitSummary, RatioMatrix, RunMetadata, RunReport};
use anyhow::Result;
use std::collections::BTreeMap;

/// Generate a complete Markdown report.
pub fn generate_markdown_report(report: &RunReport) -> String {
    let mut output = String::new();

    output.push_str("# Guess Accuracy Report\n\n");
    output.push_str(&generate_metadata_section(&report.metadata));
    output.push_str(&generate_totals_section(&report.ground_truth_totals));

    for guesser in &report.guessers {
        output.push_str(&generate_guesser_section(guesser));
    }

    output.push_str(&generate_confidence_section(&report.confidence));

    output
}

/// Generate the metadata section.
fn generate_metadata_section(metadata: &RunMetadata) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!(
        "- **Generated:** {}\n",
        metadata.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!(
        "- **Ground Truth:** `{}` ({} records)\n",
        metadata.ground_truth_path, metadata.ground_truth_records
    ));
    section.push_str(&format!("- **Vocabulary:** {}\n", metadata.vocabulary));
    section.push_str(&format!("- **Duration:** {:.2}s\n", metadata.duration_seconds));
    section.push('\n');

    section
}

/// Generate the ground-truth totals table.
fn generate_totals_section(totals: &BTreeMap<String, f64>) -> String {
    let mut section = String::new();

    section.push_str("## Ground Truth Totals\n\n");
    if totals.is_empty() {
        section.push_str("No ground-truth weight was recorded.\n\n");
        return section;
    }

    section.push_str("| Type | Weight |\n");
    section.push_str("|:---|---:|\n");
    for (category, weight) in totals {
        section.push_str(&format!("| {} | {} |\n", category, format_weight(*weight)));
    }
    section.push('\n');

    section
}

/// Generate the section for one guesser.
fn generate_guesser_section(guesser: &GuesserSummary) -> String {
    let mut section = String::new();

    section.push_str(&format!("## {}\n\n", guesser.name));
    section.push_str(&format!("*Valid guesses: {}*\n\n", guesser.valid_guesses));

    if guesser.counts.is_empty() {
        section.push_str("No guesses matched the vocabulary.\n\n");
        return section;
    }

    if let Some((label, count)) = most_common_guess(&guesser.counts) {
        section.push_str(&format!("Most common guess: **{}** ({})\n\n", label, count));
    }

    section.push_str("### Guess Counts\n\n");
    section.push_str("| Guess | Count |\n");
    section.push_str("|:---|---:|\n");
    for (label, count) in &guesser.counts {
        section.push_str(&format!("| {} | {} |\n", label, count));
    }
    section.push('\n');

    section.push_str("### Accuracy per Type\n\n");
    section.push_str(&generate_matrix_table(&guesser.matrix));

    section
}

/// Render a ratio matrix as a Markdown table.
fn generate_matrix_table(matrix: &RatioMatrix) -> String {
    let mut table = String::new();

    table.push_str("| Guess |");
    for column in &matrix.columns {
        table.push_str(&format!(" {} |", column));
    }
    table.push('\n');

    table.push_str("|:---|");
    for _ in &matrix.columns {
        table.push_str("---:|");
    }
    table.push('\n');

    for (row, values) in matrix.rows.iter().zip(&matrix.values) {
        table.push_str(&format!("| **{}** |", row));
        for value in values {
            table.push_str(&format!(" {:.2} |", value));
        }
        table.push('\n');
    }
    table.push('\n');

    table
}

/// Generate the confidence/refusal section.
fn generate_confidence_section(summaries: &[LogitSummary]) -> String {
    if summaries.is_empty() {
        return String::new();
    }

    let mut section = String::new();

    section.push_str("## Confidence and Refusals\n\n");
    section.push_str("| Source | Records | Avg. top probability | Refusal rate |\n");
    section.push_str("|:---|---:|---:|---:|\n");
    for summary in summaries {
        section.push_str(&format!(
            "| `{}` | {} | {} | {} |\n",
            summary.source,
            summary.total,
            format_optional(summary.average_top_probability),
            format_optional(summary.refusal_rate),
        ));
    }
    section.push('\n');

    section
}

/// One-line rendering of a confidence summary for stdout.
pub fn format_logit_line(summary: &LogitSummary) -> String {
    format!(
        "Logprob for {}: {} Refusal rate: {}",
        summary.source,
        format_optional(summary.average_top_probability),
        format_optional(summary.refusal_rate)
    )
}

fn format_optional(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{:.4}", v),
        None => "n/a".to_string(),
    }
}

fn format_weight(weight: f64) -> String {
    if weight.fract() == 0.0 {
        format!("{}", weight as i64)
    } else {
        format!("{:.2}", weight)
    }
}

/// Generate a JSON report.
pub fn generate_json_report(report: &RunReport) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}
