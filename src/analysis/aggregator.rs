//! Guess aggregation and accuracy matrices.
//!
//! Guesses are paired with ground truth by record index. Weights
//! accumulate rather than being scored as hit/miss, so a table row is the
//! expected overlap between a guess label and the crowd's labels.

use crate::error::{Result, StatsError};
use crate::models::{AccuracyTable, GroundTruthRecord, GuessSource, RatioMatrix, Vocabulary};
use std::collections::BTreeMap;
use tracing::debug;

/// Total ground-truth weight per category across all records.
pub fn ground_truth_totals(ground_truth: &[GroundTruthRecord]) -> BTreeMap<String, f64> {
    let mut totals: BTreeMap<String, f64> = BTreeMap::new();

    for record in ground_truth {
        for (category, weight) in &record.weights {
            *totals.entry(category.clone()).or_insert(0.0) += weight;
        }
    }

    totals
}

/// Build one accuracy table per guess source.
///
/// Records whose label is missing or outside `vocabulary` are skipped
/// without a trace. A record indexed past the end of `ground_truth` fails
/// the whole call.
pub fn aggregate(
    guess_sources: &[GuessSource],
    ground_truth: &[GroundTruthRecord],
    vocabulary: &Vocabulary,
) -> Result<BTreeMap<String, AccuracyTable>> {
    let mut tables = BTreeMap::new();

    for source in guess_sources {
        if tables.contains_key(&source.name) {
            return Err(StatsError::DuplicateSource {
                name: source.name.clone(),
            });
        }

        let table = aggregate_source(source, ground_truth, vocabulary)?;
        debug!(
            "{}: {} valid guesses out of {} records, accumulated weight {}",
            source.name,
            table.total_count(),
            source.records.len(),
            table.total_weight()
        );
        tables.insert(source.name.clone(), table);
    }

    Ok(tables)
}

/// Build the accuracy table for a single source.
pub fn aggregate_source(
    source: &GuessSource,
    ground_truth: &[GroundTruthRecord],
    vocabulary: &Vocabulary,
) -> Result<AccuracyTable> {
    let mut table = AccuracyTable::default();

    for record in &source.records {
        let truth = ground_truth
            .get(record.index)
            .ok_or_else(|| StatsError::Alignment {
                name: source.name.clone(),
                index: record.index,
                ground_truth_len: ground_truth.len(),
            })?;

        match record.guess.as_deref() {
            Some(guess) if vocabulary.contains(guess) => table.record(guess, truth),
            _ => continue,
        }
    }

    Ok(table)
}

/// Per-guess accuracy ratios.
///
/// Rows are the observed guess labels in alphabetical order; columns
/// follow the vocabulary. Each cell is the accumulated weight divided by
/// the number of times the row label was guessed.
pub fn ratio_matrix(table: &AccuracyTable, vocabulary: &Vocabulary) -> RatioMatrix {
    let rows: Vec<String> = table.counts.keys().cloned().collect();
    let columns: Vec<String> = vocabulary.labels().to_vec();

    let values = rows
        .iter()
        .map(|guess| {
            let count = table.counts.get(guess).copied().unwrap_or(0);
            let row = table.accuracy.get(guess);
            columns
                .iter()
                .map(|category| {
                    let weight = row.and_then(|r| r.get(category)).copied().unwrap_or(0.0);
                    if count == 0 {
                        0.0
                    } else {
                        weight / count as f64
                    }
                })
                .collect()
        })
        .collect();

    RatioMatrix {
        rows,
        columns,
        values,
    }
}

/// Guess counts laid out over the full vocabulary, zero-filled.
pub fn counts_by_vocabulary(table: &AccuracyTable, vocabulary: &Vocabulary) -> Vec<(String, f64)> {
    vocabulary
        .labels()
        .iter()
        .map(|label| {
            let count = table.counts.get(label).copied().unwrap_or(0);
            (label.clone(), count as f64)
        })
        .collect()
}

/// The label picked most often, ties broken alphabetically.
pub fn most_common_guess(counts: &BTreeMap<String, usize>) -> Option<(&str, usize)> {
    counts
        .iter()
        .max_by(|a, b| a.1.cmp(b.1).then_with(|| b.0.cmp(a.0)))
        .map(|(label, count)| (label.as_str(), *count))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::GuessRecord;

    fn guesses(labels: &[&str]) -> Vec<GuessRecord> {
        labels
            .iter()
            .enumerate()
            .map(|(i, label)| GuessRecord::new(i, *label))
            .collect()
    }

    fn scenario_truth() -> Vec<GroundTruthRecord> {
        vec![
            GroundTruthRecord::new([("INTJ", 2.0)]),
            GroundTruthRecord::new([("INFP", 1.0), ("ENFP", 1.0)]),
        ]
    }

    #[test]
    fn test_aggregate_scenario() {
        let sources = vec![GuessSource::new("gpt-4_brief", guesses(&["INTJ", "INTJ"]))];
        let tables = aggregate(&sources, &scenario_truth(), &Vocabulary::mbti()).unwrap();

        let table = &tables["gpt-4_brief"];
        assert_eq!(table.counts.get("INTJ"), Some(&2));

        let expected: BTreeMap<String, f64> = [("INTJ", 2.0), ("INFP", 1.0), ("ENFP", 1.0)]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        assert_eq!(table.accuracy["INTJ"], expected);
    }

    #[test]
    fn test_invalid_label_contributes_nothing() {
        let mut records = guesses(&["XXXX", "INFP"]);
        records.push(GuessRecord {
            guess: None,
            ..GuessRecord::new(1, "")
        });
        let sources = vec![GuessSource::new("m", records)];

        let tables = aggregate(&sources, &scenario_truth(), &Vocabulary::mbti()).unwrap();
        let table = &tables["m"];

        assert!(!table.counts.contains_key("XXXX"));
        assert!(!table.accuracy.contains_key("XXXX"));
        assert_eq!(table.total_count(), 1);
        assert_eq!(table.total_weight(), 2.0);
    }

    #[test]
    fn test_empty_guesses_give_empty_table() {
        let sources = vec![GuessSource::new("m", Vec::new())];
        let tables = aggregate(&sources, &scenario_truth(), &Vocabulary::mbti()).unwrap();

        assert!(tables["m"].accuracy.is_empty());
        assert!(tables["m"].counts.is_empty());
    }

    #[test]
    fn test_longer_guess_source_is_alignment_error() {
        let sources = vec![GuessSource::new("m", guesses(&["INTJ", "INTJ", "XXXX"]))];
        let err = aggregate(&sources, &scenario_truth(), &Vocabulary::mbti()).unwrap_err();

        match err {
            StatsError::Alignment {
                name,
                index,
                ground_truth_len,
            } => {
                assert_eq!(name, "m");
                assert_eq!(index, 2);
                assert_eq!(ground_truth_len, 2);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_duplicate_source_names_rejected() {
        let sources = vec![
            GuessSource::new("m", guesses(&["INTJ"])),
            GuessSource::new("m", guesses(&["INFP"])),
        ];
        let err = aggregate(&sources, &scenario_truth(), &Vocabulary::mbti()).unwrap_err();
        assert!(matches!(err, StatsError::DuplicateSource { .. }));
    }

    #[test]
    fn test_weight_and_count_conservation() {
        let truth = vec![
            GroundTruthRecord::new([("INTJ", 2.0), ("ENTP", 0.5)]),
            GroundTruthRecord::new([("INFP", 1.0)]),
            GroundTruthRecord::new([("ESFJ", 3.0), ("ISFJ", 1.25)]),
            GroundTruthRecord::new([("ENFP", 4.0)]),
        ];
        let labels = ["INTJ", "bogus", "ESFJ", "INTJ"];
        let sources = vec![GuessSource::new("m", guesses(&labels))];
        let vocab = Vocabulary::mbti();

        let tables = aggregate(&sources, &truth, &vocab).unwrap();
        let table = &tables["m"];

        let expected_weight: f64 = labels
            .iter()
            .zip(&truth)
            .filter(|(label, _)| vocab.contains(label))
            .map(|(_, record)| record.total_weight())
            .sum();
        assert!((table.total_weight() - expected_weight).abs() < 1e-9);
        assert_eq!(table.counts.get("INTJ"), Some(&2));
        assert_eq!(table.counts.get("ESFJ"), Some(&1));
    }

    #[test]
    fn test_order_independence() {
        let truth = vec![
            GroundTruthRecord::new([("INTJ", 0.1), ("ENTP", 0.7)]),
            GroundTruthRecord::new([("INTJ", 0.2)]),
            GroundTruthRecord::new([("ENTP", 0.3), ("INTJ", 0.9)]),
        ];
        let forward = guesses(&["INTJ", "INTJ", "ENTP"]);
        let mut reversed = forward.clone();
        reversed.reverse();

        let vocab = Vocabulary::mbti();
        let a = aggregate_source(&GuessSource::new("m", forward), &truth, &vocab).unwrap();
        let b = aggregate_source(&GuessSource::new("m", reversed), &truth, &vocab).unwrap();

        assert_eq!(a.counts, b.counts);
        for (guess, row) in &a.accuracy {
            for (category, weight) in row {
                assert!((b.accuracy[guess][category] - weight).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn test_alternate_vocabulary() {
        let truth = vec![
            GroundTruthRecord::new([("Leo", 1.0)]),
            GroundTruthRecord::new([("Aries", 1.0)]),
        ];
        let vocab = Vocabulary::new(["Aries", "Leo"]);
        let sources = vec![GuessSource::new("zodiac", guesses(&["Leo", "INTJ"]))];

        let tables = aggregate(&sources, &truth, &vocab).unwrap();
        assert_eq!(tables["zodiac"].total_count(), 1);
        assert_eq!(tables["zodiac"].accuracy["Leo"]["Leo"], 1.0);
    }

    #[test]
    fn test_ground_truth_totals() {
        let totals = ground_truth_totals(&scenario_truth());
        assert_eq!(totals.get("INTJ"), Some(&2.0));
        assert_eq!(totals.get("INFP"), Some(&1.0));
        assert_eq!(totals.len(), 3);
    }

    #[test]
    fn test_ratio_matrix() {
        let vocab = Vocabulary::new(["ENFP", "INFP", "INTJ"]);
        let sources = vec![GuessSource::new("m", guesses(&["INTJ", "INTJ"]))];
        let tables = aggregate(&sources, &scenario_truth(), &vocab).unwrap();

        let matrix = ratio_matrix(&tables["m"], &vocab);
        assert_eq!(matrix.rows, vec!["INTJ"]);
        assert_eq!(matrix.columns, vec!["ENFP", "INFP", "INTJ"]);
        assert_eq!(matrix.values, vec![vec![0.5, 0.5, 1.0]]);
    }

    #[test]
    fn test_counts_by_vocabulary_zero_fills() {
        let vocab = Vocabulary::new(["A", "B"]);
        let truth = vec![GroundTruthRecord::new([("A", 1.0)])];
        let table =
            aggregate_source(&GuessSource::new("m", guesses(&["B"])), &truth, &vocab).unwrap();

        assert_eq!(
            counts_by_vocabulary(&table, &vocab),
            vec![("A".to_string(), 0.0), ("B".to_string(), 1.0)]
        );
    }

    #[test]
    fn test_most_common_guess() {
        let truth = vec![GroundTruthRecord::default(); 3];
        let vocab = Vocabulary::mbti();
        let table = aggregate_source(
            &GuessSource::new("m", guesses(&["INTJ", "ENFP", "ENFP"])),
            &truth,
            &vocab,
        )
        .unwrap();

        assert_eq!(most_common_guess(&table.counts), Some(("ENFP", 2)));
        assert_eq!(most_common_guess(&BTreeMap::new()), None);
    }
}
