//! Precision, recall and F1 over confusion counts.
//!
//! A zero denominator yields `None`. Callers must not read `None` as a score
//! of zero: it means there was no data to score.

use serde::{Deserialize, Serialize};

use super::classify::ConfusionLabel;
use super::subsets::FieldSubset;

pub fn precision(tp: usize, fp: usize) -> Option<f64> {
    ratio(tp, tp + fp)
}

pub fn recall(tp: usize, fn_: usize) -> Option<f64> {
    ratio(tp, tp + fn_)
}

pub fn f1(precision: f64, recall: f64) -> Option<f64> {
    let denom = precision + recall;
    if denom == 0.0 {
        return None;
    }
    Some(2.0 * precision * recall / denom)
}

fn ratio(num: usize, denom: usize) -> Option<f64> {
    if denom == 0 {
        return None;
    }
    Some(num as f64 / denom as f64)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionCounts {
    pub tp: usize,
    pub fp: usize,
    pub tn: usize,
    #[serde(rename = "fn")]
    pub fn_: usize,
}

impl ConfusionCounts {
    pub fn record(&mut self, label: ConfusionLabel) {
        match label {
            ConfusionLabel::TP => self.tp += 1,
            ConfusionLabel::FP => self.fp += 1,
            ConfusionLabel::TN => self.tn += 1,
            ConfusionLabel::FN => self.fn_ += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.tp + self.fp + self.tn + self.fn_
    }

    pub fn precision(&self) -> Option<f64> {
        precision(self.tp, self.fp)
    }

    pub fn recall(&self) -> Option<f64> {
        recall(self.tp, self.fn_)
    }

    /// Undefined when either precision or recall is undefined.
    pub fn f1(&self) -> Option<f64> {
        match (self.precision(), self.recall()) {
            (Some(p), Some(r)) => f1(p, r),
            _ => None,
        }
    }
}

impl FromIterator<ConfusionLabel> for ConfusionCounts {
    fn from_iter<I: IntoIterator<Item = ConfusionLabel>>(iter: I) -> Self {
        let mut counts = ConfusionCounts::default();
        for label in iter {
            counts.record(label);
        }
        counts
    }
}

/// Aggregate scores for one field subset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubsetMetrics {
    pub fields: FieldSubset,
    #[serde(flatten)]
    pub counts: ConfusionCounts,
    pub precision: Option<f64>,
    pub recall: Option<f64>,
    pub f1: Option<f64>,
}

impl SubsetMetrics {
    pub fn from_counts(fields: FieldSubset, counts: ConfusionCounts) -> Self {
        Self {
            fields,
            precision: counts.precision(),
            recall: counts.recall(),
            f1: counts.f1(),
            counts,
        }
    }

    pub fn name(&self) -> String {
        self.fields.canonical_name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_accumulate_from_labels() {
        let counts: ConfusionCounts = [
            ConfusionLabel::TP,
            ConfusionLabel::TP,
            ConfusionLabel::FN,
            ConfusionLabel::FP,
            ConfusionLabel::TN,
        ]
        .into_iter()
        .collect();
        assert_eq!(
            counts,
            ConfusionCounts {
                tp: 2,
                fp: 1,
                tn: 1,
                fn_: 1
            }
        );
        assert_eq!(counts.total(), 5);
    }

    #[test]
    fn serialized_counts_use_short_keys_and_null_for_undefined() {
        let subset = FieldSubset::single("keyword").unwrap();
        let metrics = SubsetMetrics::from_counts(subset, ConfusionCounts::default());
        let json = serde_json::to_value(&metrics).unwrap();
        assert_eq!(json["fn"], 0);
        assert!(json["precision"].is_null());
        assert!(json["f1"].is_null());
        assert_eq!(json["fields"][0], "keyword");
    }
}
