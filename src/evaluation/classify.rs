//! Confusion-matrix classification of a single query outcome.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::gateway::NOT_FOUND;

/// Outcome of one query measured against its expected name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConfusionLabel {
    /// A name was returned and it is the expected one.
    TP,
    /// A name was returned but it is not the expected one.
    FP,
    /// Nothing was returned and nothing was expected.
    TN,
    /// Nothing was returned but a name was expected.
    FN,
}

impl ConfusionLabel {
    pub const ALL: [ConfusionLabel; 4] = [
        ConfusionLabel::TP,
        ConfusionLabel::FP,
        ConfusionLabel::TN,
        ConfusionLabel::FN,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ConfusionLabel::TP => "TP",
            ConfusionLabel::FP => "FP",
            ConfusionLabel::TN => "TN",
            ConfusionLabel::FN => "FN",
        }
    }
}

impl fmt::Display for ConfusionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("unknown confusion label '{0}'")]
pub struct UnknownLabel(pub String);

impl FromStr for ConfusionLabel {
    type Err = UnknownLabel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "TP" => Ok(ConfusionLabel::TP),
            "FP" => Ok(ConfusionLabel::FP),
            "TN" => Ok(ConfusionLabel::TN),
            "FN" => Ok(ConfusionLabel::FN),
            other => Err(UnknownLabel(other.to_string())),
        }
    }
}

/// Raised only when the classification rules themselves are broken.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ClassificationError {
    #[error(
        "expected '{expected}' and retrieved '{retrieved}' match none of the TP/FP/TN/FN rules"
    )]
    InvariantViolation { expected: String, retrieved: String },
}

/// The expected name was found.
pub fn is_true_positive(expected: &str, retrieved: &str) -> bool {
    expected == retrieved && expected != NOT_FOUND && retrieved != NOT_FOUND
}

/// Nothing was expected and nothing was found.
pub fn is_true_negative(expected: &str, retrieved: &str) -> bool {
    expected == retrieved && expected == NOT_FOUND && retrieved == NOT_FOUND
}

/// A name was expected but the search found nothing.
pub fn is_false_negative(expected: &str, retrieved: &str) -> bool {
    expected != retrieved && expected != NOT_FOUND && retrieved == NOT_FOUND
}

/// Any disagreement that is not a miss, including a match where none was expected.
pub fn is_false_positive(expected: &str, retrieved: &str) -> bool {
    expected != retrieved
        && !is_false_negative(expected, retrieved)
        && !is_true_negative(expected, retrieved)
}

/// Assign exactly one confusion label to `(expected, retrieved)`.
pub fn classify(expected: &str, retrieved: &str) -> Result<ConfusionLabel, ClassificationError> {
    if is_true_positive(expected, retrieved) {
        return Ok(ConfusionLabel::TP);
    }
    if is_false_positive(expected, retrieved) {
        return Ok(ConfusionLabel::FP);
    }
    if is_true_negative(expected, retrieved) {
        return Ok(ConfusionLabel::TN);
    }
    if is_false_negative(expected, retrieved) {
        return Ok(ConfusionLabel::FN);
    }
    Err(ClassificationError::InvariantViolation {
        expected: expected.to_string(),
        retrieved: retrieved.to_string(),
    })
}
