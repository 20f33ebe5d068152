//! Field subsets and the experiment matrix.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Joins field identifiers into a subset's canonical name.
pub const SUBSET_DELIMITER: char = '-';

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SubsetError {
    #[error("field subset must contain at least one field")]
    Empty,
    #[error("duplicate field '{0}'")]
    DuplicateField(String),
    #[error("invalid field identifier '{0}'")]
    InvalidField(String),
}

/// A non-empty set of search fields queried together, in field-list order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct FieldSubset {
    fields: Vec<String>,
}

impl FieldSubset {
    pub fn new(fields: Vec<String>) -> Result<Self, SubsetError> {
        if fields.is_empty() {
            return Err(SubsetError::Empty);
        }
        let mut seen = HashSet::new();
        for field in &fields {
            validate_field(field)?;
            if !seen.insert(field.as_str()) {
                return Err(SubsetError::DuplicateField(field.clone()));
            }
        }
        Ok(Self { fields })
    }

    pub fn single(field: impl Into<String>) -> Result<Self, SubsetError> {
        Self::new(vec![field.into()])
    }

    /// Parse a canonical name such as `phonetic-ngram`.
    pub fn parse(name: &str) -> Result<Self, SubsetError> {
        Self::new(name.split(SUBSET_DELIMITER).map(str::to_string).collect())
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Fields joined by [`SUBSET_DELIMITER`]; used as the report key.
    pub fn canonical_name(&self) -> String {
        let mut out = String::new();
        for (idx, field) in self.fields.iter().enumerate() {
            if idx > 0 {
                out.push(SUBSET_DELIMITER);
            }
            out.push_str(field);
        }
        out
    }
}

impl fmt::Display for FieldSubset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical_name())
    }
}

impl TryFrom<Vec<String>> for FieldSubset {
    type Error = SubsetError;

    fn try_from(value: Vec<String>) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<FieldSubset> for Vec<String> {
    fn from(value: FieldSubset) -> Self {
        value.fields
    }
}

/// Field identifiers end up in file names and in the delimiter-joined key, so
/// they are restricted to ASCII alphanumerics and `_`.
fn validate_field(field: &str) -> Result<(), SubsetError> {
    let ok = !field.is_empty()
        && field
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_');
    if ok {
        Ok(())
    } else {
        Err(SubsetError::InvalidField(field.to_string()))
    }
}

/// Every non-empty subset of `fields`: size 1 first, then size 2, and so on.
///
/// Within a size, subsets come in lexicographic order of their indices into
/// `fields`, and each subset keeps the relative order of `fields`. For n fields
/// this yields 2^n - 1 subsets.
pub fn all_subsets(fields: &[String]) -> Result<Vec<FieldSubset>, SubsetError> {
    let mut seen = HashSet::new();
    for field in fields {
        validate_field(field)?;
        if !seen.insert(field.as_str()) {
            return Err(SubsetError::DuplicateField(field.clone()));
        }
    }

    let n = fields.len();
    let mut out = Vec::with_capacity((1usize << n.min(20)).saturating_sub(1));
    for size in 1..=n {
        let mut idx: Vec<usize> = (0..size).collect();
        loop {
            let subset = idx.iter().map(|&i| fields[i].clone()).collect();
            out.push(FieldSubset { fields: subset });

            // Advance to the next combination: find the rightmost index that
            // can still move right.
            let mut pos = size;
            while pos > 0 && idx[pos - 1] == n - size + pos - 1 {
                pos -= 1;
            }
            if pos == 0 {
                break;
            }
            idx[pos - 1] += 1;
            for k in pos..size {
                idx[k] = idx[k - 1] + 1;
            }
        }
    }
    Ok(out)
}

/// The subsets a run evaluates: the baseline first (when it is not already
/// one of the generated subsets), then every subset of `fields`.
pub fn experiment_plan(fields: &[String], baseline: &str) -> Result<Vec<FieldSubset>, SubsetError> {
    let mut plan = all_subsets(fields)?;
    let baseline = FieldSubset::single(baseline)?;
    if !plan.contains(&baseline) {
        plan.insert(0, baseline);
    }
    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn canonical_name_round_trips() {
        let subset = FieldSubset::new(names(&["edge_n_gram", "keyword"])).unwrap();
        assert_eq!(subset.canonical_name(), "edge_n_gram-keyword");
        assert_eq!(FieldSubset::parse("edge_n_gram-keyword").unwrap(), subset);
    }

    #[test]
    fn rejects_fields_that_would_break_the_key() {
        assert_eq!(
            FieldSubset::single("url-email"),
            Err(SubsetError::InvalidField("url-email".into()))
        );
        assert_eq!(FieldSubset::new(vec![]), Err(SubsetError::Empty));
    }

    #[test]
    fn plan_prepends_missing_baseline() {
        let plan = experiment_plan(&names(&["a", "b"]), "standard_lucene").unwrap();
        assert_eq!(plan.len(), 4);
        assert_eq!(plan[0].canonical_name(), "standard_lucene");

        let plan = experiment_plan(&names(&["a", "b"]), "a").unwrap();
        assert_eq!(plan.len(), 3);
        assert_eq!(plan[0].canonical_name(), "a");
    }
}
