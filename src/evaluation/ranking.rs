//! Ordering and selection over per-subset metrics.

use std::cmp::Ordering;

use super::metrics::SubsetMetrics;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RankingError {
    #[error("baseline subset '{0}' has no report")]
    BaselineMissing(String),
    #[error("baseline subset '{0}' has an undefined F1 score")]
    BaselineUndefined(String),
}

/// Defined scores in the requested order; undefined scores always last.
fn compare_f1(a: Option<f64>, b: Option<f64>, descending: bool) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => {
            let ord = x.total_cmp(&y);
            if descending {
                ord.reverse()
            } else {
                ord
            }
        }
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Sort by F1. Undefined F1 sorts after every defined score; ties keep
/// canonical-name order.
pub fn sort_by_f1<'a, I>(metrics: I, descending: bool) -> Vec<&'a SubsetMetrics>
where
    I: IntoIterator<Item = &'a SubsetMetrics>,
{
    let mut sorted: Vec<&SubsetMetrics> = metrics.into_iter().collect();
    sorted.sort_by(|a, b| {
        compare_f1(a.f1, b.f1, descending).then_with(|| a.name().cmp(&b.name()))
    });
    sorted
}

/// Highest defined F1; ties go to the shortest canonical name, then by name.
pub fn best_subset<'a, I>(metrics: I) -> Option<&'a SubsetMetrics>
where
    I: IntoIterator<Item = &'a SubsetMetrics>,
{
    metrics
        .into_iter()
        .filter(|m| m.f1.is_some())
        .min_by(|a, b| {
            compare_f1(a.f1, b.f1, true)
                .then_with(|| a.name().len().cmp(&b.name().len()))
                .then_with(|| a.name().cmp(&b.name()))
        })
}

/// Subsets whose F1 meets or exceeds the baseline's, highest first.
///
/// The baseline itself is included. Undefined scores never qualify.
pub fn at_or_above_baseline<'a, I>(
    metrics: I,
    baseline: &str,
) -> Result<Vec<&'a SubsetMetrics>, RankingError>
where
    I: IntoIterator<Item = &'a SubsetMetrics>,
{
    let all: Vec<&SubsetMetrics> = metrics.into_iter().collect();
    let base = all
        .iter()
        .find(|m| m.name() == baseline)
        .ok_or_else(|| RankingError::BaselineMissing(baseline.to_string()))?;
    let threshold = base
        .f1
        .ok_or_else(|| RankingError::BaselineUndefined(baseline.to_string()))?;

    let kept = all
        .into_iter()
        .filter(|m| m.f1.is_some_and(|f1| f1 >= threshold));
    Ok(sort_by_f1(kept, true))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluation::metrics::ConfusionCounts;
    use crate::evaluation::subsets::FieldSubset;

    fn metrics(name: &str, tp: usize, fp: usize, fn_: usize) -> SubsetMetrics {
        SubsetMetrics::from_counts(
            FieldSubset::parse(name).unwrap(),
            ConfusionCounts {
                tp,
                fp,
                tn: 0,
                fn_,
            },
        )
    }

    #[test]
    fn undefined_scores_sort_last_in_both_directions() {
        let all = vec![metrics("a", 0, 0, 0), metrics("b", 1, 1, 0), metrics("c", 3, 0, 1)];
        let desc: Vec<String> = sort_by_f1(&all, true).iter().map(|m| m.name()).collect();
        assert_eq!(desc, vec!["c", "b", "a"]);
        let asc: Vec<String> = sort_by_f1(&all, false).iter().map(|m| m.name()).collect();
        assert_eq!(asc, vec!["b", "c", "a"]);
    }
}
