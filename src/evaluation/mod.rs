//! Evaluation of name-search configurations.
//!
//! Each misspelled query is sent to the search gateway once per field subset,
//! the returned name is classified against the expected name (TP/FP/TN/FN),
//! and the per-subset tallies become precision, recall and F1.

pub mod classify;
pub mod metrics;
pub mod ranking;
pub mod reader;
pub mod runner;
pub mod store;
pub mod subsets;

pub use classify::{classify, ClassificationError, ConfusionLabel};
pub use metrics::{f1, precision, recall, ConfusionCounts, SubsetMetrics};
pub use ranking::{at_or_above_baseline, best_subset, sort_by_f1, RankingError};
pub use reader::read_all_metrics;
pub use runner::{ExperimentRunner, RunError, RunSummary};
pub use store::{
    CompletionMarker, ReportRow, ReportStore, RunLock, StoreError, SubsetResultReport,
};
pub use subsets::{all_subsets, experiment_plan, FieldSubset, SubsetError};
