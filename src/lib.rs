#![forbid(unsafe_code)]

//! # namematch-harness
//!
//! Measures how well a managed search index finds correctly spelled names from
//! misspelled queries, for every combination of analyzer fields.
//!
//! Each combination (field subset) is queried once per misspelled name. The
//! top-ranked result is classified against the expected name as TP/FP/TN/FN,
//! tallies are persisted per subset, and precision/recall/F1 are recomputed
//! from those reports to compare subsets against a baseline analyzer.

pub mod config;
pub mod dataset;
pub mod evaluation;
pub mod gateway;
pub mod render;
pub mod tabular;

pub use config::{ConfigError, HarnessConfig};
pub use dataset::{DatasetError, NameDataset};
pub use evaluation::{
    classify, ConfusionCounts, ConfusionLabel, ExperimentRunner, FieldSubset, ReportStore,
    RunError, RunSummary, SubsetMetrics,
};
pub use gateway::{SearchError, SearchGateway, SearchOutcome, SearchServiceGateway, NOT_FOUND};
