//! Experiment runner: every field subset against every misspelled query.

use std::time::Instant;

use serde::Serialize;

use super::classify::{classify, ClassificationError};
use super::store::{ReportRow, ReportStore, StoreError, SubsetResultReport};
use super::subsets::FieldSubset;
use crate::dataset::NameDataset;
use crate::gateway::{SearchError, SearchGateway};

#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("search failed for query {index} ('{query}') on subset '{subset}': {source}")]
    Search {
        subset: String,
        index: usize,
        query: String,
        #[source]
        source: SearchError,
    },
    #[error(transparent)]
    Classification(#[from] ClassificationError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub subsets_total: usize,
    pub subsets_evaluated: usize,
    pub subsets_skipped: usize,
    pub queries_issued: usize,
}

pub struct ExperimentRunner<'a> {
    store: &'a ReportStore,
}

impl<'a> ExperimentRunner<'a> {
    pub fn new(store: &'a ReportStore) -> Self {
        Self { store }
    }

    /// Evaluate every subset that does not already have a completed report.
    ///
    /// Subsets run strictly one after another and queries one at a time. A
    /// subset's report is persisted only after all of its queries finished.
    pub async fn run<G>(
        &self,
        dataset: &NameDataset,
        subsets: &[FieldSubset],
        gateway: &G,
    ) -> Result<RunSummary, RunError>
    where
        G: SearchGateway + ?Sized,
    {
        let _lock = self.store.lock()?;
        let mut summary = RunSummary {
            subsets_total: subsets.len(),
            ..Default::default()
        };
        tracing::info!(subsets = subsets.len(), queries = dataset.len(), "starting run");

        for (position, subset) in subsets.iter().enumerate() {
            if self.store.is_complete(subset)? {
                tracing::info!(subset = %subset, "report already complete, skipping");
                summary.subsets_skipped += 1;
                continue;
            }

            let started = Instant::now();
            let report = self.evaluate_subset(dataset, subset, gateway).await?;
            summary.queries_issued += report.rows.len();
            let marker = self.store.write(&report)?;
            summary.subsets_evaluated += 1;

            let counts = marker.counts;
            tracing::info!(
                subset = %subset,
                position = position + 1,
                total = subsets.len(),
                tp = counts.tp,
                fp = counts.fp,
                tn = counts.tn,
                fn_ = counts.fn_,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "subset evaluated"
            );
        }

        tracing::info!(
            evaluated = summary.subsets_evaluated,
            skipped = summary.subsets_skipped,
            queries = summary.queries_issued,
            "run finished"
        );
        Ok(summary)
    }

    async fn evaluate_subset<G>(
        &self,
        dataset: &NameDataset,
        subset: &FieldSubset,
        gateway: &G,
    ) -> Result<SubsetResultReport, RunError>
    where
        G: SearchGateway + ?Sized,
    {
        let mut report = SubsetResultReport::new(subset.clone());
        for (index, (expected, query)) in dataset.pairs().enumerate() {
            let outcome = gateway
                .search(query, subset)
                .await
                .map_err(|source| RunError::Search {
                    subset: subset.canonical_name(),
                    index,
                    query: query.to_string(),
                    source,
                })?;
            let retrieved = outcome.as_str();
            let result = classify(expected, retrieved)?;
            tracing::debug!(subset = %subset, index, query, retrieved, %result, "query classified");
            report.push(ReportRow {
                retrieved: retrieved.to_string(),
                expected: expected.to_string(),
                result,
            });
        }
        Ok(report)
    }
}
