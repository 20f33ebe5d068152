//! Recompute per-subset metrics from persisted reports.

use std::collections::BTreeMap;

use super::metrics::SubsetMetrics;
use super::store::{ReportStore, StoreError};

/// Metrics for every completed report, keyed by canonical subset name.
///
/// Empty reports produce undefined scores rather than an error.
pub fn read_all_metrics(store: &ReportStore) -> Result<BTreeMap<String, SubsetMetrics>, StoreError> {
    let mut out = BTreeMap::new();
    for subset in store.completed_subsets()? {
        let report = store.read(&subset)?;
        let metrics = SubsetMetrics::from_counts(subset, report.counts());
        out.insert(metrics.name(), metrics);
    }
    tracing::debug!(subsets = out.len(), "metrics regenerated from reports");
    Ok(out)
}
