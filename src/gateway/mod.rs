//! Search gateway for the managed name index.

pub mod azure;
pub mod error;
pub mod types;
pub mod usage;

use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;

use crate::evaluation::subsets::FieldSubset;
use azure::{AzureSearchAdapter, SearchProvider};
use usage::{SearchCallRecord, UsageSink as UsageSinkTrait};

pub use error::{ErrorContext, SearchError};
pub use types::*;
pub use usage::{NoopUsageSink, StderrUsageSink, UsageSink};

/// What the experiment runner needs from a search backend: the single best
/// name for a query over a field subset, or [`SearchOutcome::NotFound`].
///
/// Transport and auth failures are errors, never `NotFound`.
#[async_trait::async_trait]
pub trait SearchGateway: Send + Sync {
    async fn search(&self, query: &str, fields: &FieldSubset) -> Result<SearchOutcome, SearchError>;
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub max_retries: u32,
    pub retry_base_delay: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            retry_base_delay: Duration::from_secs(1),
        }
    }
}

pub struct SearchServiceGateway<U: UsageSinkTrait> {
    adapter: AzureSearchAdapter,
    usage_sink: Arc<U>,
    config: GatewayConfig,
    attribution: Attribution,
}

#[async_trait::async_trait]
impl<U: UsageSinkTrait> SearchGateway for SearchServiceGateway<U> {
    async fn search(&self, query: &str, fields: &FieldSubset) -> Result<SearchOutcome, SearchError> {
        let req = SearchRequest::new(query, fields.fields().to_vec(), self.attribution);
        let resp = SearchServiceGateway::search(self, req).await?;
        Ok(resp.outcome())
    }
}

impl<U: UsageSinkTrait> SearchServiceGateway<U> {
    pub fn with_config(adapter: AzureSearchAdapter, usage_sink: Arc<U>, config: GatewayConfig) -> Self {
        Self {
            adapter,
            usage_sink,
            config,
            attribution: Attribution::new("gateway::search"),
        }
    }

    pub fn with_attribution(mut self, attribution: Attribution) -> Self {
        self.attribution = attribution;
        self
    }

    pub fn adapter(&self) -> &AzureSearchAdapter {
        &self.adapter
    }

    pub async fn search(&self, req: SearchRequest) -> Result<SearchResponse, SearchError> {
        let mut last_error: Option<SearchError> = None;

        for attempt in 0..=self.config.max_retries {
            match self.adapter.search(&req).await {
                Ok(resp) => {
                    self.record_usage(&req, Some(&resp), None).await;
                    return Ok(resp);
                }
                Err(err) => {
                    self.record_usage(&req, None, Some(&err)).await;

                    if !err.is_retryable() || attempt == self.config.max_retries {
                        return Err(err);
                    }

                    let delay = backoff_delay(self.config.retry_base_delay, attempt);
                    tracing::warn!(
                        code = err.code(),
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "search failed, retrying"
                    );
                    last_error = Some(err);
                    sleep(delay).await;
                }
            }
        }

        Err(last_error.unwrap_or_else(|| SearchError::service("unknown error", false)))
    }

    async fn record_usage(
        &self,
        req: &SearchRequest,
        resp: Option<&SearchResponse>,
        error: Option<&SearchError>,
    ) {
        let mut record =
            SearchCallRecord::new("docs/search", self.adapter.index_name(), req.attribution.caller)
                .run(req.attribution.run_id);

        if let Some(resp) = resp {
            record = record
                .items(resp.hits.len())
                .latency(resp.latency.as_millis() as u64)
                .request_id(resp.request_id.clone());
        }
        if let Some(err) = error {
            record = record
                .error(err.code())
                .request_id(err.request_id().map(str::to_string));
        }

        self.usage_sink.record(record).await;
    }
}

fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let multiplier = 2u32.pow(attempt.min(5));
    base.checked_mul(multiplier).unwrap_or(Duration::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_and_caps() {
        let base = Duration::from_millis(100);
        assert_eq!(backoff_delay(base, 0), Duration::from_millis(100));
        assert_eq!(backoff_delay(base, 1), Duration::from_millis(200));
        assert_eq!(backoff_delay(base, 9), Duration::from_millis(3_200));
    }

    #[test]
    fn backoff_saturates_instead_of_overflowing() {
        let base = Duration::from_millis(u64::MAX);
        assert_eq!(backoff_delay(base, 0), base);
        assert_eq!(backoff_delay(base, 3), Duration::MAX);
    }
}
