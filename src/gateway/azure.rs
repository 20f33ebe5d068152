//! Azure Cognitive Search adapter: index setup, document upload and queries.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::Deserialize;
use serde_json::{Map, Value};
use uuid::Uuid;

use super::error::{ErrorContext, SearchError};
use super::types::*;

// =============================================================================
// TRAIT
// =============================================================================

/// Trait for search backends.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, req: &SearchRequest) -> Result<SearchResponse, SearchError>;
}

// =============================================================================
// AZURE ADAPTER
// =============================================================================

/// Maximum allowed response body length (4MB).
const MAX_RESPONSE_LEN: usize = 4 * 1_024 * 1_024;

/// The service accepts at most this many documents per indexing request.
pub const MAX_UPLOAD_BATCH: usize = 1_000;

pub const DEFAULT_API_VERSION: &str = "2020-06-30";

/// Azure Cognitive Search REST adapter bound to one index.
#[derive(Debug, Clone)]
pub struct AzureSearchAdapter {
    client: reqwest::Client,
    endpoint: String,
    index_name: String,
    api_version: String,
    timeout: Duration,
}

impl AzureSearchAdapter {
    /// Endpoint for a named search service.
    pub fn service_endpoint(service_name: &str) -> String {
        format!("https://{service_name}.search.windows.net")
    }

    /// Create with custom configuration.
    pub fn with_config(
        api_key: &str,
        endpoint: impl Into<String>,
        index_name: impl Into<String>,
        api_version: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, SearchError> {
        let endpoint = endpoint.into().trim_end_matches('/').to_string();
        let index_name = index_name.into();
        if index_name.trim().is_empty() {
            return Err(SearchError::config("index name must be non-empty"));
        }
        if api_key.trim().is_empty() {
            return Err(SearchError::config("search api key must be non-empty"));
        }

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let key_value = HeaderValue::from_str(api_key)
            .map_err(|_| SearchError::config("Invalid API key format"))?;
        headers.insert("api-key", key_value);

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .gzip(true)
            .build()
            .map_err(|e| SearchError::config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint,
            index_name,
            api_version: api_version.into(),
            timeout,
        })
    }

    pub fn index_name(&self) -> &str {
        &self.index_name
    }

    fn index_url(&self) -> String {
        format!(
            "{}/indexes/{}?api-version={}",
            self.endpoint, self.index_name, self.api_version
        )
    }

    fn docs_url(&self, action: &str) -> String {
        format!(
            "{}/indexes/{}/docs/{}?api-version={}",
            self.endpoint, self.index_name, action, self.api_version
        )
    }

    /// Extract request ID from response headers.
    fn extract_request_id(headers: &HeaderMap) -> Option<String> {
        headers
            .get("request-id")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string())
    }

    fn map_send_error(&self, err: reqwest::Error) -> SearchError {
        if err.is_timeout() {
            SearchError::Timeout(self.timeout, None)
        } else {
            SearchError::Http(err)
        }
    }

    /// Create (or replace) the index from a schema document.
    ///
    /// The schema's `name` is overwritten with this adapter's index name.
    pub async fn create_index(&self, schema: &Value) -> Result<(), SearchError> {
        let mut body = match schema {
            Value::Object(map) => map.clone(),
            _ => return Err(SearchError::invalid_request("index schema must be a JSON object")),
        };
        body.insert("name".to_string(), Value::String(self.index_name.clone()));

        let response = self
            .client
            .put(self.index_url())
            .json(&body)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;
        let raw = read_body(response).await?;
        if !raw.status.is_success() {
            return Err(raw.into_error());
        }
        tracing::info!(index = %self.index_name, "index created");
        Ok(())
    }

    /// Upload one document per name, replicated across every field variant.
    pub async fn upload_documents(
        &self,
        names: &[String],
        fields: &[String],
    ) -> Result<UploadSummary, SearchError> {
        let mut summary = UploadSummary::default();
        for batch in names.chunks(MAX_UPLOAD_BATCH) {
            let documents: Vec<Value> = batch
                .iter()
                .map(|name| Value::Object(build_document(name, fields)))
                .collect();
            let payload = serde_json::json!({ "value": documents });

            let response = self
                .client
                .post(self.docs_url("index"))
                .json(&payload)
                .send()
                .await
                .map_err(|e| self.map_send_error(e))?;
            let raw = read_body(response).await?;
            // 207 signals partial success; per-document status is in the body.
            if !raw.status.is_success() {
                return Err(raw.into_error());
            }
            let parsed: IndexApiResponse = serde_json::from_str(&raw.body)
                .map_err(|e| SearchError::service(format!("Invalid JSON: {e}"), false))?;
            let failed = parsed.value.iter().filter(|r| !r.status).count();
            if failed > 0 {
                tracing::warn!(failed, batch = batch.len(), "documents rejected by index");
            }
            summary.documents += batch.len();
            summary.batches += 1;
            summary.failed += failed;
        }
        Ok(summary)
    }
}

/// Build the upload payload for one name.
pub fn build_document(name: &str, fields: &[String]) -> Map<String, Value> {
    let mut doc = Map::new();
    doc.insert("@search.action".to_string(), Value::from("upload"));
    doc.insert("id".to_string(), Value::from(Uuid::new_v4().to_string()));
    doc.insert(STANDARD_FIELD.to_string(), Value::from(name));
    for field in fields {
        doc.insert(field.clone(), Value::from(name));
    }
    doc
}

// =============================================================================
// API TYPES
// =============================================================================

#[derive(serde::Serialize)]
struct SearchApiRequest<'a> {
    #[serde(rename = "queryType")]
    query_type: &'static str,
    search: &'a str,
    #[serde(rename = "searchFields")]
    search_fields: String,
}

#[derive(Deserialize)]
struct SearchApiResponse {
    #[serde(default)]
    value: Vec<ApiHit>,
}

#[derive(Deserialize)]
struct ApiHit {
    #[serde(rename = "@search.score")]
    score: f64,
    #[serde(rename = "standard_lucene")]
    name: Option<String>,
}

#[derive(Deserialize)]
struct IndexApiResponse {
    #[serde(default)]
    value: Vec<IndexResult>,
}

#[derive(Deserialize)]
struct IndexResult {
    #[serde(default)]
    status: bool,
}

#[derive(Deserialize)]
struct ApiErrorEnvelope {
    error: Option<ApiError>,
}

#[derive(Deserialize)]
struct ApiError {
    code: Option<String>,
    message: Option<String>,
}

struct RawResponse {
    status: reqwest::StatusCode,
    request_id: Option<String>,
    body: String,
}

impl RawResponse {
    fn into_error(self) -> SearchError {
        let mut ctx = ErrorContext::new().with_status(self.status.as_u16());
        if let Some(id) = &self.request_id {
            ctx = ctx.with_request_id(id);
        }

        let mut message = format!("HTTP {}", self.status.as_u16());
        if let Ok(parsed) = serde_json::from_str::<ApiErrorEnvelope>(&self.body) {
            if let Some(error) = parsed.error {
                if let Some(code) = error.code {
                    ctx = ctx.with_code(code);
                }
                if let Some(m) = error.message {
                    message = m;
                }
            }
        }
        SearchError::from_status(self.status.as_u16(), message, ctx)
    }
}

/// Stream the body to enforce the size limit.
async fn read_body(mut response: reqwest::Response) -> Result<RawResponse, SearchError> {
    let status = response.status();
    let request_id = AzureSearchAdapter::extract_request_id(response.headers());

    let mut bytes = Vec::new();
    while let Some(chunk) = response.chunk().await? {
        let new_len = bytes.len() + chunk.len();
        if new_len > MAX_RESPONSE_LEN {
            return Err(SearchError::service(
                format!("Response too large: {new_len} bytes"),
                false,
            ));
        }
        bytes.extend_from_slice(&chunk);
    }

    Ok(RawResponse {
        status,
        request_id,
        body: String::from_utf8_lossy(&bytes).to_string(),
    })
}

// =============================================================================
// SEARCH PROVIDER IMPL
// =============================================================================

#[async_trait]
impl SearchProvider for AzureSearchAdapter {
    async fn search(&self, req: &SearchRequest) -> Result<SearchResponse, SearchError> {
        if req.fields.is_empty() {
            return Err(SearchError::invalid_request("at least one search field is required"));
        }

        let start = Instant::now();
        let api_req = SearchApiRequest {
            query_type: "full",
            search: &req.query,
            search_fields: req.fields.join(","),
        };

        let response = self
            .client
            .post(self.docs_url("search"))
            .json(&api_req)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;
        let raw = read_body(response).await?;
        if !raw.status.is_success() {
            return Err(raw.into_error());
        }

        let parsed: SearchApiResponse = serde_json::from_str(&raw.body)
            .map_err(|e| SearchError::service(format!("Invalid JSON: {e}"), false))?;

        // A hit we cannot name must fail the query, never degrade to NotFound.
        let hits = parsed
            .value
            .into_iter()
            .enumerate()
            .map(|(idx, hit)| match hit.name {
                Some(name) => Ok(SearchHit::new(name, hit.score)),
                None => Err(SearchError::service(
                    format!("search hit {idx} has no {STANDARD_FIELD} value"),
                    false,
                )),
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(SearchResponse {
            hits,
            latency: start.elapsed(),
            request_id: raw.request_id,
        })
    }
}
