//! Core types for the search gateway.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Canonical value meaning "no match was returned for this query".
pub const NOT_FOUND: &str = "NOT_FOUND";

/// Field that every uploaded document carries with the default analyzer.
/// The returned name is always read from this field.
pub const STANDARD_FIELD: &str = "standard_lucene";

// =============================================================================
// ATTRIBUTION
// =============================================================================

/// Attribution for usage accounting and debugging.
#[derive(Debug, Clone, Copy, Default)]
pub struct Attribution {
    /// Run this request belongs to (if any).
    pub run_id: Option<Uuid>,
    /// Which code path made this call, e.g. "runner::query".
    pub caller: &'static str,
}

impl Attribution {
    pub fn new(caller: &'static str) -> Self {
        Self {
            caller,
            ..Default::default()
        }
    }

    pub fn with_run(mut self, run_id: Uuid) -> Self {
        self.run_id = Some(run_id);
        self
    }
}

// =============================================================================
// SEARCH TYPES
// =============================================================================

/// Result of one query against one field subset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SearchOutcome {
    Found(String),
    NotFound,
}

impl SearchOutcome {
    pub fn as_str(&self) -> &str {
        match self {
            SearchOutcome::Found(name) => name,
            SearchOutcome::NotFound => NOT_FOUND,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, SearchOutcome::Found(_))
    }
}

impl From<String> for SearchOutcome {
    fn from(value: String) -> Self {
        if value == NOT_FOUND {
            SearchOutcome::NotFound
        } else {
            SearchOutcome::Found(value)
        }
    }
}

impl From<SearchOutcome> for String {
    fn from(value: SearchOutcome) -> Self {
        match value {
            SearchOutcome::Found(name) => name,
            SearchOutcome::NotFound => NOT_FOUND.to_string(),
        }
    }
}

impl fmt::Display for SearchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One scored hit from the service.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub name: String,
    pub score: f64,
}

impl SearchHit {
    pub fn new(name: impl Into<String>, score: f64) -> Self {
        Self {
            name: name.into(),
            score,
        }
    }
}

/// Pick the highest-scored hit.
///
/// A hit replaces the current best only when its score is strictly greater, so
/// the first hit seen at the maximum score wins. Hits with a non-positive score
/// never match.
pub fn select_top_hit(hits: &[SearchHit]) -> SearchOutcome {
    let mut best_score = 0.0;
    let mut best: Option<&SearchHit> = None;
    for hit in hits {
        if hit.score > best_score {
            best_score = hit.score;
            best = Some(hit);
        }
    }
    match best {
        Some(hit) => SearchOutcome::Found(hit.name.clone()),
        None => SearchOutcome::NotFound,
    }
}

/// Request to query the index.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub query: String,
    pub fields: Vec<String>,
    pub attribution: Attribution,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>, fields: Vec<String>, attribution: Attribution) -> Self {
        Self {
            query: query.into(),
            fields,
            attribution,
        }
    }
}

/// Response from a query, before top-hit selection.
#[derive(Debug, Clone)]
pub struct SearchResponse {
    pub hits: Vec<SearchHit>,
    pub latency: Duration,
    pub request_id: Option<String>,
}

impl SearchResponse {
    pub fn outcome(&self) -> SearchOutcome {
        select_top_hit(&self.hits)
    }
}

/// Summary of a document upload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UploadSummary {
    pub documents: usize,
    pub batches: usize,
    pub failed: usize,
}
