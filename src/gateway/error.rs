//! Error types for the search gateway.

use std::time::Duration;
use thiserror::Error;

/// Additional context from service errors for debugging.
#[derive(Debug, Clone, Default)]
pub struct ErrorContext {
    /// HTTP status code from the service.
    pub http_status: Option<u16>,
    /// Service-specific error code (e.g. "InvalidRequestParameter").
    pub service_code: Option<String>,
    /// Request ID from the service (request-id header).
    pub request_id: Option<String>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.http_status = Some(status);
        self
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.service_code = Some(code.into());
        self
    }

    pub fn with_request_id(mut self, id: impl Into<String>) -> Self {
        self.request_id = Some(id.into());
        self
    }
}

/// Errors that can occur when calling the search service.
///
/// A query that simply has no hits is not an error; it resolves to
/// [`SearchOutcome::NotFound`](super::SearchOutcome::NotFound).
#[derive(Debug, Error)]
pub enum SearchError {
    /// Throttled by the service (HTTP 429 / 503 with retry hint).
    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited {
        retry_after: Duration,
        context: Option<ErrorContext>,
    },

    /// Credentials rejected - permanent error, don't retry.
    #[error("unauthorized: {message}")]
    Unauthorized {
        message: String,
        context: Option<ErrorContext>,
    },

    /// Invalid request - permanent error, don't retry.
    #[error("invalid request: {message}")]
    InvalidRequest {
        message: String,
        context: Option<ErrorContext>,
    },

    /// Service-side error - may be retryable.
    #[error("search service error: {message}")]
    Service {
        message: String,
        retryable: bool,
        context: Option<ErrorContext>,
    },

    /// Request timed out - retryable.
    #[error("timeout after {0:?}")]
    Timeout(Duration, Option<ErrorContext>),

    /// HTTP/network error.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Configuration error (missing API key, bad endpoint, etc.).
    #[error("configuration error: {0}")]
    Config(String),
}

impl SearchError {
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
            context: None,
        }
    }

    pub fn service(message: impl Into<String>, retryable: bool) -> Self {
        Self::Service {
            message: message.into(),
            retryable,
            context: None,
        }
    }

    /// Classify a non-success HTTP status into the matching variant.
    pub fn from_status(status: u16, message: impl Into<String>, context: ErrorContext) -> Self {
        let message = message.into();
        match status {
            401 | 403 => Self::Unauthorized {
                message,
                context: Some(context),
            },
            429 => Self::RateLimited {
                retry_after: Duration::from_secs(5),
                context: Some(context),
            },
            400 | 404 | 409 | 412 => Self::InvalidRequest {
                message,
                context: Some(context),
            },
            _ => Self::Service {
                message,
                retryable: status >= 500,
                context: Some(context),
            },
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Whether this error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RateLimited { .. } => true,
            Self::Timeout(_, _) => true,
            Self::Service { retryable, .. } => *retryable,
            Self::Http(e) => e.is_timeout() || e.is_connect(),
            Self::Unauthorized { .. } => false,
            Self::InvalidRequest { .. } => false,
            Self::Config(_) => false,
        }
    }

    /// Get a short error code for logging.
    pub fn code(&self) -> &'static str {
        match self {
            Self::RateLimited { .. } => "rate_limited",
            Self::Unauthorized { .. } => "unauthorized",
            Self::InvalidRequest { .. } => "invalid_request",
            Self::Service { .. } => "service_error",
            Self::Timeout(_, _) => "timeout",
            Self::Http(_) => "http_error",
            Self::Config(_) => "config_error",
        }
    }

    /// Get the error context if available.
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            Self::RateLimited { context, .. } => context.as_ref(),
            Self::Unauthorized { context, .. } => context.as_ref(),
            Self::InvalidRequest { context, .. } => context.as_ref(),
            Self::Service { context, .. } => context.as_ref(),
            Self::Timeout(_, context) => context.as_ref(),
            Self::Http(_) => None,
            Self::Config(_) => None,
        }
    }

    /// Get the request ID if available.
    pub fn request_id(&self) -> Option<&str> {
        self.context().and_then(|c| c.request_id.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping_separates_auth_from_transient_errors() {
        let ctx = ErrorContext::new().with_status(401);
        let err = SearchError::from_status(401, "bad key", ctx);
        assert!(matches!(err, SearchError::Unauthorized { .. }));
        assert!(!err.is_retryable());

        let err = SearchError::from_status(503, "busy", ErrorContext::new());
        assert!(err.is_retryable());
        assert_eq!(err.code(), "service_error");

        let err = SearchError::from_status(400, "bad field", ErrorContext::new());
        assert!(!err.is_retryable());
        assert_eq!(err.code(), "invalid_request");
    }
}
