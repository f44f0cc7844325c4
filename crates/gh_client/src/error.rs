use http::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    /// A single 403/429; the fetcher rotates credentials and retries.
    #[error("rate limited ({status}) for {endpoint}")]
    RateLimited { status: StatusCode, endpoint: String },
    #[error("rate limit retries exhausted for {endpoint} after {attempts} attempts")]
    RateLimitExhausted { endpoint: String, attempts: u32 },
    #[error("transient failure for {endpoint}: {source}")]
    Transient {
        endpoint: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("{endpoint} not found")]
    NotFound { endpoint: String },
    #[error("unexpected status {status} for {endpoint}")]
    Status { status: StatusCode, endpoint: String },
    #[error("unexpected payload from {endpoint}: {source}")]
    Decode {
        endpoint: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid request: {0}")]
    Request(#[source] anyhow::Error),
}

impl FetchError {
    pub fn transient(endpoint: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        Self::Transient {
            endpoint: endpoint.into(),
            source: source.into(),
        }
    }

    pub fn decode(endpoint: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Decode {
            endpoint: endpoint.into(),
            source,
        }
    }

    /// Eligible for credential rotation and another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            FetchError::RateLimited { .. } | FetchError::Transient { .. }
        )
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, FetchError::NotFound { .. })
    }

    pub fn status_code(&self) -> Option<StatusCode> {
        match self {
            FetchError::RateLimited { status, .. } | FetchError::Status { status, .. } => {
                Some(*status)
            }
            FetchError::NotFound { .. } => Some(StatusCode::NOT_FOUND),
            _ => None,
        }
    }

    pub fn reason(&self) -> &'static str {
        match self {
            FetchError::RateLimited { .. } => "rate_limited",
            FetchError::RateLimitExhausted { .. } => "rate_limit_exhausted",
            FetchError::Transient { .. } => "transient",
            FetchError::NotFound { .. } => "not_found",
            FetchError::Status { .. } => "status",
            FetchError::Decode { .. } => "decode",
            FetchError::Request(_) => "request",
        }
    }
}
