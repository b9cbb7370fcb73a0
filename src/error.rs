//! Error types for the agent runtime.

use thiserror::Error;

/// Result type alias using our `Error` type.
pub type Result<T> = std::result::Result<T, Error>;

/// Crate-wide error taxonomy (kinds, not exhaustive type names — see each
/// variant's doc comment for how it propagates).
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid provider, unknown/mistyped config key, unknown tool name at
    /// registration, or a tool name conflicting with a system tool. Raised
    /// at construction time; never during a turn.
    #[error("configuration error: {0}")]
    Config(String),

    /// User message empty, or tool arguments failed schema validation.
    /// Surfaced to the caller; never retried.
    #[error("validation error: {0}")]
    Validation(String),

    /// A rate-limit response from a provider. Carries the `Retry-After`
    /// hint (if any) so the Retry Driver can honor it in preference to its
    /// own computed backoff.
    #[error("rate limited{}", .retry_after.map(|s| format!(", retry after {s}s")).unwrap_or_default())]
    RateLimit {
        /// Seconds to wait before retrying, if the provider supplied one.
        retry_after: Option<u64>,
    },

    /// A provider call exceeded its configured per-call timeout. Classified
    /// distinctly from a bare transport timeout so the Retry Driver can
    /// treat it as retryable.
    #[error("provider call timed out after {0}ms")]
    ApiTimeout(u64),

    /// HTTP transport failure underneath a provider call. A timed-out
    /// request is classified as [`Error::ApiTimeout`] instead, by
    /// `From<reqwest::Error>` or by the provider handler directly — this
    /// variant is whatever transport failure is left over.
    #[error("HTTP request failed: {0}")]
    Http(reqwest::Error),

    /// JSON serialization/deserialization failure.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A non-retryable provider failure (4xx other than 429, or a malformed
    /// response body).
    #[error("provider error: {0}")]
    Provider(String),

    /// Streaming/SSE parse error.
    #[error("streaming error: {0}")]
    Stream(String),

    /// A tool's body raised, or its return value was not representable.
    /// Callers of the executor see this captured in a `success=false`
    /// result, never as a propagating error.
    #[error("tool execution error: {0}")]
    Tool(String),

    /// The tool-calling loop exhausted its configured iteration bound.
    #[error("tool iteration cap exceeded after {0} iterations")]
    IterationCapExceeded(u32),

    /// The caller cancelled the turn, or a deadline elapsed.
    #[error("operation cancelled")]
    Cancelled,

    /// Top-level failure of a `chat()` turn: wraps whatever error the
    /// provider handler produced so callers see one typed error shape
    /// regardless of cause.
    #[error("chat failed: {source}")]
    ChatException {
        #[source]
        source: Box<Error>,
    },

    /// Catch-all for errors that don't fit a more specific kind.
    #[error("{0}")]
    Other(String),
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Error::ApiTimeout(0)
        } else {
            Error::Http(e)
        }
    }
}

impl Error {
    /// Classifies a failed request, attributing a timeout to the caller's
    /// own elapsed clock rather than the opaque `0` a bare `From` conversion
    /// falls back to (§4.5).
    pub fn from_request(e: reqwest::Error, elapsed_ms: u64) -> Self {
        if e.is_timeout() {
            Error::ApiTimeout(elapsed_ms)
        } else {
            Error::Http(e)
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Error::Validation(msg.into())
    }

    pub fn rate_limit(retry_after: Option<u64>) -> Self {
        Error::RateLimit { retry_after }
    }

    pub fn api_timeout(elapsed_ms: u64) -> Self {
        Error::ApiTimeout(elapsed_ms)
    }

    pub fn provider(msg: impl Into<String>) -> Self {
        Error::Provider(msg.into())
    }

    pub fn stream(msg: impl Into<String>) -> Self {
        Error::Stream(msg.into())
    }

    pub fn tool(msg: impl Into<String>) -> Self {
        Error::Tool(msg.into())
    }

    pub fn other(msg: impl Into<String>) -> Self {
        Error::Other(msg.into())
    }

    /// Wrap `self` as the cause of a `ChatException`, per the Agent
    /// Orchestrator's failure policy: every non-tool error that escapes a
    /// provider handler is surfaced to the `chat()` caller through this one
    /// shape.
    pub fn into_chat_exception(self) -> Self {
        match self {
            already @ Error::ChatException { .. } => already,
            other => Error::ChatException {
                source: Box::new(other),
            },
        }
    }

    /// Whether the Retry Driver should retry this error at all (transient
    /// provider failures only: rate limits, timeouts, raw transport errors).
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::RateLimit { .. } | Error::ApiTimeout(_) | Error::Http(_)
        )
    }

    /// `Retry-After` hint carried by a rate-limit error, if any.
    pub fn retry_after(&self) -> Option<u64> {
        match self {
            Error::RateLimit { retry_after } => *retry_after,
            _ => None,
        }
    }
}
