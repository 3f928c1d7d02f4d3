//! Error types for the BDL client library.

use thiserror::Error;

/// The main error type for all BDL client operations.
///
/// A call through [`BdlClient::get`](crate::BdlClient::get) can only fail in two
/// ways that callers need to tell apart: the upstream kept throttling us
/// ([`BdlError::RetriesExhausted`]) or the transport failed for some other
/// reason ([`BdlError::Transport`]).
#[derive(Error, Debug)]
pub enum BdlError {
    /// The transport failed with a non-throttling error
    #[error("transport failure: {0}")]
    Transport(#[from] FetchError),

    /// Admission or throttling retries were used up
    #[error("resource unavailable after {attempts} attempts")]
    RetriesExhausted {
        /// Number of attempts made before giving up
        attempts: u32,
    },

    /// Local file system error (cache directory, state file)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parsing error
    #[error("URL parsing error: {0}")]
    Url(#[from] url::ParseError),

    /// Response body did not have the expected shape
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl BdlError {
    /// Check if this error means the upstream kept throttling us.
    pub fn is_retries_exhausted(&self) -> bool {
        matches!(self, BdlError::RetriesExhausted { .. })
    }

    /// Check if this error came from the transport.
    pub fn is_transport(&self) -> bool {
        matches!(self, BdlError::Transport(_))
    }
}

/// Classified outcome of a failed fetch.
///
/// [`Fetcher`](crate::fetch::Fetcher) implementations report failures through this
/// type so the request loop can switch on the class instead of inspecting
/// status codes itself.
#[derive(Error, Debug)]
pub enum FetchError {
    /// Upstream answered with HTTP 429 Too Many Requests
    #[error("upstream throttled the request (HTTP 429)")]
    Throttled,

    /// Upstream answered with a non-success status other than 429
    #[error("HTTP {status}: {body}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body, verbatim
        body: String,
    },

    /// HTTP request failed before a status was received
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest_middleware::Error),
}

impl FetchError {
    /// Check if this is a rate limit signal from upstream.
    pub fn is_throttled(&self) -> bool {
        matches!(self, FetchError::Throttled)
    }

    /// Status code of the failed response, if one was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::Throttled => Some(429),
            FetchError::Status { status, .. } => Some(*status),
            FetchError::Http(_) => None,
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        FetchError::Http(reqwest_middleware::Error::Reqwest(err))
    }
}
