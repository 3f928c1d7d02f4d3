//! HTTP transport built on `reqwest`.

use std::time::Duration;

use reqwest::StatusCode;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue, USER_AGENT};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_tracing::TracingMiddleware;

use crate::auth::Identity;
use crate::error::FetchError;
use crate::fetch::Fetcher;
use crate::fetch::endpoints::CLIENT_ID_HEADER;

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// [`Fetcher`] that performs real HTTP GETs.
///
/// Requests are traced through `reqwest-tracing`. No retry middleware is
/// installed; [`BdlClient`](crate::BdlClient) retries HTTP 429 itself.
///
/// # Example
///
/// ```rust,no_run
/// use bdl_api_client::auth::Identity;
/// use bdl_api_client::fetch::{Fetcher, HttpFetcher};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let fetcher = HttpFetcher::new();
///     let body = fetcher
///         .fetch("https://bdl.stat.gov.pl/api/v1/units?level=0&format=json", &Identity::Anonymous)
///         .await?;
///     println!("{body}");
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct HttpFetcher {
    http_client: ClientWithMiddleware,
}

impl HttpFetcher {
    /// Create a new fetcher with default settings.
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Create a new fetcher builder.
    pub fn builder() -> HttpFetcherBuilder {
        HttpFetcherBuilder::new()
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for HttpFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpFetcher").finish_non_exhaustive()
    }
}

impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str, identity: &Identity) -> Result<String, FetchError> {
        let mut request = self.http_client.get(url);
        if let Some(key) = identity.api_key() {
            request = request.header(CLIENT_ID_HEADER, key.expose_secret());
        }

        let response = request.send().await?;
        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            tracing::warn!(url, "Upstream throttled request");
            return Err(FetchError::Throttled);
        }

        let body = response.text().await?;
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }
}

/// Builder for [`HttpFetcher`].
pub struct HttpFetcherBuilder {
    user_agent: Option<String>,
    timeout: Duration,
}

impl HttpFetcherBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self {
            user_agent: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Set a custom user agent.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Set the per-request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Build the fetcher.
    pub fn build(self) -> HttpFetcher {
        // Build default headers.
        let mut headers = HeaderMap::new();
        let user_agent = self
            .user_agent
            .unwrap_or_else(|| format!("bdl-api-client/{}", env!("CARGO_PKG_VERSION")));
        let header_value = HeaderValue::from_str(&user_agent)
            .unwrap_or_else(|_| HeaderValue::from_static("bdl-api-client"));
        headers.insert(USER_AGENT, header_value);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let reqwest_client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(self.timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        let client = ClientBuilder::new(reqwest_client)
            .with(TracingMiddleware::default())
            .build();

        HttpFetcher {
            http_client: client,
        }
    }
}

impl Default for HttpFetcherBuilder {
    fn default() -> Self {
        Self::new()
    }
}
