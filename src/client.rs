//! BDL REST API client.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use serde::de::DeserializeOwned;

use crate::auth::Identity;
use crate::cache::ResponseCache;
use crate::error::{BdlError, FetchError};
use crate::fetch::{BDL_BASE_URL, Fetcher, HttpFetcher, data_by_unit_url, units_url};
use crate::rate_limit::{AdmissionGate, Clock, QuotaStatistics, RateLimitConfig, SystemClock};
use crate::types::{DataRow, ListResponse, Unit, UnitData, UnitLevel, Variable};

/// Default location of the quota ledger file.
pub const DEFAULT_STATE_PATH: &str = "rate_limiter_state.json";

/// Default response cache directory.
pub const DEFAULT_CACHE_DIR: &str = "api_cache";

/// Default number of admission passes per request.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default wait before retrying a denied or throttled request.
pub const DEFAULT_BACKOFF: Duration = Duration::from_millis(1100);

/// Cached, rate-limited access to the BDL API.
///
/// Every request goes through the same steps: a cache lookup, admission by
/// the [`AdmissionGate`], the fetch itself, and on success a write to the
/// cache. Denied admissions and HTTP 429 answers are retried after a fixed
/// backoff; both share one attempt budget. Any other fetch failure is
/// returned at once.
///
/// # Example
///
/// ```rust,no_run
/// use bdl_api_client::BdlClient;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let client = BdlClient::builder().build_http().await?;
///
///     for unit in client.get_units(None, None).await? {
///         println!("{}", unit.label());
///     }
///
///     println!("{}", client.statistics().await);
///     client.save_state().await;
///     Ok(())
/// }
/// ```
///
/// A registered key raises every limit:
///
/// ```rust,no_run
/// use bdl_api_client::BdlClient;
///
/// # async fn run() -> bdl_api_client::Result<()> {
/// let client = BdlClient::builder()
///     .api_key("my-client-id")
///     .cache_dir("/var/cache/bdl")
///     .build_http()
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct BdlClient<F> {
    fetcher: F,
    gate: AdmissionGate,
    cache: ResponseCache,
    identity: Identity,
    base_url: String,
    max_attempts: u32,
    backoff: Duration,
}

impl BdlClient<HttpFetcher> {
    /// Create a new client builder.
    pub fn builder() -> BdlClientBuilder {
        BdlClientBuilder::new()
    }
}

impl<F: Fetcher> BdlClient<F> {
    /// Fetch `url`, serving it from the cache when possible.
    ///
    /// The URL is the cache key. Returns the raw response text, or
    /// [`BdlError::RetriesExhausted`] when every attempt was denied or
    /// throttled, or [`BdlError::Transport`] for any other fetch failure.
    pub async fn get(&self, url: &str) -> Result<String, BdlError> {
        if let Some(content) = self.cache.get(url).await {
            tracing::debug!(url, "Cache hit");
            return Ok(content);
        }
        tracing::debug!(url, "Cache miss");

        let mut attempt = 0;
        loop {
            attempt += 1;

            let permit = self.gate.acquire(&self.identity).await;
            if !permit.is_granted() {
                if attempt >= self.max_attempts {
                    tracing::warn!(url, attempt, "Quota exhausted, giving up");
                    return Err(BdlError::RetriesExhausted { attempts: attempt });
                }
                tracing::warn!(url, attempt, "Quota exhausted, backing off");
                tokio::time::sleep(self.backoff).await;
                continue;
            }

            let result = self.fetcher.fetch(url, &self.identity).await;
            permit.release();

            match result {
                Ok(content) => {
                    if let Err(e) = self.cache.set(url, &content).await {
                        tracing::warn!(url, error = %e, "Failed to store response in cache");
                    }
                    return Ok(content);
                }
                Err(FetchError::Throttled) => {
                    if attempt >= self.max_attempts {
                        tracing::warn!(url, attempt, "Still throttled, giving up");
                        return Err(BdlError::RetriesExhausted { attempts: attempt });
                    }
                    tracing::warn!(url, attempt, "Throttled, backing off");
                    tokio::time::sleep(self.backoff).await;
                }
                Err(e) => return Err(BdlError::Transport(e)),
            }
        }
    }

    /// List territorial units, sorted by name.
    ///
    /// With neither argument the top-level units are listed.
    pub async fn get_units(
        &self,
        parent_id: Option<&str>,
        level: Option<UnitLevel>,
    ) -> Result<Vec<Unit>, BdlError> {
        let url = units_url(&self.base_url, parent_id, level)?;
        let list: ListResponse<Unit> = self.get_json(url.as_str()).await?;

        let mut units = list.results;
        units.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(units)
    }

    /// List the units one browsing level below `unit`.
    ///
    /// Units at the lowest browsable level have no children; no request is made.
    pub async fn get_unit_children(&self, unit: &Unit) -> Result<Vec<Unit>, BdlError> {
        match unit.level.child_level() {
            Some(level) => self.get_units(Some(&unit.id), Some(level)).await,
            None => Ok(Vec::new()),
        }
    }

    /// Values of variable `var_id` for one unit, keyed by year.
    pub async fn get_data_for_unit(
        &self,
        unit_id: &str,
        var_id: &str,
        years: &[i32],
    ) -> Result<BTreeMap<i32, Decimal>, BdlError> {
        let url = data_by_unit_url(&self.base_url, unit_id, var_id, years)?;
        let data: UnitData = self.get_json(url.as_str()).await?;
        Ok(data.values_by_year())
    }

    /// Collect export rows for every variable, unit and year.
    ///
    /// Rows are grouped by variable id and ordered by unit name, then year.
    /// Years without a published value yield a row with no value. The first
    /// failing request aborts the collection.
    pub async fn collect_rows(
        &self,
        variables: &[Variable],
        units: &[Unit],
        years: &[i32],
    ) -> Result<BTreeMap<String, Vec<DataRow>>, BdlError> {
        let mut collected = BTreeMap::new();

        for variable in variables {
            let mut rows = Vec::with_capacity(units.len() * years.len());
            for unit in units {
                let values = self.get_data_for_unit(&unit.id, &variable.id, years).await?;
                rows.extend(years.iter().map(|&year| DataRow {
                    variable_name: variable.name.clone(),
                    unit_name: unit.name.clone(),
                    year,
                    value: values.get(&year).copied(),
                }));
            }
            rows.sort_by(|a, b| a.unit_name.cmp(&b.unit_name).then(a.year.cmp(&b.year)));

            tracing::debug!(var_id = %variable.id, rows = rows.len(), "Collected rows");
            collected.insert(variable.id.clone(), rows);
        }

        Ok(collected)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, BdlError> {
        let body = self.get(url).await?;
        serde_json::from_str(&body).map_err(|e| {
            BdlError::InvalidResponse(format!("Failed to parse response: {}. Body: {}", e, body))
        })
    }
}

impl<F> BdlClient<F> {
    /// Remaining quota of the current identity.
    pub async fn statistics(&self) -> QuotaStatistics {
        self.gate.statistics(&self.identity).await
    }

    /// Persist the quota ledger. Failures are logged, never returned.
    pub async fn save_state(&self) {
        self.gate.save_state().await;
    }

    /// Delete every cached response, returning how many were removed.
    pub async fn clear_cache(&self) -> Result<usize, BdlError> {
        self.cache.clear().await
    }

    /// Switch the identity used for subsequent requests.
    pub fn set_identity(&mut self, identity: Identity) {
        tracing::info!(registered = identity.is_registered(), "Identity changed");
        self.identity = identity;
    }

    /// Current identity.
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// The admission gate.
    pub fn gate(&self) -> &AdmissionGate {
        &self.gate
    }

    /// The response cache.
    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    /// The underlying fetcher.
    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// API base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

/// Builder for [`BdlClient`].
pub struct BdlClientBuilder {
    base_url: String,
    identity: Identity,
    state_path: PathBuf,
    cache_dir: PathBuf,
    max_attempts: u32,
    backoff: Duration,
    rate_limits: RateLimitConfig,
    clock: Option<Arc<dyn Clock>>,
    user_agent: Option<String>,
}

impl BdlClientBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self {
            base_url: BDL_BASE_URL.to_string(),
            identity: Identity::Anonymous,
            state_path: PathBuf::from(DEFAULT_STATE_PATH),
            cache_dir: PathBuf::from(DEFAULT_CACHE_DIR),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff: DEFAULT_BACKOFF,
            rate_limits: RateLimitConfig::default(),
            clock: None,
            user_agent: None,
        }
    }

    /// Set a custom base URL.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set the identity requests are made as.
    pub fn identity(mut self, identity: Identity) -> Self {
        self.identity = identity;
        self
    }

    /// Use a registered API key. A blank key means anonymous access.
    pub fn api_key(mut self, key: impl AsRef<str>) -> Self {
        self.identity = Identity::from_api_key(Some(key.as_ref()));
        self
    }

    /// Read the API key from `BDL_API_KEY`, falling back to anonymous access.
    pub fn api_key_from_env(mut self) -> Self {
        self.identity = Identity::from_env();
        self
    }

    /// Set the quota ledger file.
    pub fn state_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.state_path = path.into();
        self
    }

    /// Set the response cache directory.
    pub fn cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = dir.into();
        self
    }

    /// Set the number of admission passes per request (at least one).
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Set the wait between attempts.
    pub fn backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// Set the burst and window limits.
    pub fn rate_limits(mut self, config: RateLimitConfig) -> Self {
        self.rate_limits = config;
        self
    }

    /// Set the clock used by the rate limiters.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Set a custom user agent for [`build_http`](Self::build_http).
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Build the client around a custom fetcher.
    ///
    /// Loads the quota ledger and creates the cache directory.
    pub async fn build<F: Fetcher>(self, fetcher: F) -> Result<BdlClient<F>, BdlError> {
        let cache = ResponseCache::open(self.cache_dir).await?;
        let clock = self
            .clock
            .unwrap_or_else(|| Arc::new(SystemClock::new()));
        let gate = AdmissionGate::load(self.state_path, self.rate_limits, clock).await?;

        tracing::debug!(
            base_url = %self.base_url,
            registered = self.identity.is_registered(),
            "BDL client ready"
        );

        Ok(BdlClient {
            fetcher,
            gate,
            cache,
            identity: self.identity,
            base_url: self.base_url,
            max_attempts: self.max_attempts,
            backoff: self.backoff,
        })
    }

    /// Build the client with the default HTTP fetcher.
    pub async fn build_http(self) -> Result<BdlClient<HttpFetcher>, BdlError> {
        let mut fetcher = HttpFetcher::builder();
        if let Some(user_agent) = &self.user_agent {
            fetcher = fetcher.user_agent(user_agent.clone());
        }
        self.build(fetcher.build()).await
    }
}

impl Default for BdlClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
