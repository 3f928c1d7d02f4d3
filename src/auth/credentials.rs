//! Caller identity for quota accounting.

use secrecy::{ExposeSecret, SecretString};

/// Environment variable read by [`ApiKey::try_from_env`].
pub const API_KEY_ENV_VAR: &str = "BDL_API_KEY";

/// Ledger key under which anonymous consumption is recorded.
pub const ANONYMOUS_KEY: &str = "__anonymous__";

/// A BDL client id, sent as the `X-ClientId` header.
#[derive(Clone)]
pub struct ApiKey(SecretString);

impl ApiKey {
    /// Create a new API key.
    pub fn new(key: impl Into<String>) -> Self {
        Self(SecretString::from(key.into()))
    }

    /// Get the literal key.
    ///
    /// This method exposes the secret - use carefully.
    pub fn expose_secret(&self) -> &str {
        self.0.expose_secret()
    }

    /// Try to read the key from `BDL_API_KEY`.
    ///
    /// Returns `None` if the variable is unset or blank.
    pub fn try_from_env() -> Option<Self> {
        Self::try_from_env_var(API_KEY_ENV_VAR)
    }

    /// Try to read the key from a custom environment variable.
    pub fn try_from_env_var(var: &str) -> Option<Self> {
        let key = std::env::var(var).ok()?;
        if key.trim().is_empty() {
            return None;
        }
        Some(Self::new(key.trim()))
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ApiKey([REDACTED])")
    }
}

impl PartialEq for ApiKey {
    fn eq(&self, other: &Self) -> bool {
        self.expose_secret() == other.expose_secret()
    }
}

impl Eq for ApiKey {}

/// Who is making requests. Selects the limit profile and the ledger entry.
///
/// Every registered key has its own consumption state, but all of them share
/// the registered limits.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Identity {
    /// No client id; lowest limits
    #[default]
    Anonymous,
    /// Registered client id
    Registered(ApiKey),
}

impl Identity {
    /// Build an identity from an optional key; blank keys are anonymous.
    pub fn from_api_key(key: Option<&str>) -> Self {
        match key.map(str::trim) {
            Some(key) if !key.is_empty() => Identity::Registered(ApiKey::new(key)),
            _ => Identity::Anonymous,
        }
    }

    /// Registered identity from `BDL_API_KEY`, anonymous if unset.
    pub fn from_env() -> Self {
        ApiKey::try_from_env().map_or(Identity::Anonymous, Identity::Registered)
    }

    /// Check if this identity carries a client id.
    pub fn is_registered(&self) -> bool {
        matches!(self, Identity::Registered(_))
    }

    /// The key under which this identity's consumption is stored.
    pub fn ledger_key(&self) -> &str {
        match self {
            Identity::Anonymous => ANONYMOUS_KEY,
            Identity::Registered(key) => key.expose_secret(),
        }
    }

    /// The client id to send upstream, if any.
    pub fn api_key(&self) -> Option<&ApiKey> {
        match self {
            Identity::Anonymous => None,
            Identity::Registered(key) => Some(key),
        }
    }
}

impl From<ApiKey> for Identity {
    fn from(key: ApiKey) -> Self {
        Identity::Registered(key)
    }
}
