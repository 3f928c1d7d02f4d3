//! Durable multi-window quota ledger.
//!
//! The ledger records, per identity and per window, the UTC timestamps of
//! admitted requests. A request is admitted only when every window of the
//! identity's profile has headroom; then `now` is appended to all of them.
//! Expired timestamps are pruned lazily whenever an entry is read or written.
//!
//! The state file is a JSON object keyed by identity, then by window:
//!
//! ```json
//! {
//!   "__anonymous__": {
//!     "15m": ["2025-01-01T12:00:00Z"],
//!     "12h": ["2025-01-01T12:00:00Z"],
//!     "7d": ["2025-01-01T12:00:00Z"]
//!   }
//! }
//! ```
//!
//! A missing or unreadable state file starts an empty ledger, and failed saves
//! are logged and dropped. Quota tracking degrades rather than stops the client.
//!
//! Only one process may own a state file at a time; concurrent writers from
//! separate processes will lose each other's consumption.

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_with::serde_as;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::auth::Identity;
use crate::error::BdlError;
use crate::rate_limit::{
    Clock, LimitProfile, QuotaStatistics, RateLimitConfig, SystemClock, WindowStatistics,
};

type Windows = BTreeMap<String, Vec<OffsetDateTime>>;

/// Serialized form of the ledger: identity key → window name → timestamps.
#[serde_as]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LedgerState {
    #[serde_as(as = "BTreeMap<_, BTreeMap<_, Vec<Rfc3339>>>")]
    entries: BTreeMap<String, Windows>,
}

impl LedgerState {
    /// Timestamps recorded for an identity key and window.
    pub fn timestamps(&self, key: &str, window: &str) -> Option<&[OffsetDateTime]> {
        self.entries
            .get(key)
            .and_then(|windows| windows.get(window))
            .map(Vec::as_slice)
    }

    /// Identity keys with an entry.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Number of identities tracked.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if no identity has been tracked yet.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Per-identity admission ledger over the durable windows.
///
/// Loading and saving use blocking file I/O; async callers go through
/// [`AdmissionGate`](crate::rate_limit::AdmissionGate), which moves it to
/// Tokio's blocking pool.
///
/// The ledger is a plain `&mut self` structure; callers that share it between
/// tasks must serialize access to the whole ledger (see
/// [`AdmissionGate`](crate::rate_limit::AdmissionGate)), since admission is a
/// check followed by an append across several windows.
#[derive(Debug)]
pub struct QuotaLedger {
    path: PathBuf,
    state: LedgerState,
    config: RateLimitConfig,
    clock: Arc<dyn Clock>,
}

impl QuotaLedger {
    /// Create an empty ledger that persists to `path`.
    pub fn new(path: impl Into<PathBuf>, config: RateLimitConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            path: path.into(),
            state: LedgerState::default(),
            config,
            clock,
        }
    }

    /// Create a ledger with the system clock and load any saved state.
    pub fn open(path: impl Into<PathBuf>, config: RateLimitConfig) -> Self {
        Self::open_with_clock(path, config, Arc::new(SystemClock::new()))
    }

    /// Create a ledger with a custom clock and load any saved state.
    pub fn open_with_clock(
        path: impl Into<PathBuf>,
        config: RateLimitConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let mut ledger = Self::new(path, config, clock);
        ledger.load_state();
        ledger
    }

    /// Path of the state file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current in-memory state.
    pub fn state(&self) -> &LedgerState {
        &self.state
    }

    /// Configured limits.
    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Clock used for timestamps.
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Durable windows that apply to an identity.
    pub fn profile(&self, identity: &Identity) -> &LimitProfile {
        &self.config.tier(identity).profile
    }

    /// Try to admit one request for `identity`.
    ///
    /// Returns `false` if any window is full; in that case no window records
    /// the attempt. Otherwise the current time is recorded in every window.
    pub fn try_acquire(&mut self, identity: &Identity) -> bool {
        let now = self.clock.now();
        let profile = &self.config.tier(identity).profile;
        let windows = self
            .state
            .entries
            .entry(identity.ledger_key().to_owned())
            .or_default();
        reconcile(windows, profile);

        for (name, limit) in profile.windows() {
            let timestamps = windows.entry(name.to_owned()).or_default();
            limit.prune(timestamps, now);
            if timestamps.len() >= limit.permits as usize {
                tracing::debug!(
                    window = name,
                    limit = limit.permits,
                    registered = identity.is_registered(),
                    "Quota window exhausted"
                );
                return false;
            }
        }

        for (name, _) in profile.windows() {
            windows.entry(name.to_owned()).or_default().push(now);
        }
        true
    }

    /// Remaining admissions per window.
    ///
    /// Prunes expired timestamps but never records anything. An identity
    /// without an entry reports full headroom and is not added.
    pub fn statistics(&mut self, identity: &Identity) -> QuotaStatistics {
        let now = self.clock.now();
        let profile = &self.config.tier(identity).profile;
        let mut entry = self.state.entries.get_mut(identity.ledger_key());

        let windows = profile
            .windows()
            .map(|(name, limit)| {
                let used = entry
                    .as_deref_mut()
                    .and_then(|windows| windows.get_mut(name))
                    .map_or(0, |timestamps| {
                        limit.prune(timestamps, now);
                        timestamps.len() as u32
                    });
                WindowStatistics {
                    window: name.to_owned(),
                    remaining: limit.permits.saturating_sub(used),
                    limit: limit.permits,
                }
            })
            .collect();

        QuotaStatistics { windows }
    }

    /// Replace the in-memory state with the state file.
    ///
    /// A missing file yields an empty ledger silently; an unreadable or
    /// malformed one yields an empty ledger and a warning.
    pub fn load_state(&mut self) {
        self.state = match read_state(&self.path) {
            Ok(Some(state)) => state,
            Ok(None) => {
                tracing::debug!("No quota state at {}, starting empty", self.path.display());
                LedgerState::default()
            }
            Err(e) => {
                tracing::warn!(
                    "Quota state at {} is unusable, resetting: {}",
                    self.path.display(),
                    e
                );
                LedgerState::default()
            }
        };

        let now = self.clock.now();
        for (key, windows) in &mut self.state.entries {
            let profile = &self.config.tier_for_key(key).profile;
            reconcile(windows, profile);
            for (name, limit) in profile.windows() {
                let timestamps = windows.entry(name.to_owned()).or_default();
                timestamps.sort();
                limit.prune(timestamps, now);
            }
        }
    }

    /// Write the ledger to the state file.
    ///
    /// Failures are logged and otherwise ignored; use [`Self::try_save_state`]
    /// to observe them.
    pub fn save_state(&self) {
        match self.try_save_state() {
            Ok(()) => tracing::debug!("Saved quota state to {}", self.path.display()),
            Err(e) => tracing::warn!(
                "Failed to save quota state to {}: {}",
                self.path.display(),
                e
            ),
        }
    }

    /// Write the ledger to the state file, reporting failures.
    ///
    /// The file is replaced atomically via a uniquely named sibling
    /// temporary file.
    pub fn try_save_state(&self) -> Result<(), BdlError> {
        write_state(&self.path, &self.state)
    }
}

/// Serialize `state` to `path` through a temporary file in the same directory.
pub(crate) fn write_state(path: &Path, state: &LedgerState) -> Result<(), BdlError> {
    let json = serde_json::to_string_pretty(state)?;

    let dir = match path.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(parent) => {
            fs::create_dir_all(parent)?;
            parent
        }
        None => Path::new("."),
    };
    let mut tmp = tempfile::Builder::new()
        .prefix(".quota-state.")
        .suffix(".tmp")
        .tempfile_in(dir)?;
    tmp.write_all(json.as_bytes())?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Read the state file; `Ok(None)` if it does not exist.
fn read_state(path: &Path) -> Result<Option<LedgerState>, BdlError> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    Ok(Some(serde_json::from_str(&content)?))
}

/// Make the window names of an entry match its profile exactly.
fn reconcile(windows: &mut Windows, profile: &LimitProfile) {
    windows.retain(|name, _| profile.contains(name));
    for (name, _) in profile.windows() {
        windows.entry(name.to_owned()).or_default();
    }
}
