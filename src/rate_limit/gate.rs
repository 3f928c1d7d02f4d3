//! Combined burst + durable admission.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::auth::Identity;
use crate::error::BdlError;
use crate::rate_limit::ledger::write_state;
use crate::rate_limit::limits::BURST_WINDOW;
use crate::rate_limit::{
    BurstLimiter, BurstSlot, Clock, QuotaLedger, QuotaStatistics, RateLimitConfig, SystemClock,
    WindowStatistics,
};

/// Single blocking admission point over every window of an identity tier.
///
/// `acquire` first waits for a one-second burst slot, then asks the quota
/// ledger. A ledger denial refunds the burst slot immediately, so denied
/// attempts never eat into the burst window.
///
/// Cloning the gate shares the underlying limiters and ledger.
#[derive(Debug, Clone)]
pub struct AdmissionGate {
    /// Durable 15m/12h/7d ledger; the whole ledger is one critical section
    ledger: Arc<Mutex<QuotaLedger>>,
    /// Anonymous one-second limiter
    anonymous_burst: Arc<BurstLimiter>,
    /// One-second limiter shared by all registered ids
    registered_burst: Arc<BurstLimiter>,
}

impl AdmissionGate {
    /// Create a gate around an existing ledger, reusing its limits and clock.
    pub fn new(ledger: QuotaLedger) -> Self {
        let clock = Arc::clone(ledger.clock());
        let config = ledger.config();
        let anonymous_burst = Arc::new(BurstLimiter::per_second(
            config.anonymous.burst,
            Arc::clone(&clock),
        ));
        let registered_burst = Arc::new(BurstLimiter::per_second(config.registered.burst, clock));

        Self {
            ledger: Arc::new(Mutex::new(ledger)),
            anonymous_burst,
            registered_burst,
        }
    }

    /// Open the ledger at `path` with the system clock.
    pub fn open(path: impl Into<PathBuf>, config: RateLimitConfig) -> Self {
        Self::open_with_clock(path, config, Arc::new(SystemClock::new()))
    }

    /// Open the ledger at `path` with a custom clock.
    pub fn open_with_clock(
        path: impl Into<PathBuf>,
        config: RateLimitConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self::new(QuotaLedger::open_with_clock(path, config, clock))
    }

    /// Open the ledger at `path` on Tokio's blocking pool.
    pub async fn load(
        path: impl Into<PathBuf>,
        config: RateLimitConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, BdlError> {
        let path = path.into();
        tokio::task::spawn_blocking(move || Self::open_with_clock(path, config, clock))
            .await
            .map_err(|e| BdlError::Io(io::Error::other(e)))
    }

    /// The burst limiter serving an identity's tier.
    pub fn burst_limiter(&self, identity: &Identity) -> &Arc<BurstLimiter> {
        if identity.is_registered() {
            &self.registered_burst
        } else {
            &self.anonymous_burst
        }
    }

    /// Wait for a burst slot, then try the quota ledger.
    ///
    /// The returned permit is granted only if every window admitted the
    /// request. Cancelling this future at any point leaves no slot held and
    /// the ledger untouched or fully updated.
    pub async fn acquire(&self, identity: &Identity) -> Permit {
        let mut slot = self.burst_limiter(identity).acquire().await;
        let admitted = self.ledger.lock().await.try_acquire(identity);

        if admitted {
            slot.commit();
            tracing::debug!(registered = identity.is_registered(), "Request admitted");
            Permit { slot: Some(slot) }
        } else {
            drop(slot);
            tracing::warn!(
                registered = identity.is_registered(),
                "Request denied by quota ledger"
            );
            Permit { slot: None }
        }
    }

    /// Remaining admissions: the burst window first, then the ledger windows.
    pub async fn statistics(&self, identity: &Identity) -> QuotaStatistics {
        let burst = self.burst_limiter(identity);
        let mut stats = self.ledger.lock().await.statistics(identity);
        stats.windows.insert(
            0,
            WindowStatistics {
                window: BURST_WINDOW.to_string(),
                remaining: burst.remaining(),
                limit: burst.max_requests(),
            },
        );
        stats
    }

    /// Persist the ledger. Failures are logged, never returned.
    ///
    /// The file is written on Tokio's blocking pool while the ledger stays
    /// locked, so saves land in call order.
    pub async fn save_state(&self) {
        let ledger = self.ledger.lock().await;
        let path = ledger.path().to_path_buf();
        let state = ledger.state().clone();

        let result = tokio::task::spawn_blocking({
            let path = path.clone();
            move || write_state(&path, &state)
        })
        .await
        .map_err(|e| BdlError::Io(io::Error::other(e)))
        .and_then(|saved| saved);
        drop(ledger);

        match result {
            Ok(()) => tracing::debug!("Saved quota state to {}", path.display()),
            Err(e) => tracing::warn!("Failed to save quota state to {}: {}", path.display(), e),
        }
    }

    /// Run a closure with exclusive access to the ledger.
    pub async fn with_ledger<R>(&self, f: impl FnOnce(&mut QuotaLedger) -> R) -> R {
        f(&mut *self.ledger.lock().await)
    }
}

/// Outcome of [`AdmissionGate::acquire`].
///
/// A granted permit owns its burst slot until released; release happens
/// exactly once, either through [`Permit::release`] or on drop. Releasing an
/// ungranted permit does nothing. Ledger consumption is permanent for the
/// window's duration and is never given back.
#[derive(Debug)]
#[must_use = "a permit holds a burst slot until released"]
pub struct Permit {
    slot: Option<BurstSlot>,
}

impl Permit {
    /// Check if the request may proceed.
    pub fn is_granted(&self) -> bool {
        self.slot.is_some()
    }

    /// Release the permit.
    pub fn release(self) {
        drop(self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rate_limit::{LimitProfile, ManualClock, TierLimits, WindowLimit};
    use std::time::Duration;
    use tempfile::TempDir;
    use time::macros::datetime;

    fn gate(dir: &TempDir, per_minute: u32) -> (AdmissionGate, ManualClock) {
        let clock = ManualClock::new(datetime!(2025-06-01 08:00 UTC));
        let config = RateLimitConfig {
            anonymous: TierLimits {
                burst: 3,
                profile: LimitProfile::new([(
                    "1m",
                    WindowLimit::new(Duration::from_secs(60), per_minute),
                )]),
            },
            ..RateLimitConfig::default()
        };
        let gate = AdmissionGate::open_with_clock(
            dir.path().join("state.json"),
            config,
            Arc::new(clock.clone()),
        );
        (gate, clock)
    }

    #[tokio::test]
    async fn test_granted_permit_holds_burst_slot() {
        let dir = TempDir::new().unwrap();
        let (gate, _clock) = gate(&dir, 10);
        let burst = Arc::clone(gate.burst_limiter(&Identity::Anonymous));

        let permit = gate.acquire(&Identity::Anonymous).await;
        assert!(permit.is_granted());
        assert_eq!(burst.held(), 1);

        permit.release();
        assert_eq!(burst.held(), 0);
        assert_eq!(burst.remaining(), 2);
    }

    #[tokio::test]
    async fn test_denied_permit_refunds_burst_slot() {
        let dir = TempDir::new().unwrap();
        let (gate, _clock) = gate(&dir, 1);
        let burst = Arc::clone(gate.burst_limiter(&Identity::Anonymous));

        gate.acquire(&Identity::Anonymous).await.release();
        let denied = gate.acquire(&Identity::Anonymous).await;

        assert!(!denied.is_granted());
        assert_eq!(burst.held(), 0);
        assert_eq!(burst.remaining(), 2);
        denied.release();
        assert_eq!(burst.remaining(), 2);
    }

    #[tokio::test]
    async fn test_statistics_include_burst_window() {
        let dir = TempDir::new().unwrap();
        let (gate, _clock) = gate(&dir, 10);

        gate.acquire(&Identity::Anonymous).await.release();

        let stats = gate.statistics(&Identity::Anonymous).await;
        assert_eq!(stats.to_string(), "Available limits: | 1s: 2/3 | 1m: 9/10");
    }

    #[tokio::test]
    async fn test_tiers_use_separate_burst_limiters() {
        let dir = TempDir::new().unwrap();
        let (gate, _clock) = gate(&dir, 10);
        let registered = Identity::from_api_key(Some("key"));

        assert!(!Arc::ptr_eq(
            gate.burst_limiter(&Identity::Anonymous),
            gate.burst_limiter(&registered)
        ));
        assert_eq!(gate.burst_limiter(&registered).max_requests(), 10);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_saves_leave_one_valid_file() {
        let dir = TempDir::new().unwrap();
        let (gate, clock) = gate(&dir, 10);
        gate.acquire(&Identity::Anonymous).await.release();

        for _ in 0..10 {
            tokio::join!(gate.save_state(), gate.save_state(), gate.save_state());
        }

        let files: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(files.len(), 1);
        let config = gate.with_ledger(|ledger| ledger.config().clone()).await;
        let reloaded = AdmissionGate::load(dir.path().join("state.json"), config, Arc::new(clock))
            .await
            .unwrap();
        let stats = reloaded.statistics(&Identity::Anonymous).await;
        assert_eq!(stats.window("1m").map(|w| w.remaining), Some(9));
    }

    #[tokio::test]
    async fn test_save_state_persists_consumption() {
        let dir = TempDir::new().unwrap();
        let (gate, clock) = gate(&dir, 1);

        gate.acquire(&Identity::Anonymous).await.release();
        gate.save_state().await;
        let config = gate.with_ledger(|ledger| ledger.config().clone()).await;

        let restarted =
            AdmissionGate::open_with_clock(dir.path().join("state.json"), config, Arc::new(clock));
        assert!(!restarted.acquire(&Identity::Anonymous).await.is_granted());
    }
}
