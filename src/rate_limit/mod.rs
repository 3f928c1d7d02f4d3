//! Rate limiting for the BDL API.
//!
//! BDL bounds every caller over several overlapping windows at once, and the
//! long windows (12 hours, 7 days) outlive any single run of a client. Limiting
//! therefore happens in two layers:
//!
//! - **Burst limiter**: an in-memory one-second sliding window per tier
//!   ([`BurstLimiter`]). Lost on restart, which is harmless at that scale.
//! - **Quota ledger**: the 15-minute, 12-hour and 7-day windows per identity,
//!   persisted to a JSON file ([`QuotaLedger`]).
//!
//! [`AdmissionGate`] combines both into a single `acquire` that admits a
//! request only if every window has headroom.
//!
//! ## Limits
//!
//! | Window | Anonymous | Registered |
//! |--------|-----------|------------|
//! | 1s     | 5         | 10         |
//! | 15m    | 100       | 500        |
//! | 12h    | 1 000     | 5 000      |
//! | 7d     | 10 000    | 50 000     |
//!
//! ## Example
//!
//! ```rust,no_run
//! use bdl_api_client::auth::Identity;
//! use bdl_api_client::rate_limit::{AdmissionGate, RateLimitConfig};
//!
//! # async fn run() {
//! let gate = AdmissionGate::open("rate_limiter_state.json", RateLimitConfig::default());
//!
//! let permit = gate.acquire(&Identity::Anonymous).await;
//! if permit.is_granted() {
//!     // ... perform the request ...
//! }
//! permit.release();
//!
//! gate.save_state().await;
//! # }
//! ```

mod burst;
mod clock;
mod gate;
mod ledger;
mod profile;
mod statistics;

pub use burst::{BurstLimiter, BurstSlot};
pub use clock::{Clock, ManualClock, SystemClock};
#[cfg(test)]
pub(crate) use clock::TokioClock;
pub use gate::{AdmissionGate, Permit};
pub use ledger::{LedgerState, QuotaLedger};
pub use profile::{LimitProfile, WindowLimit};
pub use statistics::{QuotaStatistics, WindowStatistics};

use crate::auth::{ANONYMOUS_KEY, Identity};

/// Limits for one identity tier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierLimits {
    /// Admissions allowed per second (in-memory only).
    pub burst: u32,
    /// Durable windows.
    pub profile: LimitProfile,
}

/// Rate limiter configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Limits for anonymous callers.
    pub anonymous: TierLimits,
    /// Limits shared by every registered client id.
    pub registered: TierLimits,
}

impl RateLimitConfig {
    /// Limits that apply to an identity.
    pub fn tier(&self, identity: &Identity) -> &TierLimits {
        if identity.is_registered() {
            &self.registered
        } else {
            &self.anonymous
        }
    }

    /// Limits that apply to a ledger key.
    pub(crate) fn tier_for_key(&self, key: &str) -> &TierLimits {
        if key == ANONYMOUS_KEY {
            &self.anonymous
        } else {
            &self.registered
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            anonymous: TierLimits {
                burst: limits::anonymous::PER_SECOND,
                profile: LimitProfile::anonymous(),
            },
            registered: TierLimits {
                burst: limits::registered::PER_SECOND,
                profile: LimitProfile::registered(),
            },
        }
    }
}

/// Rate limit constants by identity tier.
pub mod limits {
    /// Anonymous limits.
    pub mod anonymous {
        /// Requests per second.
        pub const PER_SECOND: u32 = 5;
        /// Requests per 15 minutes.
        pub const PER_15_MINUTES: u32 = 100;
        /// Requests per 12 hours.
        pub const PER_12_HOURS: u32 = 1_000;
        /// Requests per 7 days.
        pub const PER_7_DAYS: u32 = 10_000;
    }

    /// Registered client id limits.
    pub mod registered {
        /// Requests per second.
        pub const PER_SECOND: u32 = 10;
        /// Requests per 15 minutes.
        pub const PER_15_MINUTES: u32 = 500;
        /// Requests per 12 hours.
        pub const PER_12_HOURS: u32 = 5_000;
        /// Requests per 7 days.
        pub const PER_7_DAYS: u32 = 50_000;
    }

    /// Name under which the burst window is reported.
    pub const BURST_WINDOW: &str = "1s";
}
