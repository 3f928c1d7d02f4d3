//! Time sources for the rate limiters.
//!
//! All limiter state is expressed in UTC wall-clock instants so that the
//! durable ledger means the same thing after a restart.
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use bdl_api_client::rate_limit::{Clock, ManualClock};
//! use time::macros::datetime;
//!
//! let clock = ManualClock::new(datetime!(2025-01-01 12:00 UTC));
//! clock.advance(Duration::from_secs(90));
//! assert_eq!(clock.now(), datetime!(2025-01-01 12:01:30 UTC));
//! ```

use std::fmt::Debug;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use time::OffsetDateTime;

/// Source of the current UTC time.
pub trait Clock: Send + Sync + Debug {
    /// The current instant, in UTC.
    fn now(&self) -> OffsetDateTime;
}

/// The system wall clock.
///
/// Every reading is taken from the OS UTC clock, never from a monotonic
/// timer, so it keeps counting through suspends and clock adjustments.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl SystemClock {
    /// Create a new system clock.
    pub fn new() -> Self {
        Self
    }
}

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

/// Clock driven by the Tokio timer, for tests with paused time.
///
/// Anchored at a fixed instant and advanced by `tokio::time`, so it moves
/// exactly as far as the runtime's sleeps.
#[cfg(test)]
#[derive(Debug, Clone, Copy)]
pub(crate) struct TokioClock {
    origin: OffsetDateTime,
    started: tokio::time::Instant,
}

#[cfg(test)]
impl TokioClock {
    pub(crate) fn new() -> Self {
        Self {
            origin: time::macros::datetime!(2025-06-01 08:00 UTC),
            started: tokio::time::Instant::now(),
        }
    }
}

#[cfg(test)]
impl Clock for TokioClock {
    fn now(&self) -> OffsetDateTime {
        self.origin + self.started.elapsed()
    }
}

/// Manually driven clock.
///
/// Clones share the same time, so advancing one clone is visible to every
/// limiter holding another.
#[derive(Debug, Clone)]
pub struct ManualClock {
    current: Arc<Mutex<OffsetDateTime>>,
}

impl ManualClock {
    /// Create a clock stopped at `start`.
    pub fn new(start: OffsetDateTime) -> Self {
        Self {
            current: Arc::new(Mutex::new(start)),
        }
    }

    /// Move the clock forward.
    pub fn advance(&self, duration: Duration) {
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        *current += duration;
    }

    /// Jump to a specific instant.
    pub fn set(&self, instant: OffsetDateTime) {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = instant;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> OffsetDateTime {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[tokio::test(start_paused = true)]
    async fn test_system_clock_ignores_tokio_time() {
        let clock = SystemClock::new();
        let before = clock.now();
        tokio::time::sleep(Duration::from_secs(8 * 3600)).await;
        let after = clock.now();

        assert!(after - before < time::Duration::hours(1));
        assert!((OffsetDateTime::now_utc() - after).abs() < time::Duration::minutes(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokio_clock_follows_tokio_time() {
        let clock = TokioClock::new();
        let t1 = clock.now();
        tokio::time::sleep(Duration::from_secs(5)).await;
        let t2 = clock.now();

        assert_eq!(t2 - t1, time::Duration::seconds(5));
    }

    #[test]
    fn test_system_clock_is_utc() {
        assert!(SystemClock::new().now().offset().is_utc());
    }

    #[test]
    fn test_manual_clock_clones_share_time() {
        let clock = ManualClock::new(datetime!(2025-03-01 00:00 UTC));
        let other = clock.clone();

        other.advance(Duration::from_secs(60));
        assert_eq!(clock.now(), datetime!(2025-03-01 00:01 UTC));

        clock.set(datetime!(2025-03-02 00:00 UTC));
        assert_eq!(other.now(), datetime!(2025-03-02 00:00 UTC));
    }
}
