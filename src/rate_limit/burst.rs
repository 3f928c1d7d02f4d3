//! In-memory one-second burst limiting.
//!
//! A sliding window of admission timestamps, one limiter per identity tier.
//! Each admission is handed out as a [`BurstSlot`] guard:
//!
//! - dropping an uncommitted slot **refunds** it: its timestamp is removed
//!   and the capacity is available again at once;
//! - dropping a committed slot **releases** it: the slot is no longer held,
//!   and its timestamp ages out of the window normally.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use bdl_api_client::rate_limit::{BurstLimiter, SystemClock};
//!
//! let limiter = Arc::new(BurstLimiter::new(
//!     Duration::from_secs(1),
//!     2,
//!     Arc::new(SystemClock::new()),
//! ));
//!
//! let mut slot = limiter.try_acquire().unwrap();
//! slot.commit();
//! assert_eq!(limiter.remaining(), 1);
//!
//! // An uncommitted slot gives its capacity back when dropped.
//! let refunded = limiter.try_acquire().unwrap();
//! drop(refunded);
//! assert_eq!(limiter.remaining(), 1);
//! ```

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use time::OffsetDateTime;

use crate::rate_limit::Clock;

/// Smallest wait between retries while the window is full.
const MIN_WAIT: Duration = Duration::from_millis(1);

/// Sliding window limiter whose admissions can be refunded.
#[derive(Debug)]
pub struct BurstLimiter {
    window: Duration,
    max_requests: u32,
    clock: Arc<dyn Clock>,
    state: Mutex<BurstState>,
    /// Queue for blocked acquirers; Tokio's mutex wakes waiters in FIFO order.
    waiters: tokio::sync::Mutex<()>,
}

#[derive(Debug, Default)]
struct BurstState {
    /// Admissions still inside the window, oldest first
    requests: VecDeque<(u64, OffsetDateTime)>,
    next_id: u64,
    held: usize,
}

impl BurstLimiter {
    /// Create a new burst limiter.
    ///
    /// # Arguments
    ///
    /// * `window` - The sliding window duration
    /// * `max_requests` - Maximum number of admissions per window
    /// * `clock` - Time source
    pub fn new(window: Duration, max_requests: u32, clock: Arc<dyn Clock>) -> Self {
        Self {
            window,
            max_requests,
            clock,
            state: Mutex::new(BurstState::default()),
            waiters: tokio::sync::Mutex::new(()),
        }
    }

    /// One-second limiter allowing `per_second` admissions.
    pub fn per_second(per_second: u32, clock: Arc<dyn Clock>) -> Self {
        Self::new(Duration::from_secs(1), per_second, clock)
    }

    /// Window duration.
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Maximum admissions per window.
    pub fn max_requests(&self) -> u32 {
        self.max_requests
    }

    /// Try to take a slot without waiting.
    ///
    /// Returns the slot if allowed, or `Err(wait_time)` until the oldest
    /// admission leaves the window.
    pub fn try_acquire(self: &Arc<Self>) -> Result<BurstSlot, Duration> {
        let now = self.clock.now();
        let mut state = self.lock();
        self.cleanup_old(&mut state, now);

        if (state.requests.len() as u32) < self.max_requests {
            let id = state.next_id;
            state.next_id += 1;
            state.requests.push_back((id, now));
            state.held += 1;
            Ok(BurstSlot {
                limiter: Arc::clone(self),
                id,
                committed: false,
            })
        } else {
            let wait_time = state
                .requests
                .front()
                .map(|(_, oldest)| {
                    let expires = *oldest + self.window;
                    Duration::try_from(expires - now).unwrap_or_default()
                })
                .unwrap_or_default();
            Err(wait_time.max(MIN_WAIT))
        }
    }

    /// Wait until a slot is free and take it.
    ///
    /// Blocked callers are served in arrival order. Dropping the returned
    /// future before it completes takes no slot.
    pub async fn acquire(self: &Arc<Self>) -> BurstSlot {
        let _turn = self.waiters.lock().await;
        loop {
            match self.try_acquire() {
                Ok(slot) => return slot,
                Err(wait_time) => {
                    tracing::trace!(?wait_time, "Burst window full, waiting");
                    tokio::time::sleep(wait_time).await;
                }
            }
        }
    }

    /// Get the number of admissions still available in the current window.
    pub fn remaining(&self) -> u32 {
        let now = self.clock.now();
        let count = self
            .lock()
            .requests
            .iter()
            .filter(|(_, at)| *at + self.window > now)
            .count() as u32;
        self.max_requests.saturating_sub(count)
    }

    /// Number of slots handed out and not yet dropped.
    pub fn held(&self) -> usize {
        self.lock().held
    }

    fn refund(&self, id: u64) {
        let mut state = self.lock();
        state.requests.retain(|(slot, _)| *slot != id);
        state.held = state.held.saturating_sub(1);
    }

    fn release(&self) {
        let mut state = self.lock();
        state.held = state.held.saturating_sub(1);
    }

    /// Remove admissions that are outside the window.
    fn cleanup_old(&self, state: &mut BurstState, now: OffsetDateTime) {
        while let Some((_, oldest)) = state.requests.front() {
            if *oldest + self.window > now {
                break;
            }
            state.requests.pop_front();
        }
    }

    fn lock(&self) -> MutexGuard<'_, BurstState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// One admission from a [`BurstLimiter`].
///
/// Refunded on drop unless [committed](BurstSlot::commit).
#[derive(Debug)]
pub struct BurstSlot {
    limiter: Arc<BurstLimiter>,
    id: u64,
    committed: bool,
}

impl BurstSlot {
    /// Keep the admission; dropping the slot will only release it.
    pub fn commit(&mut self) {
        self.committed = true;
    }

    /// Check if the slot has been committed.
    pub fn is_committed(&self) -> bool {
        self.committed
    }
}

impl Drop for BurstSlot {
    fn drop(&mut self) {
        if self.committed {
            self.limiter.release();
        } else {
            self.limiter.refund(self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rate_limit::ManualClock;
    use time::macros::datetime;
    use tokio_test::{assert_pending, assert_ready, task};

    fn limiter(max_requests: u32) -> (Arc<BurstLimiter>, ManualClock) {
        let clock = ManualClock::new(datetime!(2025-06-01 08:00 UTC));
        let limiter = Arc::new(BurstLimiter::per_second(max_requests, Arc::new(clock.clone())));
        (limiter, clock)
    }

    fn committed(limiter: &Arc<BurstLimiter>) -> BurstSlot {
        let mut slot = limiter.try_acquire().unwrap();
        slot.commit();
        slot
    }

    #[test]
    fn test_allows_within_limit() {
        let (limiter, _clock) = limiter(3);
        let _slots: Vec<_> = (0..3).map(|_| committed(&limiter)).collect();

        assert_eq!(limiter.try_acquire().unwrap_err(), Duration::from_secs(1));
    }

    #[test]
    fn test_resets_after_window() {
        let (limiter, clock) = limiter(2);
        drop(committed(&limiter));
        clock.advance(Duration::from_millis(400));
        drop(committed(&limiter));
        assert_eq!(
            limiter.try_acquire().unwrap_err(),
            Duration::from_millis(600)
        );

        clock.advance(Duration::from_millis(600));
        assert!(limiter.try_acquire().is_ok());
    }

    #[test]
    fn test_refund_restores_capacity() {
        let (limiter, _clock) = limiter(2);
        let _kept = committed(&limiter);
        let refunded = limiter.try_acquire().unwrap();
        assert_eq!(limiter.remaining(), 0);
        assert_eq!(limiter.held(), 2);

        drop(refunded);

        assert_eq!(limiter.remaining(), 1);
        assert_eq!(limiter.held(), 1);
    }

    #[test]
    fn test_release_keeps_timestamp() {
        let (limiter, _clock) = limiter(2);
        drop(committed(&limiter));

        assert_eq!(limiter.held(), 0);
        assert_eq!(limiter.remaining(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_waits_for_window() {
        let (limiter, clock) = limiter(1);
        let _first = committed(&limiter);

        let mut waiting = task::spawn(limiter.acquire());
        assert_pending!(waiting.poll());

        clock.advance(Duration::from_secs(1));
        tokio::time::advance(Duration::from_secs(1)).await;
        let _slot = assert_ready!(waiting.poll());
        assert_eq!(limiter.held(), 2);
    }

    #[tokio::test]
    async fn test_cancelled_acquire_takes_no_slot() {
        let (limiter, _clock) = limiter(1);
        let first = committed(&limiter);

        let mut waiting = task::spawn(limiter.acquire());
        assert_pending!(waiting.poll());
        drop(waiting);
        drop(first);

        assert_eq!(limiter.held(), 0);
        assert_eq!(limiter.remaining(), 0);
    }
}
