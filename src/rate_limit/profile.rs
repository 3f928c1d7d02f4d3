//! Window limits and limit profiles.

use std::time::Duration;

use time::OffsetDateTime;

use crate::rate_limit::limits;

/// A bound of `permits` admissions within any trailing `duration`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowLimit {
    /// Window duration
    pub duration: Duration,
    /// Maximum admissions per window
    pub permits: u32,
}

impl WindowLimit {
    /// Create a new window limit.
    pub const fn new(duration: Duration, permits: u32) -> Self {
        Self { duration, permits }
    }

    /// Check if a timestamp recorded at `at` still counts against the window at `now`.
    ///
    /// A timestamp exactly `duration` old still counts.
    pub fn covers(&self, at: OffsetDateTime, now: OffsetDateTime) -> bool {
        at + self.duration >= now
    }

    /// Drop timestamps that have left the window.
    pub(crate) fn prune(&self, timestamps: &mut Vec<OffsetDateTime>, now: OffsetDateTime) {
        timestamps.retain(|at| self.covers(*at, now));
    }
}

/// Named windows that together bound one identity tier.
///
/// Windows are checked in the order they were declared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LimitProfile {
    windows: Vec<(String, WindowLimit)>,
}

impl LimitProfile {
    /// Create a profile from `(name, limit)` pairs.
    pub fn new<I, S>(windows: I) -> Self
    where
        I: IntoIterator<Item = (S, WindowLimit)>,
        S: Into<String>,
    {
        Self {
            windows: windows
                .into_iter()
                .map(|(name, limit)| (name.into(), limit))
                .collect(),
        }
    }

    /// Durable windows for anonymous callers.
    pub fn anonymous() -> Self {
        use limits::anonymous::*;
        Self::standard(PER_15_MINUTES, PER_12_HOURS, PER_7_DAYS)
    }

    /// Durable windows for registered callers.
    pub fn registered() -> Self {
        use limits::registered::*;
        Self::standard(PER_15_MINUTES, PER_12_HOURS, PER_7_DAYS)
    }

    fn standard(per_15m: u32, per_12h: u32, per_7d: u32) -> Self {
        Self::new([
            ("15m", WindowLimit::new(Duration::from_secs(15 * 60), per_15m)),
            ("12h", WindowLimit::new(Duration::from_secs(12 * 3600), per_12h)),
            ("7d", WindowLimit::new(Duration::from_secs(7 * 86_400), per_7d)),
        ])
    }

    /// Iterate over the windows in check order.
    pub fn windows(&self) -> impl Iterator<Item = (&str, &WindowLimit)> {
        self.windows.iter().map(|(name, limit)| (name.as_str(), limit))
    }

    /// Look up a window by name.
    pub fn get(&self, name: &str) -> Option<&WindowLimit> {
        self.windows
            .iter()
            .find(|(window, _)| window == name)
            .map(|(_, limit)| limit)
    }

    /// Check if the profile defines a window with this name.
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }
}
