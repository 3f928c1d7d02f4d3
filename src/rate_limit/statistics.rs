//! Headroom reports.

/// Remaining admissions in one window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowStatistics {
    /// Window name (`1s`, `15m`, ...)
    pub window: String,
    /// Admissions still available
    pub remaining: u32,
    /// Window limit
    pub limit: u32,
}

/// Remaining admissions for one identity, window by window.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuotaStatistics {
    /// Windows in check order.
    pub windows: Vec<WindowStatistics>,
}

impl QuotaStatistics {
    /// Look up a window by name.
    pub fn window(&self, name: &str) -> Option<&WindowStatistics> {
        self.windows.iter().find(|w| w.window == name)
    }

    /// Remaining admissions in the tightest window.
    pub fn min_remaining(&self) -> Option<u32> {
        self.windows.iter().map(|w| w.remaining).min()
    }
}

impl std::fmt::Display for QuotaStatistics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Available limits:")?;
        for w in &self.windows {
            write!(f, " | {}: {}/{}", w.window, w.remaining, w.limit)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let stats = QuotaStatistics {
            windows: vec![
                WindowStatistics {
                    window: "1s".to_string(),
                    remaining: 4,
                    limit: 5,
                },
                WindowStatistics {
                    window: "15m".to_string(),
                    remaining: 0,
                    limit: 100,
                },
            ],
        };

        assert_eq!(stats.to_string(), "Available limits: | 1s: 4/5 | 15m: 0/100");
        assert_eq!(stats.min_remaining(), Some(0));
        assert_eq!(stats.window("15m").map(|w| w.limit), Some(100));
    }
}
