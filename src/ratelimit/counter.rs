//! Rate limit window and counter implementation.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Time window for rate limiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeWindow {
    /// Per-second rate limiting
    Second,
    /// Per-minute rate limiting
    Minute,
    /// Per-hour rate limiting
    Hour,
    /// Per-day rate limiting
    Day,
}

impl TimeWindow {
    /// Get the duration of this time window.
    pub fn duration(&self) -> Duration {
        match self {
            TimeWindow::Second => Duration::from_secs(1),
            TimeWindow::Minute => Duration::from_secs(60),
            TimeWindow::Hour => Duration::from_secs(3600),
            TimeWindow::Day => Duration::from_secs(86400),
        }
    }
}

impl FromStr for TimeWindow {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "second" | "seconds" => Ok(TimeWindow::Second),
            "minute" | "minutes" => Ok(TimeWindow::Minute),
            "hour" | "hours" => Ok(TimeWindow::Hour),
            "day" | "days" => Ok(TimeWindow::Day),
            other => Err(format!("unknown time unit: {}", other)),
        }
    }
}

/// A counter that bounds admissions within one window.
///
/// Admission is a single compare-and-swap, so concurrent callers can never
/// both claim the last slot, and a reset racing with an admission simply
/// makes the admission re-read the fresh count.
#[derive(Debug)]
pub struct WindowCounter {
    /// Admissions in the current window
    count: AtomicU64,
    /// Maximum admissions per window
    limit: u64,
    /// Number of resets performed so far
    windows_elapsed: AtomicU64,
}

impl WindowCounter {
    /// Create a new counter with the given limit.
    pub fn new(limit: u64) -> Self {
        Self {
            count: AtomicU64::new(0),
            limit,
            windows_elapsed: AtomicU64::new(0),
        }
    }

    /// Claim one slot in the current window.
    ///
    /// Returns `true` if the slot was claimed, `false` if the window is full.
    /// A failed attempt leaves the count untouched.
    pub fn try_acquire(&self) -> bool {
        self.count
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                (current < self.limit).then(|| current + 1)
            })
            .is_ok()
    }

    /// Start a new window.
    ///
    /// Returns the count of the window that just ended.
    pub fn reset(&self) -> u64 {
        let previous = self.count.swap(0, Ordering::AcqRel);
        self.windows_elapsed.fetch_add(1, Ordering::Relaxed);
        previous
    }

    /// Get the current count.
    pub fn current_count(&self) -> u64 {
        self.count.load(Ordering::Acquire)
    }

    /// Get the remaining quota.
    pub fn remaining(&self) -> u64 {
        self.limit.saturating_sub(self.current_count())
    }

    /// Get the limit for this counter.
    pub fn limit(&self) -> u64 {
        self.limit
    }

    /// Get the number of windows that have been closed by a reset.
    pub fn windows_elapsed(&self) -> u64 {
        self.windows_elapsed.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_time_window_duration() {
        assert_eq!(TimeWindow::Second.duration(), Duration::from_secs(1));
        assert_eq!(TimeWindow::Minute.duration(), Duration::from_secs(60));
        assert_eq!(TimeWindow::Hour.duration(), Duration::from_secs(3600));
        assert_eq!(TimeWindow::Day.duration(), Duration::from_secs(86400));
    }

    #[test]
    fn test_time_window_parse() {
        assert_eq!("second".parse::<TimeWindow>(), Ok(TimeWindow::Second));
        assert_eq!("Minutes".parse::<TimeWindow>(), Ok(TimeWindow::Minute));
        assert_eq!("DAY".parse::<TimeWindow>(), Ok(TimeWindow::Day));
        assert!("fortnight".parse::<TimeWindow>().is_err());
    }

    #[test]
    fn test_counter_acquire_within_limit() {
        let counter = WindowCounter::new(10);

        assert!(counter.try_acquire());
        assert_eq!(counter.current_count(), 1);
        assert_eq!(counter.remaining(), 9);
    }

    #[test]
    fn test_counter_rejects_over_limit_without_consuming() {
        let counter = WindowCounter::new(5);

        for _ in 0..5 {
            assert!(counter.try_acquire());
        }

        // The 6th request should be rejected
        assert!(!counter.try_acquire());
        assert_eq!(counter.current_count(), 5);
        assert_eq!(counter.remaining(), 0);
    }

    #[test]
    fn test_counter_reset() {
        let counter = WindowCounter::new(2);
        assert!(counter.try_acquire());
        assert!(counter.try_acquire());
        assert!(!counter.try_acquire());

        assert_eq!(counter.reset(), 2);
        assert_eq!(counter.current_count(), 0);
        assert_eq!(counter.windows_elapsed(), 1);

        assert!(counter.try_acquire());
        assert!(counter.try_acquire());
        assert!(!counter.try_acquire());
    }

    #[test]
    fn test_counter_concurrent_acquire_never_over_admits() {
        let counter = WindowCounter::new(100);
        let admitted = AtomicUsize::new(0);

        std::thread::scope(|s| {
            for _ in 0..16 {
                s.spawn(|| {
                    for _ in 0..50 {
                        if counter.try_acquire() {
                            admitted.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                });
            }
        });

        assert_eq!(admitted.load(Ordering::Relaxed), 100);
        assert_eq!(counter.current_count(), 100);
    }
}
