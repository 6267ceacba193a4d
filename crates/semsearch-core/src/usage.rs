//! Cumulative token usage accounting.

use std::sync::atomic::{AtomicU64, Ordering};

/// Running total of tokens consumed by embedding calls.
///
/// One instance is created by the application and shared (via `Arc`) between
/// the corpus build and every query. Updates are a single atomic add, so
/// concurrent requests never lose increments.
#[derive(Debug, Default)]
pub struct UsageTracker {
    total: AtomicU64,
}

impl UsageTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `tokens` to the running total and return the new total.
    pub fn record_usage(&self, tokens: u64) -> u64 {
        self.total.fetch_add(tokens, Ordering::Relaxed) + tokens
    }

    pub fn current_total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_record_returns_running_total() {
        let tracker = UsageTracker::new();
        assert_eq!(tracker.current_total(), 0);
        assert_eq!(tracker.record_usage(7), 7);
        assert_eq!(tracker.record_usage(0), 7);
        assert_eq!(tracker.record_usage(5), 12);
        assert_eq!(tracker.current_total(), 12);
    }

    #[test]
    fn test_concurrent_increments_are_not_lost() {
        let tracker = Arc::new(UsageTracker::new());
        let handles: Vec<_> = (0..64u64)
            .map(|i| {
                let tracker = tracker.clone();
                std::thread::spawn(move || {
                    for _ in 0..1_000 {
                        tracker.record_usage(i);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let expected: u64 = (0..64u64).map(|i| i * 1_000).sum();
        assert_eq!(tracker.current_total(), expected);
    }
}
