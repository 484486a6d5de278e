//! Bucketed rolling statistics window.
//!
//! The window is split into `buckets` slices of `window / buckets` each.
//! Buckets older than the window are dropped lazily on access.

use serde::Serialize;
use std::collections::VecDeque;
use std::ops::AddAssign;
use std::time::{Duration, Instant};

/// Outcome counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CallCounts {
    /// Calls actually executed
    pub fires: u64,
    pub successes: u64,
    /// Executed calls that returned an error (timeouts excluded)
    pub failures: u64,
    pub timeouts: u64,
    /// Calls short-circuited without executing
    pub rejects: u64,
    /// Calls answered by the fallback
    pub fallbacks: u64,
}

impl CallCounts {
    /// Failures counted against the circuit (errors + timeouts)
    pub fn failed(&self) -> u64 {
        self.failures + self.timeouts
    }

    /// Failure rate in percent over executed calls
    pub fn failure_rate_percent(&self) -> f64 {
        if self.fires == 0 {
            return 0.0;
        }
        self.failed() as f64 * 100.0 / self.fires as f64
    }
}

impl AddAssign for CallCounts {
    fn add_assign(&mut self, rhs: Self) {
        self.fires += rhs.fires;
        self.successes += rhs.successes;
        self.failures += rhs.failures;
        self.timeouts += rhs.timeouts;
        self.rejects += rhs.rejects;
        self.fallbacks += rhs.fallbacks;
    }
}

#[derive(Debug)]
struct Bucket {
    started_at: Instant,
    counts: CallCounts,
}

#[derive(Debug)]
pub struct RollingWindow {
    bucket_span: Duration,
    capacity: usize,
    buckets: VecDeque<Bucket>,
}

impl RollingWindow {
    pub fn new(window: Duration, buckets: u32) -> Self {
        let buckets = buckets.max(1);
        let bucket_span = (window / buckets).max(Duration::from_millis(1));
        Self {
            bucket_span,
            capacity: buckets as usize,
            buckets: VecDeque::with_capacity(buckets as usize),
        }
    }

    /// Counters of the bucket covering `now`
    pub fn current(&mut self, now: Instant) -> &mut CallCounts {
        self.expire(now);
        let fresh = match self.buckets.back() {
            Some(bucket) => now >= bucket.started_at + self.bucket_span,
            None => true,
        };
        if fresh {
            self.buckets.push_back(Bucket {
                started_at: now,
                counts: CallCounts::default(),
            });
        }
        // Just pushed or checked non-empty above
        let last = self.buckets.len() - 1;
        &mut self.buckets[last].counts
    }

    /// Sum over all live buckets
    pub fn totals(&mut self, now: Instant) -> CallCounts {
        self.expire(now);
        let mut sum = CallCounts::default();
        for bucket in &self.buckets {
            sum += bucket.counts;
        }
        sum
    }

    pub fn clear(&mut self) {
        self.buckets.clear();
    }

    fn expire(&mut self, now: Instant) {
        let span = self.bucket_span * self.capacity as u32;
        while let Some(front) = self.buckets.front() {
            if front.started_at + span <= now {
                self.buckets.pop_front();
            } else {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_accumulate_within_one_bucket() {
        let t0 = Instant::now();
        let mut window = RollingWindow::new(Duration::from_secs(10), 10);

        window.current(t0).fires += 1;
        window.current(t0 + Duration::from_millis(200)).fires += 1;

        assert_eq!(window.totals(t0 + Duration::from_millis(300)).fires, 2);
        assert_eq!(window.buckets.len(), 1);
    }

    #[test]
    fn test_old_buckets_roll_out() {
        let t0 = Instant::now();
        let mut window = RollingWindow::new(Duration::from_secs(10), 10);

        window.current(t0).failures += 3;
        window.current(t0 + Duration::from_secs(5)).successes += 1;

        let mid = window.totals(t0 + Duration::from_secs(9));
        assert_eq!(mid.failures, 3);
        assert_eq!(mid.successes, 1);

        let later = window.totals(t0 + Duration::from_secs(10));
        assert_eq!(later.failures, 0, "first bucket should have expired");
        assert_eq!(later.successes, 1);
    }

    #[test]
    fn test_failure_rate() {
        let counts = CallCounts {
            fires: 4,
            successes: 2,
            failures: 1,
            timeouts: 1,
            ..Default::default()
        };
        assert_eq!(counts.failed(), 2);
        assert!((counts.failure_rate_percent() - 50.0).abs() < f64::EPSILON);
        assert_eq!(CallCounts::default().failure_rate_percent(), 0.0);
    }
}
