//! Fixed-window request limiting keyed by caller identity.
//! One limiter instance per policy (per-user, per-IP); each owns its window
//! and budget. Expired entries are swept once the key count crosses a
//! high-water mark, so per-IP cardinality stays bounded without a timer.

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;

/// Sweep expired entries once this many keys are tracked.
const PRUNE_THRESHOLD: usize = 5_000;

/// Window length and request budget for one limiter instance.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    pub window_ms: u64,
    pub max_requests: u32,
}

/// Outcome of a single limiter check.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub remaining: u32,
    /// End of the current window, epoch milliseconds.
    pub reset_at_ms: i64,
}

impl RateLimitDecision {
    /// Window end as epoch seconds, rounded up (header granularity).
    pub fn reset_at_secs(&self) -> i64 {
        (self.reset_at_ms + 999) / 1000
    }
}

struct Hit {
    count: u32,
    reset_at_ms: i64,
}

/// Fixed-window counter store. A rejected call never consumes budget, and an
/// entry whose window has passed is replaced rather than carried over.
pub struct FixedWindowLimiter {
    config: RateLimitConfig,
    store: Mutex<HashMap<String, Hit>>,
}

impl FixedWindowLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            store: Mutex::new(HashMap::new()),
        }
    }

    /// Check (and count) one request for `key`.
    pub fn check(&self, key: &str) -> RateLimitDecision {
        self.check_at(key, now_ms())
    }

    fn check_at(&self, key: &str, now_ms: i64) -> RateLimitDecision {
        let mut store = self.store.lock();

        if store.len() >= PRUNE_THRESHOLD {
            store.retain(|_, hit| hit.reset_at_ms > now_ms);
        }

        match store.get_mut(key) {
            Some(hit) if hit.reset_at_ms > now_ms => {
                if hit.count >= self.config.max_requests {
                    return RateLimitDecision {
                        allowed: false,
                        remaining: 0,
                        reset_at_ms: hit.reset_at_ms,
                    };
                }
                hit.count += 1;
                RateLimitDecision {
                    allowed: true,
                    remaining: self.config.max_requests - hit.count,
                    reset_at_ms: hit.reset_at_ms,
                }
            }
            _ => {
                // Absent or expired: start a fresh window.
                let reset_at_ms = now_ms + self.config.window_ms as i64;
                store.insert(
                    key.to_string(),
                    Hit {
                        count: 1,
                        reset_at_ms,
                    },
                );
                RateLimitDecision {
                    allowed: true,
                    remaining: self.config.max_requests.saturating_sub(1),
                    reset_at_ms,
                }
            }
        }
    }
}

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(window_ms: u64, max_requests: u32) -> FixedWindowLimiter {
        FixedWindowLimiter::new(RateLimitConfig {
            window_ms,
            max_requests,
        })
    }

    #[test]
    fn allows_until_budget_is_spent() {
        let limiter = limiter(60_000, 3);
        for expected_remaining in [2, 1, 0] {
            let decision = limiter.check_at("user:a", 1_000);
            assert!(decision.allowed);
            assert_eq!(decision.remaining, expected_remaining);
            assert_eq!(decision.reset_at_ms, 61_000);
        }

        let rejected = limiter.check_at("user:a", 1_000);
        assert!(!rejected.allowed);
        assert_eq!(rejected.remaining, 0);
        assert_eq!(rejected.reset_at_ms, 61_000);
    }

    #[test]
    fn rejection_does_not_consume_budget() {
        let limiter = limiter(60_000, 1);
        assert!(limiter.check_at("k", 0).allowed);
        for _ in 0..10 {
            assert!(!limiter.check_at("k", 0).allowed);
        }
        // The count never exceeded the budget, so the entry still holds 1.
        assert_eq!(limiter.store.lock().get("k").map(|h| h.count), Some(1));
    }

    #[test]
    fn expired_window_is_replaced() {
        let limiter = limiter(60_000, 2);
        assert!(limiter.check_at("k", 0).allowed);
        assert!(limiter.check_at("k", 0).allowed);
        assert!(!limiter.check_at("k", 59_999).allowed);

        let fresh = limiter.check_at("k", 60_000);
        assert!(fresh.allowed);
        assert_eq!(fresh.remaining, 1);
        assert_eq!(fresh.reset_at_ms, 120_000);
    }

    #[test]
    fn keys_are_independent() {
        let limiter = limiter(60_000, 1);
        assert!(limiter.check_at("user:a", 0).allowed);
        assert!(limiter.check_at("user:b", 0).allowed);
        assert!(!limiter.check_at("user:a", 0).allowed);
    }

    #[test]
    fn expired_entries_are_swept_past_high_water_mark() {
        let limiter = limiter(1_000, 1);
        for i in 0..PRUNE_THRESHOLD {
            limiter.check_at(&format!("ip:{i}"), 0);
        }
        assert_eq!(limiter.store.lock().len(), PRUNE_THRESHOLD);

        // All prior windows ended at t=1000; the next check sweeps them.
        let decision = limiter.check_at("ip:new", 2_000);
        assert!(decision.allowed);
        assert_eq!(limiter.store.lock().len(), 1);
    }

    #[test]
    fn reset_seconds_round_up() {
        let decision = RateLimitDecision {
            allowed: true,
            remaining: 1,
            reset_at_ms: 60_001,
        };
        assert_eq!(decision.reset_at_secs(), 61);
    }
}
