//! Fixed-window per-(tenant, user) rate limiting.
//!
//! One counter per (tenant, user) key: a count and the instant the window
//! resets. An event past the reset instant starts a fresh window at
//! count 1; inside the window the count increments until the limit, then
//! events are refused with the seconds remaining. Reset instants only move
//! forward.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use roost_types::{TenantId, UserId};

/// Window length used in production: the limit is "per minute".
pub const WINDOW: Duration = Duration::from_secs(60);

/// Verdict for one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed,
    /// Over quota; retry after this many seconds (always at least 1).
    Limited { retry_after_secs: u64 },
}

struct Counter {
    count: u32,
    window_reset_at: Instant,
}

/// In-memory fixed-window limiter.
///
/// Counters are never persisted; a process restart resets all quotas, which
/// is acceptable for an abuse brake.
pub struct RateLimiter {
    window: Duration,
    counters: Mutex<HashMap<(TenantId, UserId), Counter>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::with_window(WINDOW)
    }

    /// Custom window length, for tests.
    pub fn with_window(window: Duration) -> Self {
        Self {
            window,
            counters: Mutex::new(HashMap::new()),
        }
    }

    /// Account one event for (tenant, user) against `limit` events per
    /// window.
    pub fn check(&self, tenant: &TenantId, user: UserId, limit: u32) -> RateDecision {
        let now = Instant::now();
        let mut counters = self.counters.lock().unwrap();
        let counter = counters
            .entry((tenant.clone(), user))
            .or_insert_with(|| Counter {
                count: 0,
                window_reset_at: now + self.window,
            });

        if now >= counter.window_reset_at {
            counter.count = 1;
            counter.window_reset_at = now + self.window;
            return RateDecision::Allowed;
        }

        if counter.count >= limit {
            let remaining = counter.window_reset_at.saturating_duration_since(now);
            return RateDecision::Limited {
                retry_after_secs: remaining.as_secs().max(1),
            };
        }

        counter.count += 1;
        RateDecision::Allowed
    }

    /// Number of live counters, for introspection.
    pub fn tracked(&self) -> usize {
        self.counters.lock().unwrap().len()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}
