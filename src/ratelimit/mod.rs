//! Fixed-window rate limiting keyed by (action, identifier)
//!
//! The first attempt for a key opens a window of `period`; attempts inside
//! the window are counted until `limit` is reached, after which they are
//! refused until the window expires and a fresh one is opened. Counts are
//! never decremented.
//!
//! Limits are opt-in: an action with no configured limit is unlimited.

pub mod clock;

pub use clock::{Clock, MockClock, SystemClock};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimit {
    pub limit: u32,
    pub period: Duration,
}

impl RateLimit {
    pub const fn new(limit: u32, period: Duration) -> Self {
        Self { limit, period }
    }

    pub const fn per_minute(limit: u32) -> Self {
        Self::new(limit, Duration::from_secs(60))
    }

    pub const fn per_hour(limit: u32) -> Self {
        Self::new(limit, Duration::from_secs(3600))
    }
}

type WindowKey = (String, String);

#[derive(Debug, Clone, Copy)]
struct Window {
    count: u32,
    expires_at: Instant,
}

impl Window {
    fn open(now: Instant, period: Duration) -> Self {
        Self {
            count: 1,
            expires_at: now + period,
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimiterStats {
    pub active_windows: usize,
    pub configured_actions: Vec<String>,
    pub blocked_identifiers: usize,
}

/// Shared, cloneable rate limiter
#[derive(Clone)]
pub struct RateLimiter {
    inner: Arc<RateLimiterInner>,
}

struct RateLimiterInner {
    clock: Arc<dyn Clock>,
    action_limits: DashMap<String, RateLimit>,
    pair_limits: DashMap<WindowKey, RateLimit>,
    windows: DashMap<WindowKey, Window>,
    blocked: DashMap<String, Instant>,
}

fn key(action: &str, identifier: &str) -> WindowKey {
    (action.to_string(), identifier.to_string())
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Arc::new(RateLimiterInner {
                clock,
                action_limits: DashMap::new(),
                pair_limits: DashMap::new(),
                windows: DashMap::new(),
                blocked: DashMap::new(),
            }),
        }
    }

    /// Limit every identifier of `action`
    pub fn set_limit(&self, action: &str, limit: RateLimit) {
        self.inner.action_limits.insert(action.to_string(), limit);
    }

    /// Limit one (action, identifier) pair, taking precedence over the
    /// action-wide limit
    pub fn set_limit_for(&self, action: &str, identifier: &str, limit: RateLimit) {
        self.inner.pair_limits.insert(key(action, identifier), limit);
    }

    /// Make `action` unlimited again, dropping its per-identifier limits too
    pub fn remove_limit(&self, action: &str) {
        self.inner.action_limits.remove(action);
        self.inner.pair_limits.retain(|(a, _), _| a != action);
    }

    /// Effective limit for a pair, `None` when unlimited
    pub fn limit_for(&self, action: &str, identifier: &str) -> Option<RateLimit> {
        if let Some(limit) = self.inner.pair_limits.get(&key(action, identifier)) {
            return Some(*limit);
        }
        self.inner.action_limits.get(action).map(|limit| *limit)
    }

    /// Record an attempt and report whether it is within the limit
    pub fn allow(&self, action: &str, identifier: &str) -> bool {
        let Some(limit) = self.limit_for(action, identifier) else {
            return true;
        };
        if limit.limit == 0 {
            return false;
        }

        let now = self.inner.clock.now();
        match self.inner.windows.entry(key(action, identifier)) {
            Entry::Vacant(vacant) => {
                vacant.insert(Window::open(now, limit.period));
                true
            }
            Entry::Occupied(mut occupied) => {
                let window = occupied.get_mut();
                if window.is_expired(now) {
                    *window = Window::open(now, limit.period);
                    return true;
                }
                if window.count >= limit.limit {
                    debug!(action, identifier, count = window.count, "rate limit exceeded");
                    return false;
                }
                window.count += 1;
                true
            }
        }
    }

    /// Attempts counted in the current window
    pub fn attempts(&self, action: &str, identifier: &str) -> u32 {
        let now = self.inner.clock.now();
        self.inner
            .windows
            .get(&key(action, identifier))
            .filter(|window| !window.is_expired(now))
            .map(|window| window.count)
            .unwrap_or(0)
    }

    /// Attempts left in the current window, `None` when unlimited
    pub fn remaining(&self, action: &str, identifier: &str) -> Option<u32> {
        let limit = self.limit_for(action, identifier)?;
        Some(limit.limit.saturating_sub(self.attempts(action, identifier)))
    }

    pub fn is_rate_limited(&self, action: &str, identifier: &str) -> bool {
        self.remaining(action, identifier) == Some(0)
    }

    /// Time until the current window closes, zero when there is none
    pub fn reset_in(&self, action: &str, identifier: &str) -> Duration {
        let now = self.inner.clock.now();
        self.inner
            .windows
            .get(&key(action, identifier))
            .map(|window| window.expires_at.saturating_duration_since(now))
            .unwrap_or(Duration::ZERO)
    }

    pub fn reset(&self, action: &str, identifier: &str) {
        self.inner.windows.remove(&key(action, identifier));
    }

    pub fn reset_all(&self) {
        self.inner.windows.clear();
    }

    /// Refuse `identifier` for `duration`, independent of any window
    pub fn block_identifier(&self, identifier: &str, duration: Duration) {
        let until = self.inner.clock.now() + duration;
        self.inner.blocked.insert(identifier.to_string(), until);
    }

    pub fn is_blocked(&self, identifier: &str) -> bool {
        let now = self.inner.clock.now();
        let expired = match self.inner.blocked.get(identifier) {
            Some(until) if now < *until => return true,
            Some(_) => true,
            None => false,
        };
        if expired {
            self.inner.blocked.remove(identifier);
        }
        false
    }

    pub fn unblock(&self, identifier: &str) {
        self.inner.blocked.remove(identifier);
    }

    /// Drop expired windows and blocks, returning how many were removed
    pub fn cleanup(&self) -> usize {
        let now = self.inner.clock.now();
        let mut removed = 0;
        self.inner.windows.retain(|_, window| {
            let keep = !window.is_expired(now);
            if !keep {
                removed += 1;
            }
            keep
        });
        self.inner.blocked.retain(|_, until| {
            let keep = now < *until;
            if !keep {
                removed += 1;
            }
            keep
        });
        removed
    }

    pub fn stats(&self) -> RateLimiterStats {
        let mut configured_actions: Vec<String> = self
            .inner
            .action_limits
            .iter()
            .map(|entry| entry.key().clone())
            .chain(self.inner.pair_limits.iter().map(|entry| entry.key().0.clone()))
            .collect();
        configured_actions.sort();
        configured_actions.dedup();

        RateLimiterStats {
            active_windows: self.inner.windows.len(),
            configured_actions,
            blocked_identifiers: self.inner.blocked.len(),
        }
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}
