//! Sliding-window burst limits.
//!
//! Quota windows are long (a day by default), so on their own they let a
//! client spend a whole allowance in a few seconds. [`BurstLimiter`] caps
//! the request rate per client over a trailing minute and a trailing hour.
//!
//! Each client key keeps the timestamps of its admitted requests from the
//! longest enabled horizon, oldest first. Keys with no recent requests are
//! swept every [`SWEEP_INTERVAL`] so the map does not grow without bound.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::clock::elapsed;
use crate::types::BurstScope;

/// How often stale client keys are swept from the limiter.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(300);

/// Burst limits per client key. A limit of 0 disables that horizon.
///
/// ```rust
/// # use tollgate::BurstConfig;
/// let config = BurstConfig::new().per_minute(30).per_hour(0);
/// assert_eq!(config.per_minute, 30);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct BurstConfig {
    /// Requests allowed in any trailing 60 seconds. Default: 60.
    #[serde(default = "default_per_minute")]
    pub per_minute: u32,
    /// Requests allowed in any trailing hour. Default: 1,000.
    #[serde(default = "default_per_hour")]
    pub per_hour: u32,
}

fn default_per_minute() -> u32 {
    60
}

fn default_per_hour() -> u32 {
    1_000
}

impl Default for BurstConfig {
    fn default() -> Self {
        Self {
            per_minute: default_per_minute(),
            per_hour: default_per_hour(),
        }
    }
}

impl BurstConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the per-minute limit (0 disables).
    pub fn per_minute(mut self, n: u32) -> Self {
        self.per_minute = n;
        self
    }

    /// Set the per-hour limit (0 disables).
    pub fn per_hour(mut self, n: u32) -> Self {
        self.per_hour = n;
        self
    }

    /// Whether any horizon is enabled.
    pub fn is_enabled(&self) -> bool {
        self.per_minute > 0 || self.per_hour > 0
    }

    fn limit(&self, scope: BurstScope) -> u32 {
        match scope {
            BurstScope::Minute => self.per_minute,
            BurstScope::Hour => self.per_hour,
        }
    }

    /// How long timestamps must be kept to answer every enabled horizon.
    fn retention(&self) -> Duration {
        if self.per_hour > 0 {
            BurstScope::Hour.window()
        } else {
            BurstScope::Minute.window()
        }
    }
}

/// Outcome of a burst check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BurstDecision {
    Allowed,
    Limited {
        scope: BurstScope,
        retry_after: Duration,
    },
}

impl BurstDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, BurstDecision::Allowed)
    }
}

#[derive(Debug)]
struct BurstState {
    requests: HashMap<String, VecDeque<DateTime<Utc>>>,
    last_sweep: Option<DateTime<Utc>>,
}

/// Per-client sliding-window rate limiter.
#[derive(Debug)]
pub struct BurstLimiter {
    config: BurstConfig,
    state: Mutex<BurstState>,
}

impl BurstLimiter {
    pub fn new(config: BurstConfig) -> Self {
        Self {
            config,
            state: Mutex::new(BurstState {
                requests: HashMap::new(),
                last_sweep: None,
            }),
        }
    }

    pub fn config(&self) -> BurstConfig {
        self.config
    }

    /// Record a request for `key` if every enabled horizon has room.
    ///
    /// A limited request is not recorded.
    pub fn check(&self, key: &str, now: DateTime<Utc>) -> BurstDecision {
        if !self.config.is_enabled() {
            return BurstDecision::Allowed;
        }
        let retention = self.config.retention();

        let mut guard = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let state = &mut *guard;

        let sweep_due = state
            .last_sweep
            .is_none_or(|last| elapsed(last, now) >= SWEEP_INTERVAL);
        if sweep_due {
            state.requests.retain(|_, stamps| {
                prune(stamps, now, retention);
                !stamps.is_empty()
            });
            state.last_sweep = Some(now);
        }

        let stamps = state.requests.entry(key.to_owned()).or_default();
        prune(stamps, now, retention);

        for scope in [BurstScope::Minute, BurstScope::Hour] {
            let limit = self.config.limit(scope);
            if limit == 0 {
                continue;
            }
            let window = scope.window();
            let first_inside = stamps.partition_point(|t| elapsed(*t, now) >= window);
            if stamps.len() - first_inside >= limit as usize {
                // Room opens up when the oldest request inside the window
                // slides out of it.
                let oldest = stamps[first_inside];
                let retry_after = window.saturating_sub(elapsed(oldest, now));
                return BurstDecision::Limited { scope, retry_after };
            }
        }

        stamps.push_back(now);
        BurstDecision::Allowed
    }

    /// Number of client keys currently tracked.
    pub fn tracked_keys(&self) -> usize {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .requests
            .len()
    }
}

/// Drop timestamps older than `retention` from the front.
fn prune(stamps: &mut VecDeque<DateTime<Utc>>, now: DateTime<Utc>, retention: Duration) {
    while stamps
        .front()
        .is_some_and(|t| elapsed(*t, now) >= retention)
    {
        stamps.pop_front();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    #[test]
    fn per_minute_limit_trips_and_recovers() {
        let limiter = BurstLimiter::new(BurstConfig::new().per_minute(3).per_hour(0));
        let t0 = Utc::now();
        for i in 0..3 {
            assert!(limiter.check("1.2.3.4", t0 + TimeDelta::seconds(i)).is_allowed());
        }
        assert_eq!(
            limiter.check("1.2.3.4", t0 + TimeDelta::seconds(10)),
            BurstDecision::Limited {
                scope: BurstScope::Minute,
                retry_after: Duration::from_secs(50),
            }
        );
        // The first request leaves the window at t0 + 60s.
        assert!(limiter.check("1.2.3.4", t0 + TimeDelta::seconds(60)).is_allowed());
        assert!(!limiter.check("1.2.3.4", t0 + TimeDelta::seconds(60)).is_allowed());
    }

    #[test]
    fn per_hour_limit_applies_after_minute_passes() {
        let limiter = BurstLimiter::new(BurstConfig::new().per_minute(10).per_hour(2));
        let t0 = Utc::now();
        assert!(limiter.check("k", t0).is_allowed());
        assert!(limiter.check("k", t0 + TimeDelta::seconds(120)).is_allowed());
        match limiter.check("k", t0 + TimeDelta::seconds(600)) {
            BurstDecision::Limited { scope, retry_after } => {
                assert_eq!(scope, BurstScope::Hour);
                assert_eq!(retry_after, Duration::from_secs(3000));
            }
            other => panic!("expected hour limit, got {other:?}"),
        }
        assert!(limiter.check("k", t0 + TimeDelta::seconds(3600)).is_allowed());
    }

    #[test]
    fn keys_are_independent() {
        let limiter = BurstLimiter::new(BurstConfig::new().per_minute(1));
        let now = Utc::now();
        assert!(limiter.check("a", now).is_allowed());
        assert!(!limiter.check("a", now).is_allowed());
        assert!(limiter.check("b", now).is_allowed());
    }

    #[test]
    fn disabled_config_always_allows() {
        let limiter = BurstLimiter::new(BurstConfig::new().per_minute(0).per_hour(0));
        let now = Utc::now();
        for _ in 0..100 {
            assert!(limiter.check("k", now).is_allowed());
        }
        assert_eq!(limiter.tracked_keys(), 0);
    }

    #[test]
    fn stale_keys_are_swept() {
        let limiter = BurstLimiter::new(BurstConfig::new().per_minute(5).per_hour(0));
        let t0 = Utc::now();
        limiter.check("a", t0);
        limiter.check("b", t0);
        assert_eq!(limiter.tracked_keys(), 2);

        limiter.check("c", t0 + TimeDelta::seconds(301));
        assert_eq!(limiter.tracked_keys(), 1);
    }
}
