//! Per-identity usage counters.

use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};

use super::window::WindowPolicy;
use crate::types::Decision;

/// Default number of counter shards.
pub const DEFAULT_SHARDS: usize = 16;

/// Requests counted for one identity in its current window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsageCounter {
    pub window_start: DateTime<Utc>,
    pub count: u32,
}

/// Fixed-window request counters keyed on identity.
///
/// Counters are spread over a fixed number of shards, each behind its own
/// mutex and chosen by hashing the identity. Every operation on an identity
/// runs entirely under its shard's lock, so concurrent requests for the same
/// identity are serialized and no increment is lost. Requests for identities
/// in different shards never contend.
#[derive(Debug)]
pub struct UsageMeter {
    policy: WindowPolicy,
    shards: Vec<Mutex<HashMap<String, UsageCounter>>>,
}

impl UsageMeter {
    /// Create a meter with [`DEFAULT_SHARDS`] shards.
    pub fn new(policy: WindowPolicy) -> Self {
        Self::with_shards(policy, DEFAULT_SHARDS)
    }

    /// Create a meter with a custom shard count (at least one).
    pub fn with_shards(policy: WindowPolicy, shards: usize) -> Self {
        Self {
            policy,
            shards: (0..shards.max(1))
                .map(|_| Mutex::new(HashMap::new()))
                .collect(),
        }
    }

    pub fn policy(&self) -> WindowPolicy {
        self.policy
    }

    /// Count one request for `identity` against `quota`, unless the quota is
    /// already used up in the current window.
    pub fn consume(&self, identity: &str, quota: u32, now: DateTime<Utc>) -> Decision {
        let mut shard = self.shard(identity);
        let counter = shard
            .entry(identity.to_owned())
            .or_insert(UsageCounter {
                window_start: now,
                count: 0,
            });

        if self.policy.is_expired(counter.window_start, now) {
            counter.window_start = now;
            counter.count = 0;
        }

        if counter.count < quota {
            counter.count += 1;
            Decision::Allowed {
                remaining: quota - counter.count,
            }
        } else {
            Decision::Denied {
                quota,
                used: counter.count,
                retry_after: self.policy.retry_after(counter.window_start, now),
            }
        }
    }

    /// The identity's counter in its current window, if it has one.
    ///
    /// An expired counter is reported as absent but left in place; the next
    /// [`consume`](Self::consume) resets it.
    pub fn current(&self, identity: &str, now: DateTime<Utc>) -> Option<UsageCounter> {
        self.shard(identity)
            .get(identity)
            .copied()
            .filter(|counter| !self.policy.is_expired(counter.window_start, now))
    }

    /// Forget an identity's counter. Returns whether one existed.
    pub fn reset(&self, identity: &str) -> bool {
        self.shard(identity).remove(identity).is_some()
    }

    /// Drop every counter whose window has ended. Returns how many were
    /// dropped.
    pub fn sweep_expired(&self, now: DateTime<Utc>) -> usize {
        self.shards
            .iter()
            .map(|shard| {
                let mut shard = shard.lock().unwrap_or_else(PoisonError::into_inner);
                let before = shard.len();
                shard.retain(|_, counter| !self.policy.is_expired(counter.window_start, now));
                before - shard.len()
            })
            .sum()
    }

    /// Number of identities with a counter (expired or not).
    pub fn len(&self) -> usize {
        self.shards
            .iter()
            .map(|shard| shard.lock().unwrap_or_else(PoisonError::into_inner).len())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn shard(&self, identity: &str) -> MutexGuard<'_, HashMap<String, UsageCounter>> {
        let mut hasher = DefaultHasher::new();
        identity.hash(&mut hasher);
        let index = (hasher.finish() % self.shards.len() as u64) as usize;
        // Critical sections never panic midway through a mutation, so a
        // poisoned shard still holds consistent counters.
        self.shards[index]
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;
    use std::time::Duration;

    fn meter() -> UsageMeter {
        UsageMeter::new(WindowPolicy::fixed(Duration::from_secs(3600)))
    }

    #[test]
    fn counts_down_then_denies() {
        let meter = meter();
        let now = Utc::now();
        assert_eq!(meter.consume("u1", 2, now), Decision::Allowed { remaining: 1 });
        assert_eq!(meter.consume("u1", 2, now), Decision::Allowed { remaining: 0 });
        assert!(matches!(
            meter.consume("u1", 2, now),
            Decision::Denied { quota: 2, used: 2, .. }
        ));
        assert_eq!(meter.current("u1", now).unwrap().count, 2);
    }

    #[test]
    fn denial_does_not_count() {
        let meter = meter();
        let now = Utc::now();
        meter.consume("u1", 1, now);
        for _ in 0..5 {
            meter.consume("u1", 1, now);
        }
        assert_eq!(meter.current("u1", now).unwrap().count, 1);
    }

    #[test]
    fn zero_quota_always_denies() {
        let meter = meter();
        assert!(matches!(
            meter.consume("u1", 0, Utc::now()),
            Decision::Denied { quota: 0, used: 0, .. }
        ));
    }

    #[test]
    fn window_resets_once() {
        let meter = meter();
        let t0 = Utc::now();
        meter.consume("u1", 3, t0);
        meter.consume("u1", 3, t0);

        let t1 = t0 + TimeDelta::seconds(3600);
        assert_eq!(meter.consume("u1", 3, t1), Decision::Allowed { remaining: 2 });
        assert_eq!(meter.consume("u1", 3, t1), Decision::Allowed { remaining: 1 });
        assert_eq!(meter.current("u1", t1).unwrap().window_start, t1);
    }

    #[test]
    fn identities_are_independent() {
        let meter = meter();
        let now = Utc::now();
        meter.consume("a", 1, now);
        assert_eq!(meter.consume("b", 1, now), Decision::Allowed { remaining: 0 });
    }

    #[test]
    fn reset_and_sweep() {
        let meter = UsageMeter::with_shards(WindowPolicy::fixed(Duration::from_secs(60)), 4);
        let t0 = Utc::now();
        meter.consume("a", 5, t0);
        meter.consume("b", 5, t0 + TimeDelta::seconds(30));
        assert_eq!(meter.len(), 2);

        assert!(meter.reset("a"));
        assert!(!meter.reset("a"));

        meter.consume("a", 5, t0);
        assert_eq!(meter.sweep_expired(t0 + TimeDelta::seconds(60)), 1);
        assert!(meter.current("b", t0 + TimeDelta::seconds(60)).is_some());
        assert_eq!(meter.len(), 1);
    }

    #[test]
    fn zero_shards_is_clamped() {
        let meter = UsageMeter::with_shards(WindowPolicy::default(), 0);
        assert!(meter.consume("u1", 1, Utc::now()).is_allowed());
    }
}
