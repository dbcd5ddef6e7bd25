//! Wall-clock abstraction.
//!
//! Usage windows and cache TTLs are measured against wall-clock time, so the
//! gate reads "now" through the [`Clock`] trait instead of calling
//! [`Utc::now`] directly. Production code uses [`SystemClock`]; tests inject a
//! [`ManualClock`] and advance it explicitly.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

/// Source of the current UTC time.
pub trait Clock: Send + Sync + fmt::Debug {
    fn now(&self) -> DateTime<Utc>;
}

/// The real system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
///
/// Clones share the same underlying instant, so a test can keep one handle
/// and give another to the gate:
///
/// ```rust
/// # use std::sync::Arc;
/// # use std::time::Duration;
/// # use tollgate::clock::{Clock, ManualClock};
/// let clock = ManualClock::new();
/// let shared: Arc<dyn Clock> = Arc::new(clock.clone());
/// let before = shared.now();
/// clock.advance(Duration::from_secs(90));
/// assert_eq!((shared.now() - before).num_seconds(), 90);
/// ```
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    /// Start at the current system time.
    pub fn new() -> Self {
        Self::starting_at(Utc::now())
    }

    /// Start at a fixed instant.
    pub fn starting_at(start: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    /// Move the clock forward.
    ///
    /// # Panics
    ///
    /// Panics if `by` does not fit in a [`TimeDelta`] (hundreds of millions of
    /// years); this is a test utility.
    pub fn advance(&self, by: Duration) {
        let delta = TimeDelta::from_std(by).expect("advance duration out of range");
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now = *now + delta;
    }

    /// Jump to an arbitrary instant (forwards or backwards).
    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) = to;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Time elapsed from `since` to `now`, clamped at zero if the clock stepped
/// backwards.
pub(crate) fn elapsed(since: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    (now - since).to_std().unwrap_or(Duration::ZERO)
}
