//! Usage window policies.

use std::time::Duration;

use chrono::{DateTime, NaiveDate, TimeDelta, Utc};

use crate::clock::elapsed;
use crate::{GateError, Result};

/// Default window length for [`WindowPolicy::Fixed`]: 24 hours.
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(24 * 3600);

/// How usage windows start and end.
///
/// - [`Fixed`](WindowPolicy::Fixed) (default): a window opens on an
///   identity's first request and lasts `length`. Two users with the same
///   quota get their allowance back at different times of day.
/// - [`CalendarDay`](WindowPolicy::CalendarDay): a window covers one UTC
///   calendar date. Everyone's allowance returns at 00:00 UTC, so a user can
///   spend a full quota at 23:59 and another at 00:00.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowPolicy {
    Fixed { length: Duration },
    CalendarDay,
}

impl Default for WindowPolicy {
    fn default() -> Self {
        WindowPolicy::Fixed {
            length: DEFAULT_WINDOW,
        }
    }
}

impl WindowPolicy {
    /// Fixed window of the given length.
    pub fn fixed(length: Duration) -> Self {
        WindowPolicy::Fixed { length }
    }

    /// Reject policies that could never produce a sane window.
    pub fn validate(&self) -> Result<()> {
        if let WindowPolicy::Fixed { length } = self {
            if length.is_zero() {
                return Err(GateError::Configuration(
                    "window length must be greater than zero".to_string(),
                ));
            }
            if TimeDelta::from_std(*length).is_err() {
                return Err(GateError::Configuration(format!(
                    "window length {length:?} is out of range"
                )));
            }
        }
        Ok(())
    }

    /// Whether a window opened at `start` has ended by `now`.
    ///
    /// A clock that stepped backwards never ends a window.
    pub fn is_expired(&self, start: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        match self {
            WindowPolicy::Fixed { length } => elapsed(start, now) >= *length,
            WindowPolicy::CalendarDay => now.date_naive() > start.date_naive(),
        }
    }

    /// The instant a window opened at `start` ends.
    pub fn resets_at(&self, start: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            WindowPolicy::Fixed { length } => TimeDelta::from_std(*length)
                .ok()
                .and_then(|delta| start.checked_add_signed(delta))
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
            WindowPolicy::CalendarDay => next_midnight(start.date_naive()),
        }
    }

    /// Time from `now` until a window opened at `start` ends, zero if it
    /// already has.
    pub fn retry_after(&self, start: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
        elapsed(now, self.resets_at(start))
    }
}

fn next_midnight(date: NaiveDate) -> DateTime<Utc> {
    date.succ_opt()
        .and_then(|next| next.and_hms_opt(0, 0, 0))
        .map(|midnight| midnight.and_utc())
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
