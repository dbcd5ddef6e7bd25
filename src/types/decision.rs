//! Outcomes reported by the gate.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{BackendId, PlanTier};

/// Result of a quota check.
///
/// Denial is a normal outcome, not an error: callers branch on it and
/// surface `retry_after` to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Decision {
    /// The request was counted. `remaining` is what is left in the window
    /// after this request.
    Allowed { remaining: u32 },
    /// The quota for the current window is used up. Nothing was counted.
    Denied {
        quota: u32,
        used: u32,
        /// Time until the current window resets.
        retry_after: Duration,
    },
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allowed { .. })
    }

    /// Retry hint for denied decisions.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Decision::Allowed { .. } => None,
            Decision::Denied { retry_after, .. } => Some(*retry_after),
        }
    }
}

/// Which burst horizon rejected a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BurstScope {
    Minute,
    Hour,
}

impl BurstScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            BurstScope::Minute => "minute",
            BurstScope::Hour => "hour",
        }
    }

    /// Length of the sliding window for this horizon.
    pub fn window(&self) -> Duration {
        match self {
            BurstScope::Minute => Duration::from_secs(60),
            BurstScope::Hour => Duration::from_secs(3600),
        }
    }
}

/// Why [`UsageGate::admit`](crate::UsageGate::admit) turned a request away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum Rejection {
    /// Too many requests in a short horizon. Quota was not consumed.
    Burst {
        scope: BurstScope,
        retry_after: Duration,
    },
    /// Plan quota for the current window is used up.
    Quota {
        quota: u32,
        used: u32,
        retry_after: Duration,
    },
}

impl Rejection {
    pub fn retry_after(&self) -> Duration {
        match self {
            Rejection::Burst { retry_after, .. } | Rejection::Quota { retry_after, .. } => {
                *retry_after
            }
        }
    }
}

/// Outcome of the full request gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Admission {
    /// Dispatch to `backend`; `remaining` requests are left in the window.
    Proceed { backend: BackendId, remaining: u32 },
    Rejected(Rejection),
}

impl Admission {
    pub fn is_proceed(&self) -> bool {
        matches!(self, Admission::Proceed { .. })
    }

    pub fn backend(&self) -> Option<BackendId> {
        match self {
            Admission::Proceed { backend, .. } => Some(*backend),
            Admission::Rejected(_) => None,
        }
    }
}

/// Read-only view of an identity's usage in its current window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UsageSnapshot {
    pub plan: PlanTier,
    pub quota: u32,
    pub used: u32,
    pub remaining: u32,
    /// Start of the active window, `None` if the identity has no active one.
    pub window_start: Option<DateTime<Utc>>,
    /// When the active window resets, `None` if there is no active window.
    pub resets_at: Option<DateTime<Utc>>,
}
