//! Public types for the Tollgate API.

mod backend;
mod decision;
mod fingerprint;
mod plan;

pub use backend::{BackendId, BackendInfo, estimate_tokens};
pub use decision::{Admission, BurstScope, Decision, Rejection, UsageSnapshot};
pub use fingerprint::Fingerprint;
pub use plan::{PlanLimits, PlanTable, PlanTier};
