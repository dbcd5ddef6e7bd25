//! Tollgate - plan-tiered usage metering for LLM chat services
//!
//! A [`UsageGate`] sits between a web handler and the LLM backends. For
//! each request it decides whether the caller may proceed under their
//! plan's quota, which backend serves the plan, and whether a recent answer
//! to the same question can be returned from cache.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use tollgate::{Admission, Fingerprint, PlanTier, Tollgate, UsageGate};
//!
//! # fn main() -> tollgate::Result<()> {
//! // Built once at startup, shared by every handler.
//! let gate: Arc<UsageGate> = Arc::new(Tollgate::builder().build()?);
//!
//! let identity = "user-42";
//! let query = "ふるさと納税の上限は？";
//! let fingerprint = Fingerprint::of(query);
//!
//! if let Some(answer) = gate.get_cached(identity, fingerprint) {
//!     println!("{answer}");
//!     return Ok(());
//! }
//!
//! match gate.admit(identity, PlanTier::Free)? {
//!     Admission::Proceed { backend, remaining } => {
//!         let answer = format!("answer from {backend}");
//!         gate.put_cached(identity, fingerprint, answer);
//!         println!("{remaining} questions left today");
//!     }
//!     Admission::Rejected(rejection) => {
//!         println!("try again in {:?}", rejection.retry_after());
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod gate;
pub mod telemetry;
pub mod types;
pub mod usage;

// Re-export main types at crate root
pub use cache::{CacheConfig, CacheStats, ResponseCache};
pub use config::GateConfig;
pub use error::{GateError, Result};
pub use gate::{Tollgate, TollgateBuilder, UsageGate};
pub use usage::{BurstConfig, WindowPolicy};

// Re-export all types
pub use types::{
    Admission, BackendId, BackendInfo, BurstScope, Decision, Fingerprint, PlanLimits, PlanTable,
    PlanTier, Rejection, UsageSnapshot, estimate_tokens,
};
