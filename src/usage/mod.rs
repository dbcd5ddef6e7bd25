//! Usage metering.
//!
//! - [`UsageMeter`] — per-identity request counters over fixed windows.
//! - [`WindowPolicy`] — when a window opens and when it resets.
//! - [`BurstLimiter`] — short-horizon sliding-window limits keyed on the
//!   client, applied before quota so that floods don't burn a user's daily
//!   allowance.

pub mod burst;
pub mod meter;
pub mod window;

pub use burst::{BurstConfig, BurstDecision, BurstLimiter};
pub use meter::{UsageCounter, UsageMeter};
pub use window::WindowPolicy;
