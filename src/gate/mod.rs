//! Gate implementations

mod builder;
mod usage_gate;

pub use builder::{Tollgate, TollgateBuilder};
pub use usage_gate::UsageGate;
