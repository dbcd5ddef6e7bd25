//! Caching subsystem.
//!
//! [`ResponseCache`] holds answers to recently asked questions per identity,
//! bounded in size and age. See the [`response`] module docs for the
//! eviction rules.

pub mod response;

pub use response::{CacheConfig, CacheStats, ResponseCache};
