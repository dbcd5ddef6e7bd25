//! Telemetry metric name constants.
//!
//! Centralised metric names for gate operations. Consumers install their
//! own `metrics` recorder (e.g. prometheus, statsd); without a recorder
//! installed, all metric calls are no-ops.
//!
//! # Metric naming conventions
//!
//! All metrics are prefixed with `tollgate_`. Counters end in `_total`.
//!
//! # Common labels
//!
//! - `plan` — plan tier (e.g. "free", "business")
//! - `outcome` — "allowed" or "denied"
//! - `scope` — burst horizon: "minute" or "hour"
//! - `reason` — cache eviction cause: "expired" or "capacity"

/// Quota decisions made by the gate.
///
/// Labels: `plan`, `outcome` ("allowed" | "denied").
pub const DECISIONS_TOTAL: &str = "tollgate_decisions_total";

/// Requests turned away by the burst limiter.
///
/// Labels: `scope` ("minute" | "hour").
pub const BURST_REJECTIONS_TOTAL: &str = "tollgate_burst_rejections_total";

/// Response cache hits.
pub const CACHE_HITS_TOTAL: &str = "tollgate_cache_hits_total";

/// Response cache misses, including reads that found a stale entry.
pub const CACHE_MISSES_TOTAL: &str = "tollgate_cache_misses_total";

/// Entries removed from the response cache.
///
/// Labels: `reason` ("expired" | "capacity").
pub const CACHE_EVICTIONS_TOTAL: &str = "tollgate_cache_evictions_total";
