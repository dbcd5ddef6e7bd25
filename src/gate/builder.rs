//! Builder for configuring gate instances

use std::sync::Arc;

use tracing::info;

use super::UsageGate;
use crate::cache::{CacheConfig, ResponseCache};
use crate::clock::{Clock, SystemClock};
use crate::config::GateConfig;
use crate::types::{PlanLimits, PlanTable, PlanTier};
use crate::usage::meter::DEFAULT_SHARDS;
use crate::usage::{BurstConfig, BurstLimiter, UsageMeter, WindowPolicy};
use crate::{GateError, Result};

/// Main entry point for creating gate instances.
pub struct Tollgate;

impl Tollgate {
    /// Create a new builder for configuring a gate.
    pub fn builder() -> TollgateBuilder {
        TollgateBuilder::new()
    }
}

/// Builder for configuring gate instances.
///
/// ```rust
/// # use std::time::Duration;
/// # use tollgate::{BurstConfig, CacheConfig, PlanTier, Tollgate, UsageGate, WindowPolicy};
/// let gate: UsageGate = Tollgate::builder()
///     .window(WindowPolicy::CalendarDay)
///     .cache(CacheConfig::new().max_entries(500))
///     .burst(BurstConfig::new().per_minute(20))
///     .build()?;
///
/// assert!(gate.check_and_consume("user-1", PlanTier::Free)?.is_allowed());
/// # Ok::<(), tollgate::GateError>(())
/// ```
#[derive(Debug)]
pub struct TollgateBuilder {
    plans: PlanTable,
    window: WindowPolicy,
    cache: CacheConfig,
    burst: Option<BurstConfig>,
    shards: usize,
    clock: Arc<dyn Clock>,
}

impl TollgateBuilder {
    pub fn new() -> Self {
        Self {
            plans: PlanTable::default(),
            window: WindowPolicy::default(),
            cache: CacheConfig::default(),
            burst: None,
            shards: DEFAULT_SHARDS,
            clock: Arc::new(SystemClock),
        }
    }

    /// Start from a loaded configuration file.
    pub fn from_config(config: &GateConfig) -> Result<Self> {
        let mut builder = Self::new()
            .plans(config.plan_table())
            .window(config.window.policy()?)
            .cache(config.cache.to_cache_config());
        if let Some(burst) = config.burst {
            builder = builder.burst(burst);
        }
        Ok(builder)
    }

    /// Replace the whole plan table.
    pub fn plans(mut self, plans: PlanTable) -> Self {
        self.plans = plans;
        self
    }

    /// Set one tier's limits, keeping the others.
    pub fn plan(mut self, tier: PlanTier, limits: PlanLimits) -> Self {
        self.plans.set(tier, limits);
        self
    }

    /// Set the usage window policy (default: fixed 24 hours).
    pub fn window(mut self, policy: WindowPolicy) -> Self {
        self.window = policy;
        self
    }

    /// Configure the response cache (default: 100 entries, 5 minute TTL).
    pub fn cache(mut self, config: CacheConfig) -> Self {
        self.cache = config;
        self
    }

    /// Enable per-client burst limits. Off unless set.
    pub fn burst(mut self, config: BurstConfig) -> Self {
        self.burst = Some(config);
        self
    }

    /// Number of usage counter shards (default: 16).
    pub fn shards(mut self, n: usize) -> Self {
        self.shards = n;
        self
    }

    /// Use a different time source. Tests pass a
    /// [`ManualClock`](crate::clock::ManualClock).
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Build the gate.
    pub fn build<V: Clone>(self) -> Result<UsageGate<V>> {
        if self.plans.is_empty() {
            return Err(GateError::Configuration(
                "at least one plan tier must be configured".to_string(),
            ));
        }
        self.window.validate()?;
        if self.cache.max_entries == 0 {
            return Err(GateError::Configuration(
                "cache max_entries must be greater than zero".to_string(),
            ));
        }
        if self.cache.ttl.is_zero() {
            return Err(GateError::Configuration(
                "cache ttl must be greater than zero".to_string(),
            ));
        }
        if self.shards == 0 {
            return Err(GateError::Configuration(
                "shard count must be greater than zero".to_string(),
            ));
        }

        for tier in self.plans.tiers() {
            let limits = self.plans.get(tier)?;
            info!(
                plan = %tier,
                daily_quota = limits.daily_quota,
                backend = %limits.backend,
                "plan configured"
            );
        }

        let burst = self
            .burst
            .filter(BurstConfig::is_enabled)
            .map(BurstLimiter::new);

        Ok(UsageGate::new(
            self.plans,
            UsageMeter::with_shards(self.window, self.shards),
            burst,
            ResponseCache::new(&self.cache),
            self.clock,
        ))
    }
}

impl Default for TollgateBuilder {
    fn default() -> Self {
        Self::new()
    }
}
