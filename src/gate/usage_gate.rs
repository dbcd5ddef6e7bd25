//! UsageGate - the per-request admission, routing, and caching decision

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::cache::{CacheStats, ResponseCache};
use crate::clock::Clock;
use crate::telemetry;
use crate::types::{
    Admission, BackendId, Decision, Fingerprint, PlanTable, PlanTier, Rejection, UsageSnapshot,
};
use crate::usage::{BurstDecision, BurstLimiter, UsageMeter};
use crate::{GateError, Result};

/// Decides, per request, whether it may proceed, which backend serves it,
/// and whether a cached answer can be returned instead.
///
/// Construct one with [`Tollgate::builder()`](crate::Tollgate::builder) at
/// service startup and share it between handlers behind an `Arc`. All
/// methods take `&self`; internal state is synchronized per identity (see
/// [`UsageMeter`]) and per cache (see [`ResponseCache`]). Nothing here
/// blocks on I/O.
///
/// `V` is the cached response payload; the gate never inspects it.
#[derive(Debug)]
pub struct UsageGate<V = String> {
    plans: PlanTable,
    meter: UsageMeter,
    burst: Option<BurstLimiter>,
    cache: ResponseCache<V>,
    clock: Arc<dyn Clock>,
}

impl<V: Clone> UsageGate<V> {
    pub(crate) fn new(
        plans: PlanTable,
        meter: UsageMeter,
        burst: Option<BurstLimiter>,
        cache: ResponseCache<V>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            plans,
            meter,
            burst,
            cache,
            clock,
        }
    }

    /// Count a request for `identity` against its plan's quota.
    ///
    /// Resets the identity's window first if it has ended. Returns
    /// [`Decision::Denied`] (without counting) once the quota is used up.
    ///
    /// # Errors
    ///
    /// [`GateError::Configuration`] if `plan` has no limits configured, and
    /// [`GateError::InvalidInput`] for an empty identity. Neither touches
    /// any counter.
    pub fn check_and_consume(&self, identity: &str, plan: PlanTier) -> Result<Decision> {
        validate_identity(identity)?;
        let limits = self.plans.get(plan)?;
        let decision = self
            .meter
            .consume(identity, limits.daily_quota, self.clock.now());
        record_decision(identity, plan, &decision);
        Ok(decision)
    }

    /// The backend that serves `plan`.
    pub fn select_backend(&self, plan: PlanTier) -> Result<BackendId> {
        Ok(self.plans.get(plan)?.backend)
    }

    /// Run the full request gate: burst limit, then quota, then backend
    /// selection.
    ///
    /// A burst rejection is decided before quota is touched, so it never
    /// costs the user part of their allowance.
    pub fn admit(&self, identity: &str, plan: PlanTier) -> Result<Admission> {
        validate_identity(identity)?;
        let limits = self.plans.get(plan)?;
        let now = self.clock.now();

        if let Some(burst) = &self.burst {
            if let BurstDecision::Limited { scope, retry_after } = burst.check(identity, now) {
                metrics::counter!(telemetry::BURST_REJECTIONS_TOTAL, "scope" => scope.as_str())
                    .increment(1);
                warn!(
                    identity,
                    scope = scope.as_str(),
                    retry_after_secs = retry_after.as_secs(),
                    "burst limit exceeded"
                );
                return Ok(Admission::Rejected(Rejection::Burst { scope, retry_after }));
            }
        }

        let decision = self.meter.consume(identity, limits.daily_quota, now);
        record_decision(identity, plan, &decision);
        Ok(match decision {
            Decision::Allowed { remaining } => Admission::Proceed {
                backend: limits.backend,
                remaining,
            },
            Decision::Denied {
                quota,
                used,
                retry_after,
            } => Admission::Rejected(Rejection::Quota {
                quota,
                used,
                retry_after,
            }),
        })
    }

    /// Usage for `identity` in its current window, without counting
    /// anything.
    pub fn usage(&self, identity: &str, plan: PlanTier) -> Result<UsageSnapshot> {
        validate_identity(identity)?;
        let limits = self.plans.get(plan)?;
        let policy = self.meter.policy();
        let counter = self.meter.current(identity, self.clock.now());
        let used = counter.map_or(0, |c| c.count);
        Ok(UsageSnapshot {
            plan,
            quota: limits.daily_quota,
            used,
            remaining: limits.daily_quota.saturating_sub(used),
            window_start: counter.map(|c| c.window_start),
            resets_at: counter.map(|c| policy.resets_at(c.window_start)),
        })
    }

    /// Fail unless `plan` is at least `minimum`.
    pub fn require_plan(&self, plan: PlanTier, minimum: PlanTier) -> Result<()> {
        if plan.satisfies(minimum) {
            Ok(())
        } else {
            Err(GateError::PlanRequired {
                required: minimum,
                current: plan,
            })
        }
    }

    /// Forget `identity`'s usage, e.g. after a plan change. Returns whether
    /// it had a counter.
    pub fn reset_usage(&self, identity: &str) -> bool {
        self.meter.reset(identity)
    }

    /// Drop usage counters whose windows have ended. Hosts call this
    /// periodically to keep memory proportional to active identities.
    pub fn sweep_expired(&self) -> usize {
        self.meter.sweep_expired(self.clock.now())
    }

    /// A cached response for this identity and request, if one is still
    /// fresh.
    pub fn get_cached(&self, identity: &str, fingerprint: Fingerprint) -> Option<V> {
        self.cache.get(identity, fingerprint, self.clock.now())
    }

    /// Cache a response, evicting the oldest entry if the cache is full.
    pub fn put_cached(&self, identity: &str, fingerprint: Fingerprint, response: V) {
        self.cache
            .insert(identity, fingerprint, response, self.clock.now());
    }

    /// Cache a response with a TTL other than the configured one.
    pub fn put_cached_with_ttl(
        &self,
        identity: &str,
        fingerprint: Fingerprint,
        response: V,
        ttl: Duration,
    ) {
        self.cache
            .insert_with_ttl(identity, fingerprint, response, ttl, self.clock.now());
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Evict every cached response.
    pub fn clear_cache(&self) {
        self.cache.clear();
        debug!("response cache cleared");
    }

    /// The plan table this gate enforces.
    pub fn plans(&self) -> &PlanTable {
        &self.plans
    }
}

fn validate_identity(identity: &str) -> Result<()> {
    if identity.is_empty() {
        return Err(GateError::InvalidInput("identity must not be empty".into()));
    }
    Ok(())
}

fn record_decision(identity: &str, plan: PlanTier, decision: &Decision) {
    match decision {
        Decision::Allowed { remaining } => {
            metrics::counter!(
                telemetry::DECISIONS_TOTAL,
                "plan" => plan.as_str(),
                "outcome" => "allowed"
            )
            .increment(1);
            debug!(identity, %plan, remaining, "request allowed");
        }
        Decision::Denied {
            quota,
            used,
            retry_after,
        } => {
            metrics::counter!(
                telemetry::DECISIONS_TOTAL,
                "plan" => plan.as_str(),
                "outcome" => "denied"
            )
            .increment(1);
            warn!(
                identity,
                %plan,
                quota,
                used,
                retry_after_secs = retry_after.as_secs(),
                "quota exceeded"
            );
        }
    }
}
