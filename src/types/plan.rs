//! Plan tiers and the unified plan table.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::BackendId;
use crate::{GateError, Result};

/// A subscription level controlling quota and backend access.
///
/// Tiers are ordered: `Free < Pro < Business`. Minimum-plan checks compare
/// with this ordering.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum PlanTier {
    Free,
    Pro,
    Business,
}

impl PlanTier {
    /// All tiers, lowest first.
    pub const ALL: [PlanTier; 3] = [PlanTier::Free, PlanTier::Pro, PlanTier::Business];

    /// Lowercase name as used in configuration and user profiles.
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanTier::Free => "free",
            PlanTier::Pro => "pro",
            PlanTier::Business => "business",
        }
    }

    /// Whether this tier grants access to features gated at `minimum`.
    pub fn satisfies(&self, minimum: PlanTier) -> bool {
        *self >= minimum
    }
}

impl fmt::Display for PlanTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlanTier {
    type Err = GateError;

    /// Parse a plan name case-insensitively. Unknown names are a
    /// configuration error: plan names come from the profile store, not
    /// from end users.
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "free" => Ok(PlanTier::Free),
            "pro" => Ok(PlanTier::Pro),
            "business" => Ok(PlanTier::Business),
            other => Err(GateError::Configuration(format!(
                "unknown plan tier '{other}'"
            ))),
        }
    }
}

/// What a plan tier buys: a quota per window and a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanLimits {
    /// Maximum requests per identity per usage window.
    pub daily_quota: u32,
    /// Downstream model/service for this tier.
    pub backend: BackendId,
}

impl PlanLimits {
    pub fn new(daily_quota: u32, backend: BackendId) -> Self {
        Self {
            daily_quota,
            backend,
        }
    }
}

/// Plan tier → limits lookup.
///
/// One table drives both quota enforcement and backend selection. The
/// default table covers every tier; a hand-built table may leave tiers out,
/// in which case lookups for those tiers fail with
/// [`GateError::Configuration`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanTable {
    entries: HashMap<PlanTier, PlanLimits>,
}

impl PlanTable {
    /// An empty table. Every lookup fails until tiers are added.
    pub fn empty() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Add or replace a tier's limits.
    pub fn with(mut self, tier: PlanTier, limits: PlanLimits) -> Self {
        self.entries.insert(tier, limits);
        self
    }

    /// Add or replace a tier's limits in place.
    pub fn set(&mut self, tier: PlanTier, limits: PlanLimits) {
        self.entries.insert(tier, limits);
    }

    /// Look up a tier's limits.
    pub fn get(&self, tier: PlanTier) -> Result<PlanLimits> {
        self.entries.get(&tier).copied().ok_or_else(|| {
            GateError::Configuration(format!("no limits configured for plan '{tier}'"))
        })
    }

    /// Configured tiers, lowest first.
    pub fn tiers(&self) -> impl Iterator<Item = PlanTier> + '_ {
        PlanTier::ALL
            .into_iter()
            .filter(|tier| self.entries.contains_key(tier))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for PlanTable {
    /// Free: 10/day on Gemini. Pro: 100/day on Gemini. Business: 1000/day
    /// on Claude.
    fn default() -> Self {
        Self::empty()
            .with(PlanTier::Free, PlanLimits::new(10, BackendId::Gemini))
            .with(PlanTier::Pro, PlanLimits::new(100, BackendId::Gemini))
            .with(PlanTier::Business, PlanLimits::new(1000, BackendId::Claude))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tiers_are_ordered() {
        assert!(PlanTier::Free < PlanTier::Pro);
        assert!(PlanTier::Pro < PlanTier::Business);
        assert!(PlanTier::Business.satisfies(PlanTier::Pro));
        assert!(PlanTier::Pro.satisfies(PlanTier::Pro));
        assert!(!PlanTier::Free.satisfies(PlanTier::Pro));
    }

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!("Business".parse::<PlanTier>().unwrap(), PlanTier::Business);
        assert_eq!(" pro ".parse::<PlanTier>().unwrap(), PlanTier::Pro);
    }

    #[test]
    fn parse_unknown_is_configuration_error() {
        let err = "enterprise".parse::<PlanTier>().unwrap_err();
        assert!(matches!(err, GateError::Configuration(_)));
        assert!(err.to_string().contains("enterprise"));
    }

    #[test]
    fn display_round_trips_through_parse() {
        for tier in PlanTier::ALL {
            assert_eq!(tier.to_string().parse::<PlanTier>().unwrap(), tier);
        }
    }

    #[test]
    fn default_table_covers_all_tiers() {
        let table = PlanTable::default();
        assert_eq!(table.tiers().collect::<Vec<_>>(), PlanTier::ALL.to_vec());
        assert_eq!(table.get(PlanTier::Free).unwrap().daily_quota, 10);
        assert_eq!(table.get(PlanTier::Pro).unwrap().daily_quota, 100);
        assert_eq!(table.get(PlanTier::Business).unwrap().daily_quota, 1000);
        assert_eq!(
            table.get(PlanTier::Business).unwrap().backend,
            BackendId::Claude
        );
    }

    #[test]
    fn missing_tier_is_configuration_error() {
        let table = PlanTable::empty().with(PlanTier::Free, PlanLimits::new(5, BackendId::Gemini));
        assert!(table.get(PlanTier::Free).is_ok());
        let err = table.get(PlanTier::Pro).unwrap_err();
        assert!(err.to_string().contains("pro"));
    }
}
