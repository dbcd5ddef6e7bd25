//! Configuration loading.
//!
//! Configuration is loaded from TOML files with the following resolution order:
//! 1. explicit path (passed by the host service)
//! 2. `~/.tollgate/config.toml` (user)
//! 3. `/etc/tollgate/config.toml` (system)
//!
//! Every section is optional; omitted values take the defaults listed on
//! each field. Per-tier quotas can additionally be overridden from the
//! environment with `FREE_TIER_DAILY_LIMIT`, `PRO_TIER_DAILY_LIMIT` and
//! `BUSINESS_TIER_DAILY_LIMIT`.
//!
//! ```toml
//! [plans.pro]
//! daily_quota = 200
//! backend = "claude"
//!
//! [window]
//! policy = "calendar_day"
//!
//! [cache]
//! max_entries = 1000
//! ttl_secs = 600
//!
//! [burst]
//! per_minute = 30
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::info;

use crate::cache::CacheConfig;
use crate::types::{BackendId, PlanTable, PlanTier};
use crate::usage::{BurstConfig, WindowPolicy};
use crate::{GateError, Result};

/// Gate configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GateConfig {
    #[serde(default)]
    pub plans: PlansConfig,
    #[serde(default)]
    pub window: WindowConfig,
    #[serde(default)]
    pub cache: CacheSection,
    /// Burst limits; absent means no burst limiting.
    #[serde(default)]
    pub burst: Option<BurstConfig>,
}

/// Per-tier overrides of the default plan table.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlansConfig {
    #[serde(default)]
    pub free: Option<PlanConfig>,
    #[serde(default)]
    pub pro: Option<PlanConfig>,
    #[serde(default)]
    pub business: Option<PlanConfig>,
}

impl PlansConfig {
    fn get(&self, tier: PlanTier) -> Option<&PlanConfig> {
        match tier {
            PlanTier::Free => self.free.as_ref(),
            PlanTier::Pro => self.pro.as_ref(),
            PlanTier::Business => self.business.as_ref(),
        }
    }

    fn get_mut(&mut self, tier: PlanTier) -> &mut Option<PlanConfig> {
        match tier {
            PlanTier::Free => &mut self.free,
            PlanTier::Pro => &mut self.pro,
            PlanTier::Business => &mut self.business,
        }
    }
}

/// One tier's overrides. Unset fields keep the tier's default.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlanConfig {
    #[serde(default)]
    pub daily_quota: Option<u32>,
    #[serde(default)]
    pub backend: Option<BackendId>,
}

/// Window policy selector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowKind {
    #[default]
    Fixed,
    CalendarDay,
}

/// Usage window configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct WindowConfig {
    /// "fixed" (default) or "calendar_day".
    #[serde(default)]
    pub policy: WindowKind,
    /// Window length for the fixed policy (default: 86400).
    #[serde(default = "default_window_secs")]
    pub length_secs: u64,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            policy: WindowKind::default(),
            length_secs: default_window_secs(),
        }
    }
}

fn default_window_secs() -> u64 {
    86_400
}

impl WindowConfig {
    /// The validated policy this section describes.
    pub fn policy(&self) -> Result<WindowPolicy> {
        let policy = match self.policy {
            WindowKind::Fixed => WindowPolicy::fixed(Duration::from_secs(self.length_secs)),
            WindowKind::CalendarDay => WindowPolicy::CalendarDay,
        };
        policy.validate()?;
        Ok(policy)
    }
}

/// Response cache configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheSection {
    /// Maximum cached responses (default: 100).
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
    /// Response TTL in seconds (default: 300).
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            max_entries: default_max_entries(),
            ttl_secs: default_ttl_secs(),
        }
    }
}

fn default_max_entries() -> usize {
    100
}

fn default_ttl_secs() -> u64 {
    300
}

impl CacheSection {
    pub fn to_cache_config(&self) -> CacheConfig {
        CacheConfig::new()
            .max_entries(self.max_entries)
            .ttl(Duration::from_secs(self.ttl_secs))
    }
}

/// Tier → environment variable overriding its daily quota.
const QUOTA_ENV_VARS: &[(PlanTier, &str)] = &[
    (PlanTier::Free, "FREE_TIER_DAILY_LIMIT"),
    (PlanTier::Pro, "PRO_TIER_DAILY_LIMIT"),
    (PlanTier::Business, "BUSINESS_TIER_DAILY_LIMIT"),
];

impl GateConfig {
    /// Load configuration from the standard locations, then apply
    /// environment overrides.
    ///
    /// Resolution order:
    /// 1. Explicit path (if provided)
    /// 2. `~/.tollgate/config.toml`
    /// 3. `/etc/tollgate/config.toml`
    ///
    /// With no explicit path and no file in either location, the defaults
    /// are used.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let mut config = match Self::resolve_config_path(explicit_path)? {
            Some(path) => {
                let content = fs::read_to_string(&path).map_err(|e| {
                    GateError::Configuration(format!("Failed to read config file {path:?}: {e}"))
                })?;
                let config: Self = toml::from_str(&content).map_err(|e| {
                    GateError::Configuration(format!("Failed to parse config file {path:?}: {e}"))
                })?;
                info!(path = %path.display(), "loaded gate configuration");
                config
            }
            None => Self::default(),
        };
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Parse a TOML document.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| GateError::Configuration(e.to_string()))
    }

    /// Resolve the config file path.
    fn resolve_config_path(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
        if let Some(path) = explicit {
            if path.exists() {
                return Ok(Some(path.to_path_buf()));
            }
            return Err(GateError::Configuration(format!(
                "Config file not found: {path:?}"
            )));
        }

        // User config
        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".tollgate").join("config.toml");
            if user_config.exists() {
                return Ok(Some(user_config));
            }
        }

        // System config
        let system_config = PathBuf::from("/etc/tollgate/config.toml");
        if system_config.exists() {
            return Ok(Some(system_config));
        }

        Ok(None)
    }

    /// Apply quota overrides from the process environment.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(|name| std::env::var(name).ok())
    }

    /// Apply quota overrides from an arbitrary variable lookup.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        for (tier, var) in QUOTA_ENV_VARS {
            let Some(raw) = lookup(var) else {
                continue;
            };
            let quota: u32 = raw.trim().parse().map_err(|e| {
                GateError::Configuration(format!("{var}={raw:?} is not a valid quota: {e}"))
            })?;
            self.plans
                .get_mut(*tier)
                .get_or_insert_with(PlanConfig::default)
                .daily_quota = Some(quota);
        }
        Ok(())
    }

    /// The plan table: defaults with this configuration's overrides.
    pub fn plan_table(&self) -> PlanTable {
        let defaults = PlanTable::default();
        let mut table = PlanTable::empty();
        for tier in defaults.tiers() {
            let Ok(mut limits) = defaults.get(tier) else {
                continue;
            };
            if let Some(overrides) = self.plans.get(tier) {
                if let Some(quota) = overrides.daily_quota {
                    limits.daily_quota = quota;
                }
                if let Some(backend) = overrides.backend {
                    limits.backend = backend;
                }
            }
            table.set(tier, limits);
        }
        table
    }
}
