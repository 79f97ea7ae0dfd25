//! Runtime configuration for the admission webhooks.
//!
//! Everything here is read once from the environment at startup and shared
//! read-only across requests.

use std::time::Duration;

use tracing::warn;

use crate::error::{Error, Result};

/// Environment variable holding `Gate=bool` pairs in `--feature-gates` syntax
pub const FEATURE_GATES_ENV: &str = "FEATURE_GATES";
/// Environment variable overriding the owner lookup attempt budget
pub const OWNER_LOOKUP_ATTEMPTS_ENV: &str = "OWNER_LOOKUP_ATTEMPTS";
/// Environment variable overriding the per-read timeout, in seconds
pub const OWNER_LOOKUP_TIMEOUT_ENV: &str = "OWNER_LOOKUP_TIMEOUT_SECS";

/// Default number of owner lookup attempts
pub const DEFAULT_OWNER_LOOKUP_ATTEMPTS: u32 = 5;
/// Default timeout of a single owner read
pub const DEFAULT_OWNER_LOOKUP_TIMEOUT: Duration = Duration::from_secs(10);

/// Feature gates that change admission behaviour.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FeatureGates {
    /// Machine pools and every managed (AKS) kind.
    pub machine_pool: bool,
    /// Extended locations on clusters.
    pub edge_zone: bool,
}

impl Default for FeatureGates {
    fn default() -> Self {
        Self {
            machine_pool: true,
            edge_zone: false,
        }
    }
}

impl FeatureGates {
    /// Read gates from [`FEATURE_GATES_ENV`], falling back to defaults when unset.
    pub fn from_env() -> Result<Self> {
        match std::env::var(FEATURE_GATES_ENV) {
            Ok(value) => Self::parse(&value),
            Err(_) => Ok(Self::default()),
        }
    }

    /// Parse `MachinePool=true,EdgeZone=false`. Unknown gates are ignored.
    pub fn parse(value: &str) -> Result<Self> {
        let mut gates = Self::default();
        for pair in value.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let Some((name, enabled)) = pair.split_once('=') else {
                return Err(Error::Config(format!(
                    "invalid feature gate {pair:?}, expected Name=true|false"
                )));
            };
            let enabled: bool = enabled.trim().parse().map_err(|_| {
                Error::Config(format!("invalid value {enabled:?} for feature gate {name}"))
            })?;
            match name.trim() {
                "MachinePool" => gates.machine_pool = enabled,
                "EdgeZone" => gates.edge_zone = enabled,
                other => warn!(gate = %other, "Ignoring unknown feature gate"),
            }
        }
        Ok(gates)
    }
}

/// Configuration shared by every webhook.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WebhookConfig {
    pub feature_gates: FeatureGates,
    /// How many times an owner GET is attempted before giving up.
    pub owner_lookup_attempts: u32,
    /// Deadline for each individual GET.
    pub owner_lookup_timeout: Duration,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            feature_gates: FeatureGates::default(),
            owner_lookup_attempts: DEFAULT_OWNER_LOOKUP_ATTEMPTS,
            owner_lookup_timeout: DEFAULT_OWNER_LOOKUP_TIMEOUT,
        }
    }
}

impl WebhookConfig {
    pub fn from_env() -> Result<Self> {
        let mut config = Self {
            feature_gates: FeatureGates::from_env()?,
            ..Self::default()
        };
        if let Ok(attempts) = std::env::var(OWNER_LOOKUP_ATTEMPTS_ENV) {
            config.owner_lookup_attempts = parse_attempts(&attempts)?;
        }
        if let Ok(secs) = std::env::var(OWNER_LOOKUP_TIMEOUT_ENV) {
            let secs: u64 = secs.trim().parse().map_err(|_| {
                Error::Config(format!("{OWNER_LOOKUP_TIMEOUT_ENV} must be a number of seconds, got {secs:?}"))
            })?;
            config.owner_lookup_timeout = Duration::from_secs(secs);
        }
        Ok(config)
    }

    pub fn with_feature_gates(mut self, feature_gates: FeatureGates) -> Self {
        self.feature_gates = feature_gates;
        self
    }
}

fn parse_attempts(value: &str) -> Result<u32> {
    match value.trim().parse::<u32>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(Error::Config(format!(
            "{OWNER_LOOKUP_ATTEMPTS_ENV} must be a positive integer, got {value:?}"
        ))),
    }
}
