//! Top-level configuration.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::sections::{HealthConfig, PrimaryConfig, RetryConfig, SecondaryConfig};
use crate::error::ConfigError;

/// Full Steadfast configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SteadfastConfig {
    #[serde(default)]
    pub health: HealthConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub primary: PrimaryConfig,
    #[serde(default)]
    pub secondary: SecondaryConfig,
    /// Record type -> fields whose change always needs a justification
    #[serde(default)]
    pub protected_fields: BTreeMap<String, Vec<String>>,
}

impl SteadfastConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject values the runtime cannot operate with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.health.probe_interval_secs == 0 {
            return Err(ConfigError::invalid("health.probe_interval_secs", "must be at least 1"));
        }
        if self.health.probe_timeout_ms == 0 {
            return Err(ConfigError::invalid("health.probe_timeout_ms", "must be at least 1"));
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::invalid("retry.max_attempts", "must be at least 1"));
        }
        if self.retry.base_delay_ms > self.retry.max_delay_ms {
            return Err(ConfigError::invalid(
                "retry.base_delay_ms",
                format!(
                    "{} exceeds retry.max_delay_ms ({})",
                    self.retry.base_delay_ms, self.retry.max_delay_ms
                ),
            ));
        }
        if self.primary.max_connections == 0 {
            return Err(ConfigError::invalid("primary.max_connections", "must be at least 1"));
        }
        Ok(())
    }
}
