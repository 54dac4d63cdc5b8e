//! Configuration sections.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Health probing configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthConfig {
    /// Seconds between scheduled probes of the primary (default: 30)
    pub probe_interval_secs: u64,
    /// Probe deadline in milliseconds; a slower answer counts as a failure (default: 5000)
    pub probe_timeout_ms: u64,
}

impl HealthConfig {
    pub fn probe_interval(&self) -> Duration {
        Duration::from_secs(self.probe_interval_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self { probe_interval_secs: 30, probe_timeout_ms: 5000 }
    }
}

/// Read retry configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total calls per read, including the first (default: 5)
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self { max_attempts: 5, base_delay_ms: 1000, max_delay_ms: 30_000 }
    }
}

/// Primary (PostgreSQL) transport
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrimaryConfig {
    pub database_url: Option<String>,
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
}

impl Default for PrimaryConfig {
    fn default() -> Self {
        Self { database_url: None, max_connections: 10, acquire_timeout_secs: 5 }
    }
}

/// Secondary (RPC over HTTP) transport
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecondaryConfig {
    pub base_url: Option<String>,
    /// Sent as a bearer token when present
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl Default for SecondaryConfig {
    fn default() -> Self {
        Self { base_url: None, api_key: None, timeout_secs: 15 }
    }
}
