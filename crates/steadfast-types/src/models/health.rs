//! Health mode models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which transport callers should currently be routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HealthMode {
    /// Primary transport answered its last probe
    #[default]
    PrimaryActive,
    /// Primary is degraded; traffic goes to the secondary transport
    FallbackActive,
}

impl HealthMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PrimaryActive => "primary-active",
            Self::FallbackActive => "fallback-active",
        }
    }

    /// The transport this mode routes to.
    pub fn transport(self) -> TransportKind {
        match self {
            Self::PrimaryActive => TransportKind::Primary,
            Self::FallbackActive => TransportKind::Secondary,
        }
    }
}

impl std::fmt::Display for HealthMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The two backing query paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    Primary,
    Secondary,
}

impl TransportKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Secondary => "secondary",
        }
    }
}

impl std::fmt::Display for TransportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time view of the health monitor, for status displays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthSnapshot {
    pub mode: HealthMode,
    /// `None` until the first probe completes
    pub last_checked_at: Option<DateTime<Utc>>,
    /// A probe is currently in flight
    pub checking: bool,
}

impl Default for HealthSnapshot {
    fn default() -> Self {
        Self { mode: HealthMode::PrimaryActive, last_checked_at: None, checking: false }
    }
}
