//! Synchronized health state cell.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use steadfast_types::HealthMode;

#[derive(Debug, Clone, Copy)]
struct HealthState {
    mode: HealthMode,
    last_checked_at: Option<DateTime<Utc>>,
}

/// Single-owner cell for the health mode. Only the monitor writes it.
#[derive(Debug)]
pub(crate) struct HealthCell {
    state: RwLock<HealthState>,
}

impl HealthCell {
    pub(crate) fn new() -> Self {
        Self {
            state: RwLock::new(HealthState { mode: HealthMode::PrimaryActive, last_checked_at: None }),
        }
    }

    pub(crate) fn mode(&self) -> HealthMode {
        self.state.read().mode
    }

    pub(crate) fn last_checked_at(&self) -> Option<DateTime<Utc>> {
        self.state.read().last_checked_at
    }

    /// Apply a probe outcome. Returns `(from, to)` when the mode changed.
    pub(crate) fn record(&self, healthy: bool) -> Option<(HealthMode, HealthMode)> {
        let next = if healthy { HealthMode::PrimaryActive } else { HealthMode::FallbackActive };
        let mut state = self.state.write();
        let previous = state.mode;
        state.mode = next;
        state.last_checked_at = Some(Utc::now());
        (previous != next).then_some((previous, next))
    }
}
