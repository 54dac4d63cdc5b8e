//! Primary Transport Health Monitoring
//!
//! Answers "is the primary transport usable right now?" without making every
//! caller wait on a fresh probe:
//! - Two-state mode (`primary-active` / `fallback-active`) behind accessors
//! - Single-flight probing: overlapping probes share one in-flight result
//! - Periodic background probe, cancelled on shutdown
//! - Manual probe for operator diagnostics
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  HealthMonitor                                               │
//! │  ├── cell: HealthCell (mode + last_checked_at)               │
//! │  ├── in_flight: Option<Shared<probe future>>                 │
//! │  ├── probe_task: Background task on a fixed cadence          │
//! │  └── primary: Arc<dyn Transport>                             │
//! └─────────────────────────────────────────────────────────────┘
//! ```

mod monitor;
mod state;

#[cfg(test)]
mod tests;

pub use monitor::HealthMonitor;
