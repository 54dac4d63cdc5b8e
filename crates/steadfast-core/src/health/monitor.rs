//! Health Monitor implementation.

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use std::sync::Arc;

use steadfast_types::models::config::HealthConfig;
use steadfast_types::{HealthMode, HealthSnapshot};

use super::state::HealthCell;
use crate::metrics;
use crate::transport::{Operation, Transport};

type ProbeFuture = Shared<BoxFuture<'static, bool>>;

/// Health Monitor for the primary transport
pub struct HealthMonitor {
    /// Transport being probed
    primary: Arc<dyn Transport>,
    /// Configuration
    config: HealthConfig,
    /// Current mode and last check time
    cell: HealthCell,
    /// Probe currently running, shared by every caller that asks meanwhile
    in_flight: Mutex<Option<ProbeFuture>>,
    /// Shutdown signal for the periodic probe task
    shutdown_tx: tokio::sync::watch::Sender<bool>,
}

impl HealthMonitor {
    /// Create a new health monitor; the mode starts as `primary-active`
    pub fn new(primary: Arc<dyn Transport>, config: HealthConfig) -> Arc<Self> {
        let (shutdown_tx, _) = tokio::sync::watch::channel(false);

        Arc::new(Self {
            primary,
            config,
            cell: HealthCell::new(),
            in_flight: Mutex::new(None),
            shutdown_tx,
        })
    }

    /// Non-blocking read of the current mode
    pub fn current_mode(&self) -> HealthMode {
        self.cell.mode()
    }

    pub fn snapshot(&self) -> HealthSnapshot {
        HealthSnapshot {
            mode: self.cell.mode(),
            last_checked_at: self.cell.last_checked_at(),
            checking: self.in_flight.lock().is_some(),
        }
    }

    pub fn config(&self) -> &HealthConfig {
        &self.config
    }

    /// Probe the primary and update the mode. Never fails; the outcome is the mode flip.
    ///
    /// A caller arriving while a probe is in flight awaits that probe instead of
    /// starting another. The probe runs on its own task, so it completes and
    /// updates the mode even when every waiter is dropped.
    pub async fn probe(self: &Arc<Self>) -> bool {
        let probe = {
            let mut in_flight = self.in_flight.lock();
            if let Some(probe) = in_flight.as_ref() {
                tracing::debug!("Probe already in flight, joining it");
                probe.clone()
            } else {
                let monitor = Arc::clone(self);
                let task = tokio::spawn(async move {
                    let healthy = monitor.run_probe().await;
                    monitor.in_flight.lock().take();
                    healthy
                });
                let probe = async move {
                    task.await.unwrap_or_else(|err| {
                        tracing::warn!(error = %err, "Probe task ended abnormally");
                        false
                    })
                }
                .boxed()
                .shared();
                *in_flight = Some(probe.clone());
                probe
            }
        };

        probe.await
    }

    /// Operator-triggered probe; returns the outcome so a UI can report it immediately
    pub async fn manual_probe(self: &Arc<Self>) -> bool {
        tracing::info!("Manual health check requested");
        let healthy = self.probe().await;
        tracing::info!(healthy, mode = %self.current_mode(), "Manual health check finished");
        healthy
    }

    /// Start a probe without waiting for it
    pub fn trigger_probe(self: &Arc<Self>) {
        let monitor = Arc::clone(self);
        tokio::spawn(async move {
            monitor.probe().await;
        });
    }

    /// Start the background probe task on the configured cadence
    pub fn start_probe_task(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let monitor = Arc::clone(self);
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let interval = self.config.probe_interval();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = tokio::time::sleep(interval) => {
                        monitor.probe().await;
                    }
                    _ = shutdown_rx.changed() => {
                        tracing::info!("Health monitor probe task shutting down");
                        break;
                    }
                }
            }
        })
    }

    async fn run_probe(&self) -> bool {
        let timeout = self.config.probe_timeout();
        let healthy = match tokio::time::timeout(timeout, self.primary.execute(Operation::Ping)).await {
            Ok(Ok(_)) => true,
            Ok(Err(err)) => {
                tracing::debug!(transport = self.primary.name(), error = %err, "Primary probe failed");
                false
            },
            Err(_) => {
                tracing::debug!(
                    transport = self.primary.name(),
                    timeout_ms = timeout.as_millis() as u64,
                    "Primary probe timed out"
                );
                false
            },
        };

        metrics::record_probe(healthy);
        if let Some((from, to)) = self.cell.record(healthy) {
            metrics::record_mode_transition(to);
            match to {
                HealthMode::FallbackActive => tracing::warn!(
                    from = %from,
                    to = %to,
                    transport = self.primary.name(),
                    "⛔ Primary transport unhealthy, routing to secondary"
                ),
                HealthMode::PrimaryActive => tracing::info!(
                    from = %from,
                    to = %to,
                    transport = self.primary.name(),
                    "✅ Primary transport recovered"
                ),
            }
        }
        healthy
    }

    /// Shutdown the periodic probe task
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }
}

impl Drop for HealthMonitor {
    fn drop(&mut self) {
        self.shutdown();
    }
}
