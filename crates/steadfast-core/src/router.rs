//! Mode-based dispatch between the primary and secondary transports.
//!
//! One call, one attributable transport: the router never retries and never
//! falls through to the other path within a single call. A transport failure
//! on the primary schedules an out-of-band probe and surfaces as
//! `PrimaryUnavailable`; the next dispatch sees whatever mode the probe left.

use std::sync::Arc;

use steadfast_types::{DataError, DataResult, HealthMode, TransportError, TransportKind};

use crate::health::HealthMonitor;
use crate::metrics;
use crate::transport::{Operation, OperationOutput, Transport};

pub struct TransportRouter {
    primary: Arc<dyn Transport>,
    secondary: Arc<dyn Transport>,
    monitor: Arc<HealthMonitor>,
}

impl TransportRouter {
    pub fn new(
        primary: Arc<dyn Transport>,
        secondary: Arc<dyn Transport>,
        monitor: Arc<HealthMonitor>,
    ) -> Self {
        Self { primary, secondary, monitor }
    }

    pub fn monitor(&self) -> &Arc<HealthMonitor> {
        &self.monitor
    }

    /// Dispatch under the mode the monitor reports right now.
    pub async fn execute(&self, operation: Operation) -> DataResult<OperationOutput> {
        self.execute_with_mode(operation, self.monitor.current_mode()).await
    }

    pub async fn execute_with_mode(
        &self,
        operation: Operation,
        mode: HealthMode,
    ) -> DataResult<OperationOutput> {
        let kind = mode.transport();
        let transport = match kind {
            TransportKind::Primary => &self.primary,
            TransportKind::Secondary => &self.secondary,
        };
        let op_name = operation.name();

        tracing::debug!(transport = transport.name(), operation = op_name, mode = %mode, "Dispatching");
        let result = transport.execute(operation).await;
        metrics::record_routed(kind, op_name, result.is_ok());

        result.map_err(|err| self.classify(kind, transport.name(), op_name, err))
    }

    fn classify(
        &self,
        kind: TransportKind,
        transport_name: &str,
        op_name: &'static str,
        err: TransportError,
    ) -> DataError {
        if err.is_transport_failure() {
            return match kind {
                TransportKind::Primary => {
                    tracing::warn!(
                        transport = transport_name,
                        operation = op_name,
                        error = %err,
                        "Primary call failed, scheduling health probe"
                    );
                    self.monitor.trigger_probe();
                    DataError::PrimaryUnavailable { reason: err.to_string() }
                },
                TransportKind::Secondary => {
                    tracing::warn!(
                        transport = transport_name,
                        operation = op_name,
                        error = %err,
                        "Secondary call failed"
                    );
                    DataError::TransportUnavailable { transport: kind, reason: err.to_string() }
                },
            };
        }

        match err {
            TransportError::NotFound { record_type, record_id } => {
                DataError::NotFound { record_type, record_id }
            },
            TransportError::Duplicate { record_type, record_id } => {
                DataError::validation(format!("{} {} already exists", record_type, record_id))
            },
            other => DataError::Storage { message: format!("{} ({}): {}", transport_name, op_name, other) },
        }
    }
}

/// A transport answered with the wrong output variant.
pub(crate) fn unexpected_output(err: TransportError) -> DataError {
    DataError::Storage { message: err.to_string() }
}
