//! Prometheus metrics for data-access observability.
//!
//! - `steadfast_health_probes_total{outcome}` - Counter of primary probes
//! - `steadfast_mode_transitions_total{to}` - Counter of health mode flips
//! - `steadfast_primary_active` - Gauge, 1 while routing to the primary
//! - `steadfast_routed_operations_total{transport,operation,outcome}` - Counter of routed calls
//! - `steadfast_version_conflicts_total{record_type}` - Counter of detected conflicts
//! - `steadfast_audit_entries_total{action}` - Counter of committed audit entries
//! - `steadfast_read_retries_total` - Counter of read retries

use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;

use steadfast_types::{AuditAction, HealthMode, TransportKind};

/// Global Prometheus handle for rendering metrics
static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the Prometheus recorder. Later calls return the same handle.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    if let Some(handle) = PROMETHEUS_HANDLE.get() {
        return Ok(handle.clone());
    }

    let handle = PrometheusBuilder::new().install_recorder()?;

    describe_counter!("steadfast_health_probes_total", "Probes of the primary transport by outcome");
    describe_counter!("steadfast_mode_transitions_total", "Health mode transitions by target mode");
    describe_gauge!("steadfast_primary_active", "1 while operations route to the primary transport");
    describe_counter!(
        "steadfast_routed_operations_total",
        "Operations dispatched by the transport router"
    );
    describe_counter!("steadfast_version_conflicts_total", "Conditional writes rejected as stale");
    describe_counter!("steadfast_audit_entries_total", "Audit entries committed by action");
    describe_counter!("steadfast_read_retries_total", "Read attempts repeated after a transient failure");

    gauge!("steadfast_primary_active").set(1.0);

    Ok(PROMETHEUS_HANDLE.get_or_init(|| handle).clone())
}

/// Render metrics in Prometheus text format.
pub fn render_metrics() -> String {
    PROMETHEUS_HANDLE.get().map(PrometheusHandle::render).unwrap_or_default()
}

pub fn record_probe(healthy: bool) {
    let outcome = if healthy { "success" } else { "failure" };
    counter!("steadfast_health_probes_total", "outcome" => outcome).increment(1);
}

pub fn record_mode_transition(mode: HealthMode) {
    counter!("steadfast_mode_transitions_total", "to" => mode.as_str()).increment(1);
    let active = if mode == HealthMode::PrimaryActive { 1.0 } else { 0.0 };
    gauge!("steadfast_primary_active").set(active);
}

pub fn record_routed(transport: TransportKind, operation: &'static str, success: bool) {
    let outcome = if success { "success" } else { "error" };
    counter!(
        "steadfast_routed_operations_total",
        "transport" => transport.as_str(),
        "operation" => operation,
        "outcome" => outcome
    )
    .increment(1);
}

pub fn record_conflict(record_type: &str) {
    counter!("steadfast_version_conflicts_total", "record_type" => record_type.to_string()).increment(1);
}

pub fn record_audit(action: AuditAction) {
    counter!("steadfast_audit_entries_total", "action" => action.as_str()).increment(1);
}

pub fn record_retry() {
    counter!("steadfast_read_retries_total").increment(1);
}
