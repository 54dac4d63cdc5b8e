use std::sync::Arc;
use std::time::Duration;

use steadfast_types::models::config::HealthConfig;
use steadfast_types::{HealthMode, TransportError};

use crate::health::monitor::HealthMonitor;
use crate::transport::{MemoryTransport, Transport};

fn config() -> HealthConfig {
    HealthConfig { probe_interval_secs: 30, probe_timeout_ms: 5000 }
}

fn monitor_over(primary: &Arc<MemoryTransport>) -> Arc<HealthMonitor> {
    let transport: Arc<dyn Transport> = primary.clone();
    HealthMonitor::new(transport, config())
}

#[tokio::test]
async fn test_starts_primary_active() {
    let (primary, _, _) = MemoryTransport::pair();
    let monitor = monitor_over(&primary);

    let snapshot = monitor.snapshot();
    assert_eq!(snapshot.mode, HealthMode::PrimaryActive);
    assert!(snapshot.last_checked_at.is_none());
    assert!(!snapshot.checking);
    assert_eq!(primary.calls(), 0);
}

#[tokio::test]
async fn test_failed_probe_demotes_and_success_restores() {
    let (primary, _, _) = MemoryTransport::pair();
    let monitor = monitor_over(&primary);

    primary.fail_with(TransportError::Gateway { status: 503, message: "down".to_string() });
    assert!(!monitor.probe().await);
    assert_eq!(monitor.current_mode(), HealthMode::FallbackActive);
    let first_check = monitor.snapshot().last_checked_at;
    assert!(first_check.is_some());

    primary.heal();
    assert!(monitor.probe().await);
    assert_eq!(monitor.current_mode(), HealthMode::PrimaryActive);
    assert!(monitor.snapshot().last_checked_at >= first_check);
}

#[tokio::test]
async fn test_probe_is_idempotent() {
    let (primary, _, _) = MemoryTransport::pair();
    let monitor = monitor_over(&primary);

    assert!(monitor.probe().await);
    assert!(monitor.probe().await);
    assert_eq!(monitor.current_mode(), HealthMode::PrimaryActive);
}

#[tokio::test(start_paused = true)]
async fn test_slow_probe_counts_as_failure() {
    let (primary, _, _) = MemoryTransport::pair();
    let monitor = monitor_over(&primary);

    primary.set_latency(Some(Duration::from_secs(60)));
    assert!(!monitor.probe().await);
    assert_eq!(monitor.current_mode(), HealthMode::FallbackActive);
}

#[tokio::test(start_paused = true)]
async fn test_overlapping_probes_share_one_call() {
    let (primary, _, _) = MemoryTransport::pair();
    let monitor = monitor_over(&primary);
    primary.set_latency(Some(Duration::from_millis(200)));

    let results = futures::future::join_all((0..8).map(|_| monitor.probe())).await;

    assert!(results.iter().all(|healthy| *healthy));
    assert_eq!(primary.calls(), 1);
    assert!(!monitor.snapshot().checking);
}

#[tokio::test(start_paused = true)]
async fn test_checking_flag_while_in_flight() {
    let (primary, _, _) = MemoryTransport::pair();
    let monitor = monitor_over(&primary);
    primary.set_latency(Some(Duration::from_secs(1)));

    let background = {
        let monitor = Arc::clone(&monitor);
        tokio::spawn(async move { monitor.probe().await })
    };
    tokio::task::yield_now().await;
    assert!(monitor.snapshot().checking);

    assert!(background.await.unwrap());
    assert!(!monitor.snapshot().checking);
}

#[tokio::test(start_paused = true)]
async fn test_dropped_caller_does_not_strand_health_check() {
    let (primary, _, _) = MemoryTransport::pair();
    let monitor = monitor_over(&primary);
    primary.set_latency(Some(Duration::from_secs(60)));

    // Caller gives up long before the 5s deadline
    let abandoned = tokio::time::timeout(Duration::from_millis(100), monitor.probe()).await;
    assert!(abandoned.is_err());
    assert!(monitor.snapshot().checking);

    primary.set_latency(None);
    tokio::time::sleep(Duration::from_secs(10)).await;

    // The abandoned check still ran to its deadline and cleared itself
    let snapshot = monitor.snapshot();
    assert!(!snapshot.checking);
    assert_eq!(snapshot.mode, HealthMode::FallbackActive);
    assert!(snapshot.last_checked_at.is_some());

    assert!(monitor.probe().await);
    assert_eq!(monitor.current_mode(), HealthMode::PrimaryActive);
    assert_eq!(primary.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_periodic_probe_flips_mode() {
    let (primary, _, _) = MemoryTransport::pair();
    let monitor = monitor_over(&primary);
    primary.fail_with(TransportError::ConnectionRefused { endpoint: "db:5432".to_string() });

    let task = monitor.start_probe_task();

    tokio::time::sleep(Duration::from_secs(31)).await;
    assert_eq!(monitor.current_mode(), HealthMode::FallbackActive);
    assert_eq!(primary.calls(), 1);

    primary.heal();
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(monitor.current_mode(), HealthMode::PrimaryActive);

    monitor.shutdown();
    task.await.unwrap();
}

#[tokio::test]
async fn test_trigger_probe_runs_out_of_band() {
    let (primary, _, _) = MemoryTransport::pair();
    let monitor = monitor_over(&primary);
    primary.fail_with(TransportError::Timeout { duration_ms: 5000 });

    monitor.trigger_probe();
    // Joins the spawned probe if it is still running, or runs a fresh one
    monitor.probe().await;

    assert_eq!(monitor.current_mode(), HealthMode::FallbackActive);
}

#[tokio::test]
async fn test_manual_probe_reports_outcome() {
    let (primary, _, _) = MemoryTransport::pair();
    let monitor = monitor_over(&primary);

    primary.fail_with(TransportError::Unavailable { message: "pool closed".to_string() });
    assert!(!monitor.manual_probe().await);

    primary.heal();
    assert!(monitor.manual_probe().await);
    assert_eq!(monitor.current_mode(), HealthMode::PrimaryActive);
}
