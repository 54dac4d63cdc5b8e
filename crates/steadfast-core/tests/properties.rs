#![allow(unused_crate_dependencies)]
#![allow(clippy::tests_outside_test_module, reason = "integration tests live in tests/ dir")]
#![allow(clippy::expect_used, reason = "panics are the assertion mechanism in integration tests")]

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Barrier;

use serde_json::{json, Value};
use steadfast_core::{DataAccess, Decision, MemoryStore, MemoryTransport, Resolution, WriteOutcome};
use steadfast_types::{
    AuditAction, ConflictDescriptor, DataError, Fields, HealthMode, Query, SteadfastConfig,
    TransportError, VersionedRecord, RESERVED_FIELDS,
};

struct Fixture {
    access: DataAccess,
    primary: Arc<MemoryTransport>,
    secondary: Arc<MemoryTransport>,
    store: Arc<MemoryStore>,
}

fn fields(value: Value) -> Fields {
    match value {
        Value::Object(map) => map,
        _ => Fields::new(),
    }
}

fn fixture() -> Fixture {
    let (primary, secondary, store) = MemoryTransport::pair();
    let access = DataAccess::new(primary.clone(), secondary.clone(), &SteadfastConfig::new());
    store.seed(VersionedRecord::new("job", "J-1", fields(json!({"status": "open", "qty": 2}))));
    Fixture { access, primary, secondary, store }
}

/// Bring J-1 to `version` through ordinary writes.
async fn advance_to(f: &Fixture, version: u64) {
    for expected in 1..version {
        f.access
            .write("job", "J-1", expected, fields(json!({"qty": expected + 2})))
            .await
            .expect("setup write")
            .into_result()
            .expect("setup write landed");
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_single_writer_wins() {
    const WRITERS: usize = 8;
    let f = fixture();
    f.primary.set_latency(Some(Duration::from_millis(20)));
    let access = Arc::new(f.access);
    let barrier = Arc::new(Barrier::new(WRITERS));

    let tasks: Vec<_> = (0..WRITERS)
        .map(|writer| {
            let access = Arc::clone(&access);
            let barrier = Arc::clone(&barrier);
            tokio::spawn(async move {
                barrier.wait().await;
                access.write("job", "J-1", 1, fields(json!({ "status": format!("writer-{}", writer) }))).await
            })
        })
        .collect();

    let mut winners = Vec::new();
    let mut conflicts = Vec::new();
    for task in tasks {
        match task.await.expect("writer task").expect("write") {
            WriteOutcome::Updated(write) => winners.push(write.record.version),
            WriteOutcome::Conflict(descriptor) => conflicts.push(descriptor),
        }
    }

    assert_eq!(winners, vec![2]);
    assert_eq!(conflicts.len(), WRITERS - 1);
    assert!(conflicts.iter().all(|c| c.expected_version == 1 && c.actual_version == 2));
    assert_eq!(f.store.get("job", "J-1").expect("record").version, 2);
}

#[tokio::test]
async fn test_reserved_fields_cannot_be_written() {
    let f = fixture();
    for name in RESERVED_FIELDS {
        let mut changes = Fields::new();
        changes.insert((*name).to_string(), json!(99));
        let err = f.access.write("job", "J-1", 1, changes).await.expect_err("reserved field");
        assert!(matches!(err, DataError::Validation { .. }), "{}: got {:?}", name, err);
    }
    assert_eq!(f.primary.calls(), 0);
    assert_eq!(f.store.get("job", "J-1").expect("record").version, 1);
}

#[tokio::test]
async fn test_version_monotonicity() {
    let f = fixture();
    let mut version = 1;
    for status in ["scheduled", "in-progress", "in-progress", "done"] {
        let write = f
            .access
            .write("job", "J-1", version, fields(json!({ "status": status })))
            .await
            .expect("write")
            .into_result()
            .expect("landed");
        assert_eq!(write.record.version, version + 1);
        version = write.record.version;
    }
    assert_eq!(f.store.get("job", "J-1").expect("record").version, 5);
}

#[tokio::test]
async fn test_fallback_trigger() {
    let f = fixture();
    f.primary.fail_with(TransportError::ConnectionRefused { endpoint: "db:5432".to_string() });

    let err = f.access.write("job", "J-1", 1, fields(json!({"status": "done"}))).await.expect_err("primary down");
    assert!(matches!(err, DataError::PrimaryUnavailable { .. }), "got {:?}", err);

    // Let the triggered probe resolve
    f.access.monitor().probe().await;
    assert_eq!(f.access.current_health_mode().mode, HealthMode::FallbackActive);

    let secondary_before = f.secondary.calls();
    f.access
        .write("job", "J-1", 1, fields(json!({"status": "done"})))
        .await
        .expect("secondary write")
        .into_result()
        .expect("landed");
    assert_eq!(f.secondary.calls(), secondary_before + 1);
}

#[tokio::test]
async fn test_health_recovery() {
    let f = fixture();
    f.primary.fail_with(TransportError::Gateway { status: 503, message: "down".to_string() });
    assert!(!f.access.manual_health_check().await);
    assert_eq!(f.access.current_health_mode().mode, HealthMode::FallbackActive);

    f.primary.heal();
    assert!(f.access.manual_health_check().await);
    assert_eq!(f.access.current_health_mode().mode, HealthMode::PrimaryActive);

    let primary_before = f.primary.calls();
    f.access.read("job", Query::new()).await.expect("read");
    assert_eq!(f.primary.calls(), primary_before + 1);
    assert_eq!(f.secondary.calls(), 0);
}

#[tokio::test]
async fn test_no_silent_overwrite() {
    let f = fixture();
    advance_to(&f, 2).await;
    let descriptor = ConflictDescriptor {
        record_type: "job".to_string(),
        record_id: "J-1".to_string(),
        expected_version: 1,
        actual_version: 2,
    };
    let calls_before = f.primary.calls() + f.secondary.calls();

    let err = f
        .access
        .resolve_conflict(
            "user-b",
            &descriptor,
            Decision::ForceOverwrite { justification: String::new(), changes: fields(json!({"status": "void"})) },
        )
        .await
        .expect_err("empty justification");

    assert!(matches!(err, DataError::Validation { .. }));
    assert!(f.store.audit_entries().is_empty());
    assert_eq!(f.primary.calls() + f.secondary.calls(), calls_before);
    assert_eq!(f.store.get("job", "J-1").expect("record").version, 2);
}

#[tokio::test(start_paused = true)]
async fn test_not_found_is_not_retried() {
    let f = fixture();
    let err = f.access.fetch("job", "J-404").await.expect_err("missing");
    assert!(matches!(err, DataError::NotFound { .. }));
    assert_eq!(f.primary.calls(), 1);
}

#[tokio::test]
async fn test_two_editors_and_a_forced_overwrite() {
    let f = fixture();
    advance_to(&f, 3).await;

    let seen_by_a = f.access.fetch("job", "J-1").await.expect("a reads");
    let seen_by_b = f.access.fetch("job", "J-1").await.expect("b reads");
    assert_eq!(seen_by_a.version, 3);
    assert_eq!(seen_by_b.version, 3);

    let a = f
        .access
        .write("job", "J-1", seen_by_a.version, fields(json!({"status": "done"})))
        .await
        .expect("a writes")
        .into_result()
        .expect("a lands");
    assert_eq!(a.record.version, 4);

    let outcome = f
        .access
        .write("job", "J-1", seen_by_b.version, fields(json!({"status": "cancelled"})))
        .await
        .expect("b writes");
    let WriteOutcome::Conflict(descriptor) = outcome else {
        panic!("b must see a conflict");
    };
    assert_eq!((descriptor.expected_version, descriptor.actual_version), (3, 4));

    let resolution = f
        .access
        .resolve_conflict(
            "user-b",
            &descriptor,
            Decision::ForceOverwrite {
                justification: "confirmed by phone".to_string(),
                changes: fields(json!({"status": "cancelled"})),
            },
        )
        .await
        .expect("overwrite");
    let Resolution::Overwritten { write } = resolution else {
        panic!("expected overwrite");
    };
    assert_eq!(write.record.version, 5);

    let trail = f.access.audit_trail("job", "J-1").await.expect("audit trail");
    assert_eq!(trail.len(), 1);
    assert_eq!(trail[0].action, AuditAction::ForceOverwrite);
    assert_eq!(trail[0].justification, "confirmed by phone");
    assert_eq!(trail[0].actor_id, "user-b");
    assert_eq!(trail[0].old_value, json!({"status": "done"}));
    assert_eq!(trail[0].new_value, json!({"status": "cancelled"}));
}

#[tokio::test(start_paused = true)]
async fn test_timed_out_probes_then_manual_recovery() {
    let f = fixture();
    f.primary.set_latency(Some(Duration::from_secs(60)));
    f.access.start_background_probe();

    // Probes fire at 30s, 65s and 100s; each gives up after 5s
    tokio::time::sleep(Duration::from_secs(106)).await;
    assert_eq!(f.primary.calls(), 3);
    assert_eq!(f.access.current_health_mode().mode, HealthMode::FallbackActive);

    f.primary.set_latency(None);
    assert!(f.access.manual_health_check().await);
    assert_eq!(f.access.current_health_mode().mode, HealthMode::PrimaryActive);

    let primary_before = f.primary.calls();
    f.access.read("job", Query::new()).await.expect("read");
    assert_eq!(f.primary.calls(), primary_before + 1);
    assert_eq!(f.secondary.calls(), 0);

    f.access.shutdown().await;
}
