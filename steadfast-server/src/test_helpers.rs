//! Test helpers for steadfast-server unit tests.

use std::sync::Arc;

use serde_json::{json, Value};
use steadfast_core::{MemoryStore, MemoryTransport};
use steadfast_types::{Fields, SteadfastConfig, VersionedRecord};

use crate::state::AppState;

pub struct TestApp {
    pub state: AppState,
    pub primary: Arc<MemoryTransport>,
    pub store: Arc<MemoryStore>,
}

pub fn fields(value: Value) -> Fields {
    match value {
        Value::Object(map) => map,
        _ => Fields::new(),
    }
}

/// Create an `AppState` over in-memory transports, seeded with job `J-1` at
/// version 1 and `invoice.total` protected.
pub fn test_app_state() -> TestApp {
    let (primary, secondary, store) = MemoryTransport::pair();
    let mut config = SteadfastConfig::new();
    config.protected_fields.insert("invoice".to_string(), vec!["total".to_string()]);
    store.seed(VersionedRecord::new("job", "J-1", fields(json!({"status": "open"}))));

    let state = AppState::new_with_components(primary.clone(), secondary, config);
    TestApp { state, primary, store }
}
