//! # Steadfast Core
//!
//! Resilient data access: health-routed transports, optimistic concurrency,
//! and audited conflict resolution.
//!
//! ## Architecture
//!
//! ```text
//! steadfast-core/src/
//! ├── access.rs      # DataAccess facade (read/write/resolve contract)
//! ├── health/        # HealthMonitor: mode cell + single-flight probe
//! ├── router.rs      # TransportRouter: match on mode, one call per transport
//! ├── guard.rs       # ConcurrencyGuard: compare-and-set writes
//! ├── resolution.rs  # ConflictResolver + ConflictSession
//! ├── protected.rs   # Protected field lists
//! ├── retry.rs       # Bounded exponential backoff for reads
//! ├── transport/     # Transport trait + postgres, rpc, memory
//! ├── config.rs      # steadfast.json + STEADFAST_* overrides
//! └── metrics.rs     # Prometheus recorder
//! ```

#![allow(
    clippy::significant_drop_tightening,
    reason = "Lock guards in async code require careful lifetime management"
)]
#![allow(
    clippy::derive_partial_eq_without_eq,
    reason = "Some types intentionally don't implement Eq"
)]
// Test-only lints: allow panic!, unwrap, etc. in test code
#![cfg_attr(
    test,
    allow(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::assertions_on_result_states
    )
)]

pub mod access;
pub mod config;
pub mod guard;
pub mod health;
pub mod metrics;
pub mod protected;
pub mod resolution;
pub mod retry;
pub mod router;
pub mod transport;

// Re-export commonly used types
pub use access::DataAccess;
pub use guard::{CommittedWrite, ConcurrencyGuard, WriteOutcome};
pub use health::HealthMonitor;
pub use protected::ProtectedFields;
pub use resolution::{ConflictResolver, ConflictSession, Decision, Resolution, SessionState};
pub use retry::{with_retry, RetryPolicy, RetryState};
pub use router::TransportRouter;
pub use transport::{
    CasOutcome, ConditionalUpdate, MemoryStore, MemoryTransport, Operation, OperationOutput,
    PostgresTransport, RpcTransport, Transport,
};
