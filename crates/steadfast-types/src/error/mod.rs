//! Typed error definitions for Steadfast.
//!
//! Two layers of failure exist:
//!
//! - [`TransportError`] describes what went wrong on one concrete transport
//! - [`DataError`] is what callers of the data-access contract observe
//!
//! The router owns the translation between the two, so a transport-level
//! failure on the primary surfaces exactly once as
//! [`DataError::PrimaryUnavailable`].

mod config;
mod data;
mod transport;

pub use config::ConfigError;
pub use data::DataError;
pub use transport::TransportError;

/// Standard Result type for the data-access contract.
pub type DataResult<T> = std::result::Result<T, DataError>;
