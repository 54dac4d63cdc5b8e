//! Application and transport configuration models.

mod app;
mod sections;

pub use app::SteadfastConfig;
pub use sections::{HealthConfig, PrimaryConfig, RetryConfig, SecondaryConfig};
