//! Application State
//!
//! Holds the data-access facade and the configuration it was built from.

use anyhow::Result;
use std::sync::Arc;

use steadfast_core::{DataAccess, PostgresTransport, RpcTransport, Transport};
use steadfast_types::SteadfastConfig;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub(crate) inner: Arc<AppStateInner>,
}

pub struct AppStateInner {
    pub access: Arc<DataAccess>,
    pub config: SteadfastConfig,
}

impl AppState {
    /// Build both transports from config. The primary pool connects lazily, so
    /// the server starts even while the database is down.
    pub async fn from_config(config: SteadfastConfig) -> Result<Self> {
        let postgres = PostgresTransport::connect_lazy(&config.primary)?;
        if let Err(e) = postgres.run_migrations().await {
            tracing::warn!("⚠️ Could not run migrations, primary may be down: {}", e);
        }
        let rpc = RpcTransport::from_config(&config.secondary)?;

        let primary: Arc<dyn Transport> = Arc::new(postgres);
        let secondary: Arc<dyn Transport> = Arc::new(rpc);
        Ok(Self::new_with_components(primary, secondary, config))
    }

    pub fn new_with_components(
        primary: Arc<dyn Transport>,
        secondary: Arc<dyn Transport>,
        config: SteadfastConfig,
    ) -> Self {
        let access = Arc::new(DataAccess::new(primary, secondary, &config));
        Self { inner: Arc::new(AppStateInner { access, config }) }
    }

    pub fn access(&self) -> &Arc<DataAccess> {
        &self.inner.access
    }

    pub fn config(&self) -> &SteadfastConfig {
        &self.inner.config
    }
}
