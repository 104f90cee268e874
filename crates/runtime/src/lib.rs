use std::sync::Arc;

use anyhow::Result;
use sqlx::SqlitePool;
use tracing::info;

use cybermitra_auth::{Authenticator, LogDelivery, OtpDelivery};
use cybermitra_config::AppConfig;
use cybermitra_database::initialize_database;

pub mod telemetry {
    use anyhow::Result;
    use tracing_subscriber::{fmt::SubscriberBuilder, EnvFilter};

    pub fn init_tracing() -> Result<()> {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        let subscriber = SubscriberBuilder::default()
            .with_env_filter(env_filter)
            .finish();

        tracing::subscriber::set_global_default(subscriber)
            .map_err(|error| anyhow::anyhow!("failed to set tracing subscriber: {error}"))
    }
}

#[derive(Clone)]
pub struct BackendServices {
    pub db_pool: SqlitePool,
    pub authenticator: Authenticator,
}

impl BackendServices {
    pub async fn initialise(config: &AppConfig) -> Result<Self> {
        Self::initialise_with_delivery(config, Arc::new(LogDelivery)).await
    }

    /// Bring up the shared services with a custom OTP transport.
    pub async fn initialise_with_delivery(
        config: &AppConfig,
        delivery: Arc<dyn OtpDelivery>,
    ) -> Result<Self> {
        let db_pool = initialize_database(&config.database).await?;
        let authenticator = Authenticator::new(db_pool.clone(), &config.auth, delivery);

        info!("backend services initialised");

        Ok(Self {
            db_pool,
            authenticator,
        })
    }
}

pub async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::warn!(?error, "failed to listen for shutdown signal");
    }
    info!("shutdown signal received");
}
