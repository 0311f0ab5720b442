use anyhow::{Context, Result};
use kestrel_chats::ChatService;
use kestrel_config::{AppConfig, Environment};
use kestrel_database::{initialize_database, SessionRepository, UserRepository};
use kestrel_gateway::GatewayState;
use sqlx::SqlitePool;
use tracing::info;

pub mod telemetry {
    use anyhow::Result;
    use tracing_subscriber::{fmt::SubscriberBuilder, EnvFilter};

    /// Install the global subscriber. `RUST_LOG` overrides the `info` default.
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

/// Everything the server needs, built once from configuration
#[derive(Clone)]
pub struct BackendServices {
    pub db_pool: SqlitePool,
    pub environment: Environment,
    pub users: UserRepository,
    pub sessions: SessionRepository,
    pub chats: ChatService,
}

impl BackendServices {
    pub async fn initialise(config: &AppConfig) -> Result<Self> {
        let db_pool = initialize_database(&config.database)
            .await
            .context("failed to initialise database")?;

        let sessions = SessionRepository::new(db_pool.clone());
        let purged = sessions
            .purge_expired()
            .await
            .context("failed to purge expired sessions")?;

        info!(environment = %config.environment, purged, "backend services ready");

        Ok(Self {
            users: UserRepository::new(db_pool.clone()),
            sessions,
            chats: ChatService::sqlite(db_pool.clone()),
            environment: config.environment,
            db_pool,
        })
    }

    /// State for the HTTP / WebSocket gateway
    pub fn gateway_state(&self) -> GatewayState {
        GatewayState::new(self.db_pool.clone(), self.environment)
    }
}

pub async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::warn!(?error, "failed to listen for shutdown signal");
    }
    info!("shutdown signal received");
}
