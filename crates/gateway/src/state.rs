//! Shared application state for the gateway

use kestrel_chats::ChatService;
use kestrel_config::Environment;
use kestrel_database::SessionRepository;
use sqlx::SqlitePool;

use crate::dispatcher::EventDispatcher;

/// Shared application state handed to every route
#[derive(Clone)]
pub struct GatewayState {
    /// Database connection pool
    pub pool: SqlitePool,
    /// Deployment environment, decides whether bare static ids are accepted
    pub environment: Environment,
    /// Session lookup for connection authentication
    pub sessions: SessionRepository,
    /// Event router shared by all connections
    pub dispatcher: EventDispatcher,
}

impl GatewayState {
    /// Wire the gateway over an initialised pool
    pub fn new(pool: SqlitePool, environment: Environment) -> Self {
        Self {
            sessions: SessionRepository::new(pool.clone()),
            dispatcher: EventDispatcher::new(ChatService::sqlite(pool.clone())),
            pool,
            environment,
        }
    }
}
