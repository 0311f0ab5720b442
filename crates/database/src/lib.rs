//! Kestrel Database Crate
//!
//! Connection management, embedded migrations, and the user and session
//! repositories. Chat persistence lives in `kestrel-chats`, on top of the pool
//! prepared here.

use kestrel_config::DatabaseConfig;
use sqlx::SqlitePool;

pub mod connection;
pub mod entities;
pub mod migrations;
pub mod repos;
pub mod types;

pub use connection::prepare_database;
pub use migrations::{run_migrations, MIGRATOR};

pub use repos::{SessionRepository, UserRepository};

pub use entities::{AuthSession, CreateUserRequest, User};

pub use types::{is_unique_violation, DatabaseError, DatabaseResult};

/// Initialize the database with migrations
pub async fn initialize_database(config: &DatabaseConfig) -> DatabaseResult<SqlitePool> {
    let pool = prepare_database(config)
        .await
        .map_err(|e| DatabaseError::ConnectionError(format!("{e:#}")))?;

    run_migrations(&pool)
        .await
        .map_err(|e| DatabaseError::MigrationError(format!("{e:#}")))?;

    Ok(pool)
}
