//! Session repository for database operations.

use chrono::{DateTime, Duration, Utc};
use rand::{distributions::Alphanumeric, Rng};
use sqlx::{Row, SqlitePool};
use tracing::{debug, info};

use crate::entities::AuthSession;
use crate::types::{DatabaseError, DatabaseResult};

const TOKEN_LENGTH: usize = 48;

/// Repository for session database operations
#[derive(Clone)]
pub struct SessionRepository {
    pool: SqlitePool,
}

impl SessionRepository {
    /// Create a new session repository
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Issue a new session token for a user
    pub async fn issue(&self, user_public_id: &str, ttl: Duration) -> DatabaseResult<AuthSession> {
        let now = Utc::now();
        let expires_at = now.checked_add_signed(ttl).ok_or_else(|| {
            DatabaseError::InvalidInput(format!("session lifetime {ttl} overflows the clock"))
        })?;
        let session = AuthSession {
            token: random_token(),
            user_public_id: user_public_id.to_string(),
            expires_at: expires_at.to_rfc3339(),
            created_at: now.to_rfc3339(),
        };

        sqlx::query(
            "INSERT INTO sessions (token, user_public_id, expires_at, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&session.token)
        .bind(&session.user_public_id)
        .bind(&session.expires_at)
        .bind(&session.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| DatabaseError::from_insert(e, "session"))?;

        info!(user = %user_public_id, expires_at = %session.expires_at, "issued session");
        Ok(session)
    }

    /// Resolve a token to the static id of its owner. Expired sessions resolve to `None`.
    pub async fn resolve_token(&self, token: &str) -> DatabaseResult<Option<String>> {
        let row = sqlx::query("SELECT user_public_id, expires_at FROM sessions WHERE token = ?")
            .bind(token)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        // An unreadable expiry counts as expired.
        let expires_at: String = row.try_get("expires_at")?;
        let live = DateTime::parse_from_rfc3339(&expires_at)
            .is_ok_and(|at| at.with_timezone(&Utc) > Utc::now());

        if !live {
            debug!("rejected expired session token");
            return Ok(None);
        }

        Ok(Some(row.try_get("user_public_id")?))
    }

    /// Remove every session whose expiry has passed. Returns the number removed.
    ///
    /// Expiries are UTC RFC 3339 strings, so they order lexically. Rows whose
    /// expiry is not a timestamp at all go too.
    pub async fn purge_expired(&self) -> DatabaseResult<u64> {
        let removed = sqlx::query(
            "DELETE FROM sessions WHERE expires_at <= ? OR expires_at NOT GLOB '[0-9][0-9][0-9][0-9]-*'",
        )
            .bind(Utc::now().to_rfc3339())
            .execute(&self.pool)
            .await?
            .rows_affected();

        if removed > 0 {
            info!(removed, "purged expired sessions");
        }
        Ok(removed)
    }
}

fn random_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_LENGTH)
        .map(char::from)
        .collect()
}
