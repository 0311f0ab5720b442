//! User repository for database operations.

use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::info;

use crate::entities::{CreateUserRequest, User};
use crate::types::{DatabaseError, DatabaseResult};

/// Repository for user database operations
#[derive(Clone)]
pub struct UserRepository {
    pool: SqlitePool,
}

impl UserRepository {
    /// Create a new user repository
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Find user by username. Matching is exact.
    pub async fn find_by_username(&self, username: &str) -> DatabaseResult<Option<User>> {
        let row = sqlx::query(
            "SELECT id, public_id, username, display_name, created_at FROM users WHERE username = ?",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| row_to_user(&row)).transpose()
    }

    /// Create new user with a freshly assigned static id
    pub async fn create(&self, request: &CreateUserRequest) -> DatabaseResult<User> {
        let now = Utc::now().to_rfc3339();
        let public_id = cuid2::create_id();

        let result = sqlx::query(
            "INSERT INTO users (public_id, username, display_name, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&public_id)
        .bind(&request.username)
        .bind(&request.display_name)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(|e| DatabaseError::from_insert(e, "user"))?;

        info!(public_id = %public_id, username = %request.username, "created user");

        Ok(User {
            id: result.last_insert_rowid(),
            public_id,
            username: request.username.clone(),
            display_name: request.display_name.clone(),
            created_at: now,
        })
    }
}

fn row_to_user(row: &SqliteRow) -> DatabaseResult<User> {
    Ok(User {
        id: row.try_get("id")?,
        public_id: row.try_get("public_id")?,
        username: row.try_get("username")?,
        display_name: row.try_get("display_name")?,
        created_at: row.try_get("created_at")?,
    })
}
