//! Identity lookup used to turn usernames into static ids.

use async_trait::async_trait;
use kestrel_database::{DatabaseError, UserRepository};

use crate::entities::StaticId;
use crate::types::{RepositoryError, RepositoryResult};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Resolve an exact username, `None` when no such user exists
    async fn resolve_username(&self, username: &str) -> RepositoryResult<Option<StaticId>>;
}

#[async_trait]
impl UserDirectory for UserRepository {
    async fn resolve_username(&self, username: &str) -> RepositoryResult<Option<StaticId>> {
        let user = self.find_by_username(username).await.map_err(|e| match e {
            DatabaseError::Query(e) => RepositoryError::Storage(e),
            other => RepositoryError::Unavailable(other.to_string()),
        })?;

        Ok(user.map(|user| StaticId::from(user.public_id)))
    }
}
