//! Repository for chat data access operations.

use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::Utc;
use kestrel_database::is_unique_violation;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};
use tracing::{debug, info};

use crate::entities::{
    Chat, ChatDetail, ChatId, ChatType, DirectChatDetail, RoomChatDetail, Sides, StaticId,
};
use crate::types::{ChatFilter, MembershipChange, RepositoryError, RepositoryResult};

const CHAT_COLUMNS: &str = "c.id, c.public_id, c.chat_type, c.title, c.username, c.description, \
                            c.side_low, c.side_high, c.created_at, c.updated_at";

/// Persistence boundary for chats.
///
/// Implementations must be safe to call concurrently and must surface a
/// uniqueness violation on create as [`RepositoryError::Conflict`].
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChatStore: Send + Sync {
    async fn create(&self, chat: &Chat) -> RepositoryResult<Chat>;

    async fn where_(&self, filter: ChatFilter) -> RepositoryResult<Vec<Chat>>;

    /// Apply one membership change on behalf of `actor`, who must still be an
    /// admin when the write runs. Returns the chat as stored afterwards.
    ///
    /// Refuses to leave a room without admins.
    async fn apply_membership(
        &self,
        chat_id: &ChatId,
        actor: &StaticId,
        change: MembershipChange,
    ) -> RepositoryResult<Chat>;

    async fn delete(&self, chat_id: &ChatId) -> RepositoryResult<()>;

    async fn find_by_id(&self, chat_id: &ChatId) -> RepositoryResult<Chat> {
        self.where_(ChatFilter::Id(chat_id.clone()))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| RepositoryError::NotFound(chat_id.to_string()))
    }

    async fn find_by_sides(&self, sides: &Sides) -> RepositoryResult<Chat> {
        self.where_(ChatFilter::Sides(sides.clone()))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| {
                RepositoryError::NotFound(format!("direct chat {} / {}", sides.low(), sides.high()))
            })
    }

    /// Every chat `id` takes part in, plus the chat whose own id is `id`
    async fn find_chat_or_sides_by_static_id(&self, id: &StaticId) -> RepositoryResult<Vec<Chat>> {
        self.where_(ChatFilter::Any(vec![
            ChatFilter::Participant(id.clone()),
            ChatFilter::Id(ChatId::from(id.as_str())),
        ]))
        .await
    }
}

/// SQLite-backed chat store
#[derive(Clone)]
pub struct SqliteChatRepository {
    pool: SqlitePool,
}

impl SqliteChatRepository {
    /// Create a new chat repository
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ChatStore for SqliteChatRepository {
    async fn create(&self, chat: &Chat) -> RepositoryResult<Chat> {
        let (title, username, description) = match chat.room() {
            Some(room) => (
                Some(room.title.as_str()),
                room.username.as_deref(),
                Some(room.description.as_str()),
            ),
            None => (None, None, None),
        };
        let (side_low, side_high) = match chat.sides() {
            Some(sides) => (Some(sides.low().as_str()), Some(sides.high().as_str())),
            None => (None, None),
        };

        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            "INSERT INTO chats (public_id, chat_type, title, username, description, side_low, side_high, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(chat.id().as_str())
        .bind(chat.chat_type().as_str())
        .bind(title)
        .bind(username)
        .bind(description)
        .bind(side_low)
        .bind(side_high)
        .bind(chat.created_at())
        .bind(chat.updated_at())
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                RepositoryError::Conflict(format!("{} chat {}", chat.chat_type(), chat.id()))
            } else {
                RepositoryError::Storage(e)
            }
        })?;

        if let Some(room) = chat.room() {
            insert_members(&mut tx, result.last_insert_rowid(), room).await?;
        }

        tx.commit().await?;

        info!(chat_id = %chat.id(), chat_type = %chat.chat_type(), "created chat");
        Ok(chat.clone())
    }

    async fn where_(&self, filter: ChatFilter) -> RepositoryResult<Vec<Chat>> {
        let mut binds = Vec::new();
        let predicate = filter.to_sql(&mut binds);
        let sql = format!("SELECT {CHAT_COLUMNS} FROM chats c WHERE {predicate} ORDER BY c.id ASC");

        let mut query = sqlx::query(&sql);
        for value in &binds {
            query = query.bind(value.as_str());
        }

        // One read transaction so each chat row and its members come from the same snapshot.
        let mut tx = self.pool.begin().await?;
        let rows = query.fetch_all(&mut *tx).await?;

        let mut chats = Vec::with_capacity(rows.len());
        for row in &rows {
            chats.push(hydrate(&mut tx, row).await?);
        }
        tx.commit().await?;

        debug!(?filter, matched = chats.len(), "queried chats");
        Ok(chats)
    }

    async fn apply_membership(
        &self,
        chat_id: &ChatId,
        actor: &StaticId,
        change: MembershipChange,
    ) -> RepositoryResult<Chat> {
        let mut tx = self.pool.begin().await?;

        // Write first so the transaction holds the write lock for every check below.
        let row_id: Option<i64> = sqlx::query_scalar(
            "UPDATE chats SET updated_at = ? WHERE public_id = ? AND chat_type != 'direct' RETURNING id",
        )
        .bind(Utc::now().to_rfc3339())
        .bind(chat_id.as_str())
        .fetch_optional(&mut *tx)
        .await?;
        let row_id = row_id.ok_or_else(|| RepositoryError::NotFound(chat_id.to_string()))?;

        if member_role(&mut tx, row_id, actor).await? != Some(true) {
            return Err(RepositoryError::Forbidden(format!(
                "{actor} is not an admin of {chat_id}"
            )));
        }

        match &change {
            MembershipChange::Add(member) => {
                sqlx::query(
                    "INSERT OR IGNORE INTO chat_members (chat_id, participant_id, is_admin) VALUES (?, ?, 0)",
                )
                .bind(row_id)
                .bind(member.as_str())
                .execute(&mut *tx)
                .await?;
            }
            MembershipChange::Remove(member) => {
                let removed = sqlx::query(
                    "DELETE FROM chat_members WHERE chat_id = ? AND participant_id = ? \
                     AND (is_admin = 0 OR (SELECT COUNT(*) FROM chat_members WHERE chat_id = ? AND is_admin = 1) > 1)",
                )
                .bind(row_id)
                .bind(member.as_str())
                .bind(row_id)
                .execute(&mut *tx)
                .await?;

                if removed.rows_affected() == 0 {
                    let reason = match member_role(&mut tx, row_id, member).await? {
                        None => format!("{member} is not a member"),
                        Some(_) => "cannot remove the last admin".to_string(),
                    };
                    return Err(RepositoryError::Refused(reason));
                }
            }
            MembershipChange::Promote(member) => {
                let promoted = sqlx::query(
                    "UPDATE chat_members SET is_admin = 1 WHERE chat_id = ? AND participant_id = ?",
                )
                .bind(row_id)
                .bind(member.as_str())
                .execute(&mut *tx)
                .await?;

                if promoted.rows_affected() == 0 {
                    return Err(RepositoryError::Refused(format!(
                        "{member} must be a member before becoming an admin"
                    )));
                }
            }
            MembershipChange::Demote(member) => {
                let demoted = sqlx::query(
                    "UPDATE chat_members SET is_admin = 0 WHERE chat_id = ? AND participant_id = ? AND is_admin = 1 \
                     AND (SELECT COUNT(*) FROM chat_members WHERE chat_id = ? AND is_admin = 1) > 1",
                )
                .bind(row_id)
                .bind(member.as_str())
                .bind(row_id)
                .execute(&mut *tx)
                .await?;

                if demoted.rows_affected() == 0 {
                    let reason = match member_role(&mut tx, row_id, member).await? {
                        Some(true) => "cannot demote the last admin".to_string(),
                        _ => format!("{member} is not an admin"),
                    };
                    return Err(RepositoryError::Refused(reason));
                }
            }
        }

        let sql = format!("SELECT {CHAT_COLUMNS} FROM chats c WHERE c.id = ?");
        let row = sqlx::query(&sql).bind(row_id).fetch_one(&mut *tx).await?;
        let chat = hydrate(&mut tx, &row).await?;

        tx.commit().await?;

        info!(
            chat_id = %chat_id,
            actor = %actor,
            target = %change.target(),
            ?change,
            "applied membership change"
        );
        Ok(chat)
    }

    async fn delete(&self, chat_id: &ChatId) -> RepositoryResult<()> {
        let result = sqlx::query("DELETE FROM chats WHERE public_id = ?")
            .bind(chat_id.as_str())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(chat_id.to_string()));
        }

        info!(chat_id = %chat_id, "deleted chat");
        Ok(())
    }
}

async fn insert_members(
    conn: &mut SqliteConnection,
    row_id: i64,
    room: &RoomChatDetail,
) -> RepositoryResult<()> {
    for member in &room.members {
        sqlx::query("INSERT INTO chat_members (chat_id, participant_id, is_admin) VALUES (?, ?, ?)")
            .bind(row_id)
            .bind(member.as_str())
            .bind(room.admins.contains(member))
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

/// `Some(is_admin)` for a member of the chat, `None` otherwise
async fn member_role(
    conn: &mut SqliteConnection,
    row_id: i64,
    participant: &StaticId,
) -> RepositoryResult<Option<bool>> {
    Ok(sqlx::query_scalar(
        "SELECT is_admin FROM chat_members WHERE chat_id = ? AND participant_id = ?",
    )
    .bind(row_id)
    .bind(participant.as_str())
    .fetch_optional(&mut *conn)
    .await?)
}

async fn hydrate(conn: &mut SqliteConnection, row: &SqliteRow) -> RepositoryResult<Chat> {
    let row_id: i64 = row.try_get("id")?;
    let public_id: String = row.try_get("public_id")?;
    let raw_type: String = row.try_get("chat_type")?;
    let chat_type: ChatType = raw_type
        .parse()
        .map_err(|_| RepositoryError::Corrupt(format!("chat {public_id} has type `{raw_type}`")))?;

    let detail = match chat_type {
        ChatType::Direct => {
            let low: Option<String> = row.try_get("side_low")?;
            let high: Option<String> = row.try_get("side_high")?;
            let (Some(low), Some(high)) = (low, high) else {
                return Err(RepositoryError::Corrupt(format!(
                    "direct chat {public_id} is missing a side"
                )));
            };
            let sides = Sides::new(StaticId::from(low), StaticId::from(high))
                .map_err(|e| RepositoryError::Corrupt(format!("direct chat {public_id}: {e}")))?;
            ChatDetail::Direct(DirectChatDetail { sides })
        }
        ChatType::Group | ChatType::Channel => {
            let member_rows = sqlx::query(
                "SELECT participant_id, is_admin FROM chat_members WHERE chat_id = ? ORDER BY participant_id",
            )
            .bind(row_id)
            .fetch_all(&mut *conn)
            .await?;

            let mut members = BTreeSet::new();
            let mut admins = BTreeSet::new();
            for member in &member_rows {
                let id = StaticId::from(member.try_get::<String, _>("participant_id")?);
                if member.try_get::<bool, _>("is_admin")? {
                    admins.insert(id.clone());
                }
                members.insert(id);
            }

            let room = RoomChatDetail {
                title: row.try_get::<Option<String>, _>("title")?.unwrap_or_default(),
                username: row.try_get("username")?,
                description: row
                    .try_get::<Option<String>, _>("description")?
                    .unwrap_or_default(),
                members,
                admins,
            };

            if chat_type == ChatType::Group {
                ChatDetail::Group(room)
            } else {
                ChatDetail::Channel(room)
            }
        }
    };

    Ok(Chat::restore(
        ChatId::from(public_id),
        detail,
        row.try_get("created_at")?,
        row.try_get("updated_at")?,
    ))
}
