//! Chat service for managing chat operations.

use std::sync::Arc;

use kestrel_database::UserRepository;
use sqlx::SqlitePool;
use tracing::{debug, info, warn};

use crate::entities::{
    Chat, ChatDetail, ChatId, ChatType, DirectChatDetail, RoomChatDetail, Sides, StaticId,
};
use crate::repositories::{ChatStore, SqliteChatRepository, UserDirectory};
use crate::types::{ChatError, ChatResult, MembershipChange, RepositoryError};
use crate::utils::Validator;

/// Service for managing chat operations
#[derive(Clone)]
pub struct ChatService {
    store: Arc<dyn ChatStore>,
    directory: Arc<dyn UserDirectory>,
}

impl ChatService {
    /// Create a new chat service over the given collaborators
    pub fn new(store: Arc<dyn ChatStore>, directory: Arc<dyn UserDirectory>) -> Self {
        Self { store, directory }
    }

    /// Service backed by SQLite for both chats and users
    pub fn sqlite(pool: SqlitePool) -> Self {
        Self::new(
            Arc::new(SqliteChatRepository::new(pool.clone())),
            Arc::new(UserRepository::new(pool)),
        )
    }

    /// Return the canonical direct chat between `requester` and `username`,
    /// creating it when none exists yet.
    pub async fn get_or_create_chat(
        &self,
        chat_type: ChatType,
        username: &str,
        requester: &StaticId,
    ) -> ChatResult<Chat> {
        if chat_type != ChatType::Direct {
            return Err(ChatError::unsupported(format!(
                "get-or-create is only defined for direct chats, not {chat_type}"
            )));
        }

        let username = Validator::required("username", username)?;
        let target = self.resolve(&username).await?;
        let sides = Sides::new(requester.clone(), target)?;

        match self.store.find_by_sides(&sides).await {
            Ok(chat) => return Ok(chat),
            Err(RepositoryError::NotFound(_)) => {}
            Err(e) => return Err(e.into()),
        }

        let chat = Chat::new(
            ChatType::Direct,
            ChatDetail::Direct(DirectChatDetail {
                sides: sides.clone(),
            }),
        )?;

        match self.store.create(&chat).await {
            Ok(chat) => Ok(chat),
            Err(RepositoryError::Conflict(reason)) => {
                debug!(%reason, "lost direct chat creation race, reading back the winner");
                self.store.find_by_sides(&sides).await.map_err(|e| {
                    warn!(error = %e, "direct chat conflicted but could not be re-read");
                    ChatError::CreationConflict
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Create a group with the creator as admin and one more member
    pub async fn create_group(
        &self,
        creator: &StaticId,
        title: &str,
        username: &str,
        description: &str,
    ) -> ChatResult<Chat> {
        let title = Validator::chat_title(title)?;
        let username = Validator::required("username", username)?;
        let description = Validator::description(description)?;

        let participant = self.resolve(&username).await?;

        let mut detail = RoomChatDetail::founded_by(creator.clone(), title, None, description);
        detail.members.insert(participant);

        let chat = Chat::new(ChatType::Group, ChatDetail::Group(detail))?;
        let chat = self.store.create(&chat).await?;

        info!(chat_id = %chat.id(), creator = %creator, "created group");
        Ok(chat)
    }

    /// Create a public channel owned by the creator
    pub async fn create_channel(
        &self,
        creator: &StaticId,
        title: &str,
        username: &str,
        description: &str,
    ) -> ChatResult<Chat> {
        let title = Validator::chat_title(title)?;
        let username = Validator::channel_username(username)?;
        let description = Validator::description(description)?;

        let detail =
            RoomChatDetail::founded_by(creator.clone(), title, Some(username.clone()), description);
        let chat = Chat::new(ChatType::Channel, ChatDetail::Channel(detail))?;

        let chat = match self.store.create(&chat).await {
            Ok(chat) => chat,
            Err(RepositoryError::Conflict(_)) => return Err(ChatError::UsernameTaken { username }),
            Err(e) => return Err(e.into()),
        };

        info!(chat_id = %chat.id(), creator = %creator, username = %username, "created channel");
        Ok(chat)
    }

    /// List every chat the participant takes part in
    pub async fn list_chats(&self, participant: &StaticId) -> ChatResult<Vec<Chat>> {
        Ok(self.store.find_chat_or_sides_by_static_id(participant).await?)
    }

    /// Get a specific chat the requester belongs to
    pub async fn get_chat(&self, chat_id: &ChatId, requester: &StaticId) -> ChatResult<Chat> {
        let chat = self.load(chat_id).await?;
        if !chat.is_member(requester) {
            return Err(ChatError::permission_denied("not a member of this chat"));
        }
        Ok(chat)
    }

    pub async fn add_member(
        &self,
        chat_id: &ChatId,
        actor: &StaticId,
        username: &str,
    ) -> ChatResult<Chat> {
        let (mut chat, target) = self.prepare_admin_action(chat_id, actor, username).await?;
        chat.add_member(target.clone())?;
        self.apply_membership(chat_id, actor, MembershipChange::Add(target))
            .await
    }

    pub async fn remove_member(
        &self,
        chat_id: &ChatId,
        actor: &StaticId,
        username: &str,
    ) -> ChatResult<Chat> {
        let (mut chat, target) = self.prepare_admin_action(chat_id, actor, username).await?;
        chat.remove_member(&target)?;
        self.apply_membership(chat_id, actor, MembershipChange::Remove(target))
            .await
    }

    pub async fn promote_admin(
        &self,
        chat_id: &ChatId,
        actor: &StaticId,
        username: &str,
    ) -> ChatResult<Chat> {
        let (mut chat, target) = self.prepare_admin_action(chat_id, actor, username).await?;
        chat.promote_admin(target.clone())?;
        self.apply_membership(chat_id, actor, MembershipChange::Promote(target))
            .await
    }

    pub async fn demote_admin(
        &self,
        chat_id: &ChatId,
        actor: &StaticId,
        username: &str,
    ) -> ChatResult<Chat> {
        let (mut chat, target) = self.prepare_admin_action(chat_id, actor, username).await?;
        chat.demote_admin(&target)?;
        self.apply_membership(chat_id, actor, MembershipChange::Demote(target))
            .await
    }

    /// Delete a chat. Rooms need an admin; either side may delete a direct chat.
    pub async fn delete_chat(&self, chat_id: &ChatId, actor: &StaticId) -> ChatResult<ChatId> {
        let chat = self.load(chat_id).await?;

        let allowed = match chat.chat_type() {
            ChatType::Direct => chat.is_member(actor),
            ChatType::Group | ChatType::Channel => chat.is_admin(actor),
        };
        if !allowed {
            return Err(ChatError::permission_denied(
                "only admins or direct participants can delete a chat",
            ));
        }

        self.store.delete(chat.id()).await?;
        info!(chat_id = %chat.id(), actor = %actor, "chat deleted");
        Ok(chat.id().clone())
    }

    async fn prepare_admin_action(
        &self,
        chat_id: &ChatId,
        actor: &StaticId,
        username: &str,
    ) -> ChatResult<(Chat, StaticId)> {
        let username = Validator::required("username", username)?;
        let chat = self.load(chat_id).await?;

        if !chat.is_member(actor) {
            return Err(ChatError::permission_denied("not a member of this chat"));
        }
        if chat.chat_type() == ChatType::Direct {
            return Err(ChatError::unsupported("direct chats have no membership to manage"));
        }
        if !chat.is_admin(actor) {
            return Err(ChatError::permission_denied("only admins can manage members"));
        }

        let target = self.resolve(&username).await?;
        Ok((chat, target))
    }

    /// The store re-checks every precondition inside its write transaction.
    async fn apply_membership(
        &self,
        chat_id: &ChatId,
        actor: &StaticId,
        change: MembershipChange,
    ) -> ChatResult<Chat> {
        Ok(self.store.apply_membership(chat_id, actor, change).await?)
    }

    async fn load(&self, chat_id: &ChatId) -> ChatResult<Chat> {
        Ok(self.store.find_by_id(chat_id).await?)
    }

    async fn resolve(&self, username: &str) -> ChatResult<StaticId> {
        self.directory
            .resolve_username(username)
            .await
            .map_err(ChatError::StorageUnavailable)?
            .ok_or_else(|| ChatError::user_not_found(username))
    }
}
