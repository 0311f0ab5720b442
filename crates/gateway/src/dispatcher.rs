//! Routes inbound events to chat operations and writes the result back.

use kestrel_chats::{ChatError, ChatService, StaticId};
use serde_json::{json, Map, Value};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, error, warn};

use crate::presenter;
use crate::requests::{
    CreateRoomRequest, DeleteChatRequest, FromPayload, GetOrCreateChatRequest, InboundMessage,
    MembershipRequest, PayloadError,
};

/// Event names understood by the dispatcher
pub mod events {
    pub const GET_OR_CREATE_CHAT: &str = "get_or_create_chat";
    pub const CREATE_GROUP: &str = "create_group";
    pub const CREATE_CHANNEL: &str = "create_channel";
    pub const GET_CHATS: &str = "get_chats";
    pub const ADD_MEMBER: &str = "add_member";
    pub const REMOVE_MEMBER: &str = "remove_member";
    pub const PROMOTE_ADMIN: &str = "promote_admin";
    pub const DEMOTE_ADMIN: &str = "demote_admin";
    pub const DELETE_CHAT: &str = "delete_chat";
}

/// What happened to a single inbound message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// A response was written
    Handled,
    /// The event was known but the payload or the operation failed
    Failed,
    /// No handler for the event name
    Unhandled,
}

/// Destination for responses on one connection. Write failures are ignored.
pub trait ResponseSink: Send + Sync {
    fn write(&self, value: Value);
}

impl ResponseSink for UnboundedSender<Value> {
    fn write(&self, value: Value) {
        // A closed receiver means the connection is gone.
        let _ = self.send(value);
    }
}

enum HandlerError {
    Payload(PayloadError),
    Service(ChatError),
}

impl From<PayloadError> for HandlerError {
    fn from(err: PayloadError) -> Self {
        HandlerError::Payload(err)
    }
}

impl From<ChatError> for HandlerError {
    fn from(err: ChatError) -> Self {
        HandlerError::Service(err)
    }
}

type HandlerResult = Result<Value, HandlerError>;

#[derive(Debug, Clone, Copy)]
enum MembershipEvent {
    Add,
    Remove,
    Promote,
    Demote,
}

/// Stateless event router shared by every connection
#[derive(Clone)]
pub struct EventDispatcher {
    service: ChatService,
}

impl EventDispatcher {
    pub fn new(service: ChatService) -> Self {
        Self { service }
    }

    pub fn service(&self) -> &ChatService {
        &self.service
    }

    /// Handle one message from `static_id`, writing at most one response to `sink`.
    pub async fn dispatch(
        &self,
        message: &InboundMessage,
        static_id: &StaticId,
        sink: &dyn ResponseSink,
    ) -> DispatchOutcome {
        let event = message.event.as_str();
        let data = &message.data;

        let result = match event {
            events::GET_OR_CREATE_CHAT => self.get_or_create_chat(event, data, static_id).await,
            events::CREATE_GROUP => self.create_group(event, data, static_id).await,
            events::CREATE_CHANNEL => self.create_channel(event, data, static_id).await,
            events::GET_CHATS => self.get_chats(event, static_id).await,
            events::ADD_MEMBER => {
                self.manage_membership(event, data, static_id, MembershipEvent::Add)
                    .await
            }
            events::REMOVE_MEMBER => {
                self.manage_membership(event, data, static_id, MembershipEvent::Remove)
                    .await
            }
            events::PROMOTE_ADMIN => {
                self.manage_membership(event, data, static_id, MembershipEvent::Promote)
                    .await
            }
            events::DEMOTE_ADMIN => {
                self.manage_membership(event, data, static_id, MembershipEvent::Demote)
                    .await
            }
            events::DELETE_CHAT => self.delete_chat(event, data, static_id).await,
            _ => {
                debug!(event = %event, static_id = %static_id, "no handler for event");
                return DispatchOutcome::Unhandled;
            }
        };

        match result {
            Ok(response) => {
                sink.write(response);
                DispatchOutcome::Handled
            }
            Err(HandlerError::Payload(e)) => {
                warn!(event = %event, static_id = %static_id, error = %e, "rejected event payload");
                DispatchOutcome::Failed
            }
            Err(HandlerError::Service(e)) if e.is_client_error() => {
                warn!(event = %event, static_id = %static_id, error = %e, "chat operation refused");
                DispatchOutcome::Failed
            }
            Err(HandlerError::Service(e)) => {
                error!(event = %event, static_id = %static_id, error = %e, "chat operation failed");
                DispatchOutcome::Failed
            }
        }
    }

    async fn get_or_create_chat(
        &self,
        event: &str,
        data: &Map<String, Value>,
        static_id: &StaticId,
    ) -> HandlerResult {
        let request = GetOrCreateChatRequest::from_payload(data)?;
        let chat = self
            .service
            .get_or_create_chat(request.chat_type, &request.username, static_id)
            .await?;
        Ok(presenter::chat_as_json(event, &chat))
    }

    async fn create_group(
        &self,
        event: &str,
        data: &Map<String, Value>,
        static_id: &StaticId,
    ) -> HandlerResult {
        let request = CreateRoomRequest::from_payload(data)?;
        let chat = self
            .service
            .create_group(static_id, &request.title, &request.username, &request.description)
            .await?;
        Ok(presenter::chat_as_json(event, &chat))
    }

    async fn create_channel(
        &self,
        event: &str,
        data: &Map<String, Value>,
        static_id: &StaticId,
    ) -> HandlerResult {
        let request = CreateRoomRequest::from_payload(data)?;
        let chat = self
            .service
            .create_channel(static_id, &request.title, &request.username, &request.description)
            .await?;
        Ok(presenter::chat_as_json(event, &chat))
    }

    async fn get_chats(&self, event: &str, static_id: &StaticId) -> HandlerResult {
        let chats = self.service.list_chats(static_id).await?;
        let data: Vec<Value> = chats.iter().map(presenter::chat_data).collect();
        Ok(presenter::envelope(event, Value::Array(data)))
    }

    async fn manage_membership(
        &self,
        event: &str,
        data: &Map<String, Value>,
        static_id: &StaticId,
        kind: MembershipEvent,
    ) -> HandlerResult {
        let MembershipRequest { chat_id, username } = MembershipRequest::from_payload(data)?;
        let service = &self.service;

        let chat = match kind {
            MembershipEvent::Add => service.add_member(&chat_id, static_id, &username).await?,
            MembershipEvent::Remove => {
                service.remove_member(&chat_id, static_id, &username).await?
            }
            MembershipEvent::Promote => {
                service.promote_admin(&chat_id, static_id, &username).await?
            }
            MembershipEvent::Demote => {
                service.demote_admin(&chat_id, static_id, &username).await?
            }
        };
        Ok(presenter::chat_as_json(event, &chat))
    }

    async fn delete_chat(
        &self,
        event: &str,
        data: &Map<String, Value>,
        static_id: &StaticId,
    ) -> HandlerResult {
        let request = DeleteChatRequest::from_payload(data)?;
        let chat_id = self.service.delete_chat(&request.chat_id, static_id).await?;
        Ok(presenter::envelope(event, json!({ "chat_id": chat_id })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kestrel_config::DatabaseConfig;
    use kestrel_database::{initialize_database, CreateUserRequest, UserRepository};
    use sqlx::SqlitePool;
    use tempfile::TempDir;
    use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};

    struct Harness {
        dispatcher: EventDispatcher,
        pool: SqlitePool,
        u1: StaticId,
        u2: StaticId,
        _temp_dir: TempDir,
    }

    async fn harness() -> Harness {
        let temp_dir = TempDir::new().unwrap();
        let config = DatabaseConfig {
            url: format!("sqlite://{}", temp_dir.path().join("gateway.db").display()),
            max_connections: 4,
        };
        let pool = initialize_database(&config).await.unwrap();

        let users = UserRepository::new(pool.clone());
        let mut ids = Vec::new();
        for name in ["u1", "u2", "u3"] {
            let user = users
                .create(&CreateUserRequest {
                    username: name.to_string(),
                    display_name: None,
                })
                .await
                .unwrap();
            ids.push(StaticId::from(user.public_id));
        }

        Harness {
            dispatcher: EventDispatcher::new(ChatService::sqlite(pool.clone())),
            pool,
            u1: ids[0].clone(),
            u2: ids[1].clone(),
            _temp_dir: temp_dir,
        }
    }

    fn message(event: &str, data: Value) -> InboundMessage {
        match data {
            Value::Object(map) => InboundMessage::new(event, map),
            _ => InboundMessage::new(event, Map::new()),
        }
    }

    fn sink() -> (UnboundedSender<Value>, UnboundedReceiver<Value>) {
        unbounded_channel()
    }

    async fn chat_count(pool: &SqlitePool) -> i64 {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM chats")
            .fetch_one(pool)
            .await
            .unwrap();
        count
    }

    #[tokio::test]
    async fn test_unknown_event_is_unhandled() {
        let h = harness().await;
        let (tx, mut rx) = sink();

        let outcome = h
            .dispatcher
            .dispatch(&message("unknown_event", json!({"x": 1})), &h.u1, &tx)
            .await;

        assert_eq!(outcome, DispatchOutcome::Unhandled);
        assert!(rx.try_recv().is_err());
        assert_eq!(chat_count(&h.pool).await, 0);
    }

    #[tokio::test]
    async fn test_missing_field_fails_without_response() {
        let h = harness().await;
        let (tx, mut rx) = sink();

        let outcome = h
            .dispatcher
            .dispatch(
                &message("get_or_create_chat", json!({"chat_type": "direct"})),
                &h.u1,
                &tx,
            )
            .await;

        assert_eq!(outcome, DispatchOutcome::Failed);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_get_or_create_twice_returns_same_chat() {
        let h = harness().await;
        let (tx, mut rx) = sink();
        let request = message(
            "get_or_create_chat",
            json!({"chat_type": "direct", "username": "u2"}),
        );

        assert_eq!(
            h.dispatcher.dispatch(&request, &h.u1, &tx).await,
            DispatchOutcome::Handled
        );
        assert_eq!(
            h.dispatcher.dispatch(&request, &h.u1, &tx).await,
            DispatchOutcome::Handled
        );

        let first = rx.try_recv().unwrap();
        let second = rx.try_recv().unwrap();
        assert_eq!(first["event"], "get_or_create_chat");
        assert_eq!(first["data"]["id"], second["data"]["id"]);
        assert_eq!(chat_count(&h.pool).await, 1);
    }

    #[tokio::test]
    async fn test_create_group_response() {
        let h = harness().await;
        let (tx, mut rx) = sink();

        let outcome = h
            .dispatcher
            .dispatch(
                &message(
                    "create_group",
                    json!({"title": "Team", "username": "u2", "description": "desc"}),
                ),
                &h.u1,
                &tx,
            )
            .await;
        assert_eq!(outcome, DispatchOutcome::Handled);

        let response = rx.try_recv().unwrap();
        assert_eq!(response["event"], "create_group");
        assert_eq!(response["data"]["chat_type"], "group");

        let mut members = vec![h.u1.to_string(), h.u2.to_string()];
        members.sort();
        assert_eq!(response["data"]["chat_detail"]["members"], json!(members));
        assert_eq!(
            response["data"]["chat_detail"]["admins"],
            json!([h.u1.to_string()])
        );
    }

    #[tokio::test]
    async fn test_service_failure_keeps_dispatcher_usable() {
        let h = harness().await;
        let (tx, mut rx) = sink();

        let outcome = h
            .dispatcher
            .dispatch(
                &message(
                    "get_or_create_chat",
                    json!({"chat_type": "direct", "username": "ghost"}),
                ),
                &h.u1,
                &tx,
            )
            .await;
        assert_eq!(outcome, DispatchOutcome::Failed);
        assert!(rx.try_recv().is_err());

        let outcome = h
            .dispatcher
            .dispatch(&message("get_chats", json!({})), &h.u1, &tx)
            .await;
        assert_eq!(outcome, DispatchOutcome::Handled);
        assert_eq!(rx.try_recv().unwrap()["data"], json!([]));
    }

    #[tokio::test]
    async fn test_membership_and_delete_events() {
        let h = harness().await;
        let (tx, mut rx) = sink();

        h.dispatcher
            .dispatch(
                &message(
                    "create_channel",
                    json!({"title": "News", "username": "kestrel_news", "description": "daily"}),
                ),
                &h.u1,
                &tx,
            )
            .await;
        let channel = rx.try_recv().unwrap();
        let chat_id = channel["data"]["id"].as_str().unwrap().to_string();

        let outcome = h
            .dispatcher
            .dispatch(
                &message("add_member", json!({"chat_id": chat_id, "username": "u3"})),
                &h.u1,
                &tx,
            )
            .await;
        assert_eq!(outcome, DispatchOutcome::Handled);
        let added = rx.try_recv().unwrap();
        assert_eq!(added["event"], "add_member");
        assert_eq!(
            added["data"]["chat_detail"]["members"].as_array().unwrap().len(),
            2
        );

        let outcome = h
            .dispatcher
            .dispatch(&message("delete_chat", json!({"chat_id": chat_id})), &h.u2, &tx)
            .await;
        assert_eq!(outcome, DispatchOutcome::Failed);

        let outcome = h
            .dispatcher
            .dispatch(&message("delete_chat", json!({"chat_id": chat_id})), &h.u1, &tx)
            .await;
        assert_eq!(outcome, DispatchOutcome::Handled);
        assert_eq!(
            rx.try_recv().unwrap(),
            json!({"event": "delete_chat", "data": {"chat_id": chat_id}})
        );
        assert_eq!(chat_count(&h.pool).await, 0);
    }

    #[tokio::test]
    async fn test_each_membership_event_applies_its_own_change() {
        let h = harness().await;
        let (tx, mut rx) = sink();

        h.dispatcher
            .dispatch(
                &message(
                    "create_group",
                    json!({"title": "Team", "username": "u2", "description": "desc"}),
                ),
                &h.u1,
                &tx,
            )
            .await;
        let chat_id = rx.try_recv().unwrap()["data"]["id"]
            .as_str()
            .unwrap()
            .to_string();

        let send = |event: &str, username: &str| {
            let request = message(event, json!({"chat_id": chat_id, "username": username}));
            let dispatcher = h.dispatcher.clone();
            let u1 = h.u1.clone();
            let tx = tx.clone();
            async move { dispatcher.dispatch(&request, &u1, &tx).await }
        };

        assert_eq!(send("promote_admin", "u2").await, DispatchOutcome::Handled);
        let promoted = rx.try_recv().unwrap();
        assert_eq!(promoted["event"], "promote_admin");
        assert_eq!(
            promoted["data"]["chat_detail"]["admins"].as_array().unwrap().len(),
            2
        );

        assert_eq!(send("demote_admin", "u2").await, DispatchOutcome::Handled);
        let demoted = rx.try_recv().unwrap();
        assert_eq!(demoted["event"], "demote_admin");
        assert_eq!(
            demoted["data"]["chat_detail"]["admins"],
            json!([h.u1.to_string()])
        );

        assert_eq!(send("remove_member", "u2").await, DispatchOutcome::Handled);
        let removed = rx.try_recv().unwrap();
        assert_eq!(removed["event"], "remove_member");
        assert_eq!(
            removed["data"]["chat_detail"]["members"],
            json!([h.u1.to_string()])
        );
    }
}
