//! # Kestrel Chats Crate
//!
//! Chat domain for Kestrel: the chat entity and its invariants, the chat
//! store with its SQLite implementation, username resolution, and the chat
//! service that ties them together.
//!
//! ## Architecture
//!
//! - **Entities**: `Chat`, `ChatDetail`, `Sides` and the id newtypes
//! - **Repositories**: `ChatStore` / `SqliteChatRepository`, `UserDirectory`
//! - **Services**: `ChatService`
//! - **Types**: errors and `ChatFilter`
//!
//! ## Usage
//!
//! ```no_run
//! use kestrel_chats::{ChatService, ChatType, StaticId};
//!
//! # async fn run(pool: sqlx::SqlitePool) -> Result<(), kestrel_chats::ChatError> {
//! let service = ChatService::sqlite(pool);
//! let chat = service
//!     .get_or_create_chat(ChatType::Direct, "bob", &StaticId::from("alice-id"))
//!     .await?;
//! # let _ = chat;
//! # Ok(())
//! # }
//! ```

pub mod entities;
pub mod repositories;
pub mod services;
pub mod types;
pub mod utils;

pub use entities::{
    ChannelChatDetail, Chat, ChatDetail, ChatId, ChatType, DirectChatDetail, GroupChatDetail,
    RoomChatDetail, Sides, StaticId,
};
pub use repositories::{ChatStore, SqliteChatRepository, UserDirectory};
pub use services::ChatService;
pub use types::{
    ChatError, ChatFilter, ChatResult, MembershipChange, RepositoryError, RepositoryResult,
};
