//! Data access layer for the chat system.

pub mod chat_repository;
pub mod user_directory;

pub use chat_repository::{ChatStore, SqliteChatRepository};
pub use user_directory::UserDirectory;

#[cfg(test)]
pub use chat_repository::MockChatStore;
#[cfg(test)]
pub use user_directory::MockUserDirectory;
