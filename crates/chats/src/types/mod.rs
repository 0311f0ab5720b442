//! Shared types for the chat system.

pub mod errors;
pub mod filter;
pub mod membership;

pub use errors::{ChatError, ChatResult, RepositoryError, RepositoryResult};
pub use filter::ChatFilter;
pub use membership::MembershipChange;
