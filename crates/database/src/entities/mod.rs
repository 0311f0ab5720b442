//! Entities persisted by the database layer outside of the chat domain

pub mod session;
pub mod user;

pub use session::AuthSession;
pub use user::{CreateUserRequest, User};
