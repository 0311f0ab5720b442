//! Domain entities for the chat system.

pub mod chat;

pub use chat::{
    ChannelChatDetail, Chat, ChatDetail, ChatId, ChatType, DirectChatDetail, GroupChatDetail,
    RoomChatDetail, Sides, StaticId,
};
