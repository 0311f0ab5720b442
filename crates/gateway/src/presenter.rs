//! Wire representation of chats.

use kestrel_chats::{Chat, ChatDetail};
use serde_json::{json, Value};

/// `{ "event": <event>, "data": <chat> }`
pub fn chat_as_json(event: &str, chat: &Chat) -> Value {
    envelope(event, chat_data(chat))
}

pub fn envelope(event: &str, data: Value) -> Value {
    json!({
        "event": event,
        "data": data,
    })
}

pub fn chat_data(chat: &Chat) -> Value {
    let mut data = json!({
        "id": chat.id(),
        "chat_type": chat.chat_type(),
        "created_at": chat.created_at(),
        "updated_at": chat.updated_at(),
    });

    let detail = match chat.detail() {
        ChatDetail::Direct(direct) => json!({
            "sides": [direct.sides.low(), direct.sides.high()],
        }),
        ChatDetail::Group(room) | ChatDetail::Channel(room) => json!({
            "title": room.title,
            "username": room.username,
            "description": room.description,
            "members": room.members,
            "admins": room.admins,
        }),
    };
    data["chat_detail"] = detail;

    data
}
