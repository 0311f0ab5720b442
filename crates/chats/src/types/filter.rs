//! Typed predicates over stored chats.

use crate::entities::{ChatId, ChatType, Sides, StaticId};

/// Predicate accepted by [`ChatStore::where_`](crate::repositories::ChatStore::where_)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatFilter {
    Id(ChatId),
    Sides(Sides),
    /// Direct side or member of a room
    Participant(StaticId),
    Type(ChatType),
    Username(ChatType, String),
    All(Vec<ChatFilter>),
    Any(Vec<ChatFilter>),
}

impl ChatFilter {
    /// Render the predicate as a SQL fragment over the `chats c` alias, pushing
    /// positional bind values in order.
    pub(crate) fn to_sql(&self, binds: &mut Vec<String>) -> String {
        match self {
            ChatFilter::Id(id) => {
                binds.push(id.to_string());
                "c.public_id = ?".to_string()
            }
            ChatFilter::Sides(sides) => {
                binds.push(ChatType::Direct.as_str().to_string());
                binds.push(sides.low().to_string());
                binds.push(sides.high().to_string());
                "(c.chat_type = ? AND c.side_low = ? AND c.side_high = ?)".to_string()
            }
            ChatFilter::Participant(id) => {
                for _ in 0..3 {
                    binds.push(id.to_string());
                }
                "(c.side_low = ? OR c.side_high = ? OR EXISTS (SELECT 1 FROM chat_members m \
                 WHERE m.chat_id = c.id AND m.participant_id = ?))"
                    .to_string()
            }
            ChatFilter::Type(chat_type) => {
                binds.push(chat_type.as_str().to_string());
                "c.chat_type = ?".to_string()
            }
            ChatFilter::Username(chat_type, username) => {
                binds.push(chat_type.as_str().to_string());
                binds.push(username.clone());
                "(c.chat_type = ? AND c.username = ?)".to_string()
            }
            ChatFilter::All(filters) => join(filters, " AND ", "1 = 1", binds),
            ChatFilter::Any(filters) => join(filters, " OR ", "1 = 0", binds),
        }
    }
}

fn join(filters: &[ChatFilter], separator: &str, empty: &str, binds: &mut Vec<String>) -> String {
    if filters.is_empty() {
        return empty.to_string();
    }
    let parts: Vec<String> = filters.iter().map(|f| f.to_sql(binds)).collect();
    format!("({})", parts.join(separator))
}
