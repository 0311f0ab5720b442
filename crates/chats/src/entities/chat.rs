use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::types::{ChatError, ChatResult};

/// Server-assigned, immutable chat identifier
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChatId(String);

impl ChatId {
    /// Assign a fresh identifier
    pub fn generate() -> Self {
        Self(cuid2::create_id())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for ChatId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for ChatId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity of an authenticated participant, supplied by the transport
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StaticId(String);

impl StaticId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for StaticId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for StaticId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for StaticId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Chat type enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatType {
    Direct,
    Group,
    Channel,
}

impl ChatType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatType::Direct => "direct",
            ChatType::Group => "group",
            ChatType::Channel => "channel",
        }
    }
}

impl FromStr for ChatType {
    type Err = ChatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "direct" => Ok(ChatType::Direct),
            "group" => Ok(ChatType::Group),
            "channel" => Ok(ChatType::Channel),
            other => Err(ChatError::validation(format!("unknown chat type `{other}`"))),
        }
    }
}

impl fmt::Display for ChatType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unordered pair of two distinct participants, stored low/high.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Sides {
    low: StaticId,
    high: StaticId,
}

impl Sides {
    pub fn new(a: StaticId, b: StaticId) -> ChatResult<Self> {
        match a.cmp(&b) {
            std::cmp::Ordering::Less => Ok(Self { low: a, high: b }),
            std::cmp::Ordering::Greater => Ok(Self { low: b, high: a }),
            std::cmp::Ordering::Equal => Err(ChatError::validation(
                "a direct chat needs two distinct participants",
            )),
        }
    }

    pub fn low(&self) -> &StaticId {
        &self.low
    }

    pub fn high(&self) -> &StaticId {
        &self.high
    }

    pub fn contains(&self, id: &StaticId) -> bool {
        &self.low == id || &self.high == id
    }

    /// The side that is not `id`, if `id` is one of the two
    pub fn other(&self, id: &StaticId) -> Option<&StaticId> {
        if &self.low == id {
            Some(&self.high)
        } else if &self.high == id {
            Some(&self.low)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectChatDetail {
    pub sides: Sides,
}

/// Shared shape of group and channel chats
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomChatDetail {
    pub title: String,
    pub username: Option<String>,
    pub description: String,
    pub members: BTreeSet<StaticId>,
    pub admins: BTreeSet<StaticId>,
}

pub type GroupChatDetail = RoomChatDetail;
pub type ChannelChatDetail = RoomChatDetail;

impl RoomChatDetail {
    /// Detail whose creator is the first member and admin
    pub fn founded_by(
        creator: StaticId,
        title: impl Into<String>,
        username: Option<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            username,
            description: description.into(),
            members: BTreeSet::from([creator.clone()]),
            admins: BTreeSet::from([creator]),
        }
    }
}

/// Type-specific chat payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatDetail {
    Direct(DirectChatDetail),
    Group(GroupChatDetail),
    Channel(ChannelChatDetail),
}

impl ChatDetail {
    pub fn chat_type(&self) -> ChatType {
        match self {
            ChatDetail::Direct(_) => ChatType::Direct,
            ChatDetail::Group(_) => ChatType::Group,
            ChatDetail::Channel(_) => ChatType::Channel,
        }
    }
}

/// Represents a conversation between participants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chat {
    id: ChatId,
    chat_type: ChatType,
    detail: ChatDetail,
    created_at: String,
    updated_at: String,
}

impl Chat {
    /// Build a new chat, checking the detail against the declared type.
    pub fn new(chat_type: ChatType, detail: ChatDetail) -> ChatResult<Self> {
        if detail.chat_type() != chat_type {
            return Err(ChatError::validation(format!(
                "{} detail cannot back a {chat_type} chat",
                detail.chat_type()
            )));
        }

        if let ChatDetail::Group(room) | ChatDetail::Channel(room) = &detail {
            if room.members.is_empty() || room.admins.is_empty() {
                return Err(ChatError::validation(
                    "a chat needs at least one member and one admin",
                ));
            }
            if !room.admins.is_subset(&room.members) {
                return Err(ChatError::validation("every admin must also be a member"));
            }
        }

        let now = Utc::now().to_rfc3339();
        Ok(Self {
            id: ChatId::generate(),
            chat_type,
            detail,
            created_at: now.clone(),
            updated_at: now,
        })
    }

    /// Rebuild a chat read back from storage
    pub(crate) fn restore(
        id: ChatId,
        detail: ChatDetail,
        created_at: String,
        updated_at: String,
    ) -> Self {
        Self {
            id,
            chat_type: detail.chat_type(),
            detail,
            created_at,
            updated_at,
        }
    }

    pub fn id(&self) -> &ChatId {
        &self.id
    }

    pub fn chat_type(&self) -> ChatType {
        self.chat_type
    }

    pub fn detail(&self) -> &ChatDetail {
        &self.detail
    }

    pub fn created_at(&self) -> &str {
        &self.created_at
    }

    pub fn updated_at(&self) -> &str {
        &self.updated_at
    }

    pub fn sides(&self) -> Option<&Sides> {
        match &self.detail {
            ChatDetail::Direct(direct) => Some(&direct.sides),
            _ => None,
        }
    }

    pub fn room(&self) -> Option<&RoomChatDetail> {
        match &self.detail {
            ChatDetail::Group(room) | ChatDetail::Channel(room) => Some(room),
            ChatDetail::Direct(_) => None,
        }
    }

    /// Everyone taking part, both sides for a direct chat
    pub fn participants(&self) -> BTreeSet<StaticId> {
        match &self.detail {
            ChatDetail::Direct(direct) => {
                BTreeSet::from([direct.sides.low().clone(), direct.sides.high().clone()])
            }
            ChatDetail::Group(room) | ChatDetail::Channel(room) => room.members.clone(),
        }
    }

    /// Direct chats count both sides as members.
    pub fn is_member(&self, id: &StaticId) -> bool {
        match &self.detail {
            ChatDetail::Direct(direct) => direct.sides.contains(id),
            ChatDetail::Group(room) | ChatDetail::Channel(room) => room.members.contains(id),
        }
    }

    /// Direct chats have no admins.
    pub fn is_admin(&self, id: &StaticId) -> bool {
        self.room().is_some_and(|room| room.admins.contains(id))
    }

    /// Add a participant. Adding an existing member is a no-op.
    pub fn add_member(&mut self, id: StaticId) -> ChatResult<()> {
        let room = self.room_mut("add members to")?;
        if room.members.insert(id) {
            self.touch();
        }
        Ok(())
    }

    /// Remove a participant along with any admin status.
    pub fn remove_member(&mut self, id: &StaticId) -> ChatResult<()> {
        let room = self.room_mut("remove members from")?;
        if !room.members.contains(id) {
            return Err(ChatError::validation(format!("{id} is not a member")));
        }
        if room.admins.contains(id) && room.admins.len() == 1 {
            return Err(ChatError::validation("cannot remove the last admin"));
        }
        room.members.remove(id);
        room.admins.remove(id);
        self.touch();
        Ok(())
    }

    pub fn promote_admin(&mut self, id: StaticId) -> ChatResult<()> {
        let room = self.room_mut("promote admins in")?;
        if !room.members.contains(&id) {
            return Err(ChatError::validation(format!(
                "{id} must be a member before becoming an admin"
            )));
        }
        if room.admins.insert(id) {
            self.touch();
        }
        Ok(())
    }

    pub fn demote_admin(&mut self, id: &StaticId) -> ChatResult<()> {
        let room = self.room_mut("demote admins in")?;
        if !room.admins.contains(id) {
            return Err(ChatError::validation(format!("{id} is not an admin")));
        }
        if room.admins.len() == 1 {
            return Err(ChatError::validation("cannot demote the last admin"));
        }
        room.admins.remove(id);
        self.touch();
        Ok(())
    }

    fn room_mut(&mut self, action: &str) -> ChatResult<&mut RoomChatDetail> {
        match &mut self.detail {
            ChatDetail::Group(room) | ChatDetail::Channel(room) => Ok(room),
            ChatDetail::Direct(_) => Err(ChatError::unsupported(format!(
                "cannot {action} a direct chat"
            ))),
        }
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now().to_rfc3339();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(value: &str) -> StaticId {
        StaticId::from(value)
    }

    fn group_of(creator: &str) -> Chat {
        let detail = RoomChatDetail::founded_by(id(creator), "Team", None, "desc");
        Chat::new(ChatType::Group, ChatDetail::Group(detail)).unwrap()
    }

    #[test]
    fn test_sides_are_order_independent() {
        let ab = Sides::new(id("a"), id("b")).unwrap();
        let ba = Sides::new(id("b"), id("a")).unwrap();
        assert_eq!(ab, ba);
        assert_eq!(ab.low(), &id("a"));
        assert_eq!(ab.other(&id("a")), Some(&id("b")));
        assert_eq!(ab.other(&id("z")), None);
    }

    #[test]
    fn test_sides_must_be_distinct() {
        let err = Sides::new(id("a"), id("a")).unwrap_err();
        assert!(matches!(err, ChatError::Validation { .. }));
    }

    #[test]
    fn test_creator_is_member_and_admin() {
        let chat = group_of("carol");
        assert_eq!(chat.chat_type(), ChatType::Group);
        assert!(chat.is_member(&id("carol")));
        assert!(chat.is_admin(&id("carol")));
        assert!(!chat.is_member(&id("dave")));
    }

    #[test]
    fn test_mismatched_detail_is_rejected() {
        let detail = RoomChatDetail::founded_by(id("carol"), "Team", None, "desc");
        let err = Chat::new(ChatType::Channel, ChatDetail::Group(detail)).unwrap_err();
        assert!(matches!(err, ChatError::Validation { .. }));

        let sides = Sides::new(id("a"), id("b")).unwrap();
        let err = Chat::new(ChatType::Group, ChatDetail::Direct(DirectChatDetail { sides }))
            .unwrap_err();
        assert!(matches!(err, ChatError::Validation { .. }));
    }

    #[test]
    fn test_admins_must_be_members() {
        let mut detail = RoomChatDetail::founded_by(id("carol"), "Team", None, "desc");
        detail.admins.insert(id("mallory"));
        assert!(Chat::new(ChatType::Group, ChatDetail::Group(detail)).is_err());

        let mut empty = RoomChatDetail::founded_by(id("carol"), "Team", None, "desc");
        empty.admins.clear();
        assert!(Chat::new(ChatType::Group, ChatDetail::Group(empty)).is_err());
    }

    #[test]
    fn test_direct_membership_and_admins() {
        let sides = Sides::new(id("a"), id("b")).unwrap();
        let chat = Chat::new(ChatType::Direct, ChatDetail::Direct(DirectChatDetail { sides }))
            .unwrap();
        assert!(chat.is_member(&id("a")));
        assert!(chat.is_member(&id("b")));
        assert!(!chat.is_member(&id("c")));
        assert!(!chat.is_admin(&id("a")));
        assert!(chat.room().is_none());
    }

    #[test]
    fn test_direct_chats_reject_membership_changes() {
        let sides = Sides::new(id("a"), id("b")).unwrap();
        let mut chat =
            Chat::new(ChatType::Direct, ChatDetail::Direct(DirectChatDetail { sides })).unwrap();
        let err = chat.add_member(id("c")).unwrap_err();
        assert!(matches!(err, ChatError::Unsupported { .. }));
    }

    #[test]
    fn test_membership_lifecycle() {
        let mut chat = group_of("carol");

        chat.add_member(id("dave")).unwrap();
        chat.promote_admin(id("dave")).unwrap();
        assert!(chat.is_admin(&id("dave")));

        chat.remove_member(&id("dave")).unwrap();
        assert!(!chat.is_member(&id("dave")));
        assert!(!chat.is_admin(&id("dave")));

        let room = chat.room().unwrap();
        assert!(room.admins.is_subset(&room.members));
    }

    #[test]
    fn test_last_admin_is_protected() {
        let mut chat = group_of("carol");
        assert!(chat.remove_member(&id("carol")).is_err());
        assert!(chat.demote_admin(&id("carol")).is_err());
        assert!(chat.promote_admin(id("stranger")).is_err());
        assert!(chat.is_admin(&id("carol")));
    }

    #[test]
    fn test_chat_type_parsing() {
        assert_eq!("channel".parse::<ChatType>().unwrap(), ChatType::Channel);
        assert!("Direct".parse::<ChatType>().is_err());
        assert_eq!(ChatType::Group.to_string(), "group");
    }
}
