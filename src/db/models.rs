use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

use crate::room::RoomKey;

pub type UserId = i64;
pub type ConversationId = i64;
pub type MessageId = i64;

/// Upper bound on message length, in code points.
pub const MAX_MESSAGE_CHARS: usize = 2000;

#[derive(Clone, Debug, PartialEq, Eq, FromRow, Serialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
}

#[derive(Clone, Debug, PartialEq, FromRow, Serialize)]
pub struct Presence {
    pub user_id: UserId,
    pub is_online: bool,
    pub last_seen: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, FromRow)]
pub struct Conversation {
    pub id: ConversationId,
    pub user_low: UserId,
    pub user_high: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    pub fn room(&self) -> RoomKey {
        RoomKey::new(self.user_low, self.user_high)
    }
}

#[derive(Clone, Debug, PartialEq, FromRow)]
pub struct Message {
    pub id: MessageId,
    pub conversation_id: ConversationId,
    pub sender_id: UserId,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub is_read: bool,
    pub read_at: Option<DateTime<Utc>>,
}

/// A conversation as seen by one of its participants.
#[derive(Clone, Debug, PartialEq)]
pub struct ConversationSummary {
    pub conversation: Conversation,
    pub peer: User,
    pub peer_online: bool,
    pub last_message: Option<Message>,
    pub unread_count: i64,
}

/// Result of a read action on a message.
#[derive(Clone, Debug, PartialEq)]
pub enum ReadOutcome {
    Marked { read_at: DateTime<Utc> },
    AlreadyRead,
    /// The reader sent the message; nothing changes.
    OwnMessage,
    /// No such message in the reader's conversation.
    NotFound,
}

impl ReadOutcome {
    /// Whether the message exists in the conversation, so a receipt may go out.
    pub fn resolved(&self) -> bool {
        !matches!(self, ReadOutcome::NotFound)
    }
}
