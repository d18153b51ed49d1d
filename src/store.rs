//! Collaborator contracts the chat core depends on.
//!
//! Sessions only see these traits; [`crate::db::SqlChatStore`] implements all
//! three against SQLite.

use async_trait::async_trait;

use crate::{
    db::models::{
        Conversation, ConversationId, ConversationSummary, Message, MessageId, Presence,
        ReadOutcome, User, UserId,
    },
    error::StoreError,
    room::RoomKey,
};

/// Resolves users. Owned by the identity service; read-only here.
#[async_trait]
pub trait IdentityLookup: Send + Sync {
    async fn by_username(&self, username: &str) -> Result<Option<User>, StoreError>;

    async fn by_id(&self, user_id: UserId) -> Result<Option<User>, StoreError>;
}

#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Returns the single conversation for the unordered pair, creating it on
    /// first contact. Safe under concurrent calls from both participants.
    async fn get_or_create(&self, a: UserId, b: UserId) -> Result<Conversation, StoreError>;

    async fn find(&self, a: UserId, b: UserId) -> Result<Option<Conversation>, StoreError>;

    /// Persists a message with a server-assigned id and timestamp and bumps
    /// the conversation's `updated_at`.
    async fn append_message(
        &self,
        conversation: &Conversation,
        sender: UserId,
        content: &str,
    ) -> Result<Message, StoreError>;

    /// Marks `message_id` read on behalf of `reader`, if it lives in `room`
    /// and was sent by the other participant. Never un-reads.
    async fn mark_read(
        &self,
        message_id: MessageId,
        reader: UserId,
        room: RoomKey,
    ) -> Result<ReadOutcome, StoreError>;

    /// Messages of a conversation, oldest first.
    async fn messages(&self, conversation_id: ConversationId) -> Result<Vec<Message>, StoreError>;

    /// Conversations `user_id` takes part in, most recently active first.
    async fn conversations_for(
        &self,
        user_id: UserId,
    ) -> Result<Vec<ConversationSummary>, StoreError>;
}

#[async_trait]
pub trait PresenceTracker: Send + Sync {
    /// Sets the online flag and refreshes last-seen to now, in both directions.
    async fn set_online(&self, user_id: UserId, is_online: bool) -> Result<Presence, StoreError>;

    async fn presence(&self, user_id: UserId) -> Result<Option<Presence>, StoreError>;
}
