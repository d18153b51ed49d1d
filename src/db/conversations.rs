use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use tracing::{debug, instrument};

use super::{
    SqlChatStore,
    models::{
        Conversation, ConversationId, ConversationSummary, MAX_MESSAGE_CHARS, Message, MessageId,
        ReadOutcome, User, UserId,
    },
};
use crate::{error::StoreError, metrics::Metrics, room::RoomKey, store::ConversationStore};

#[derive(FromRow)]
struct SummaryRow {
    id: ConversationId,
    user_low: UserId,
    user_high: UserId,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    peer_id: UserId,
    peer_username: String,
    peer_online: bool,
    unread_count: i64,
}

impl SqlChatStore {
    async fn last_message(
        &self,
        conversation_id: ConversationId,
    ) -> Result<Option<Message>, StoreError> {
        let message = sqlx::query_as::<_, Message>(
            r#"
            SELECT id, conversation_id, sender_id, content, timestamp, is_read, read_at
            FROM messages
            WHERE conversation_id = ?
            ORDER BY timestamp DESC, id DESC
            LIMIT 1
            "#,
        )
        .bind(conversation_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(message)
    }
}

#[async_trait]
impl ConversationStore for SqlChatStore {
    #[instrument(skip(self))]
    async fn get_or_create(&self, a: UserId, b: UserId) -> Result<Conversation, StoreError> {
        if a == b {
            return Err(StoreError::SelfConversation(a));
        }
        let start = std::time::Instant::now();
        let room = RoomKey::new(a, b);
        let now = Utc::now();

        // The unique (user_low, user_high) constraint settles races between
        // both participants creating the row at once.
        sqlx::query(
            r#"
            INSERT INTO conversations (user_low, user_high, created_at, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT (user_low, user_high) DO NOTHING
            "#,
        )
        .bind(room.low())
        .bind(room.high())
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        let conversation = sqlx::query_as::<_, Conversation>(
            r#"
            SELECT id, user_low, user_high, created_at, updated_at
            FROM conversations
            WHERE user_low = ? AND user_high = ?
            "#,
        )
        .bind(room.low())
        .bind(room.high())
        .fetch_one(&self.pool)
        .await?;

        Metrics::observe_db_query("get_or_create_conversation", start.elapsed());
        Ok(conversation)
    }

    #[instrument(skip(self))]
    async fn find(&self, a: UserId, b: UserId) -> Result<Option<Conversation>, StoreError> {
        let room = RoomKey::new(a, b);

        let conversation = sqlx::query_as::<_, Conversation>(
            r#"
            SELECT id, user_low, user_high, created_at, updated_at
            FROM conversations
            WHERE user_low = ? AND user_high = ?
            "#,
        )
        .bind(room.low())
        .bind(room.high())
        .fetch_optional(&self.pool)
        .await?;

        Ok(conversation)
    }

    #[instrument(skip(self, conversation, content), fields(conversation_id = conversation.id))]
    async fn append_message(
        &self,
        conversation: &Conversation,
        sender: UserId,
        content: &str,
    ) -> Result<Message, StoreError> {
        let length = content.chars().count();
        if length == 0 || length > MAX_MESSAGE_CHARS {
            return Err(StoreError::InvalidContent);
        }
        if !conversation.room().contains(sender) {
            return Err(StoreError::NotParticipant {
                user_id: sender,
                conversation_id: conversation.id,
            });
        }
        let start = std::time::Instant::now();

        let mut tx = self.pool.begin().await?;

        // Writing first takes the write lock before anything is read. The
        // stored text is RFC 3339 UTC, which orders chronologically, so MAX
        // keeps message timestamps non-decreasing within the conversation.
        let timestamp: DateTime<Utc> = sqlx::query_scalar(
            r#"
            UPDATE conversations
            SET updated_at = MAX(updated_at, ?)
            WHERE id = ?
            RETURNING updated_at
            "#,
        )
        .bind(Utc::now())
        .bind(conversation.id)
        .fetch_one(&mut *tx)
        .await?;

        let id = sqlx::query(
            "INSERT INTO messages (conversation_id, sender_id, content, timestamp) VALUES (?, ?, ?, ?)",
        )
        .bind(conversation.id)
        .bind(sender)
        .bind(content)
        .bind(timestamp)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        tx.commit().await?;

        Metrics::observe_db_query("append_message", start.elapsed());
        debug!(message_id = id, "message stored");

        Ok(Message {
            id,
            conversation_id: conversation.id,
            sender_id: sender,
            content: content.to_string(),
            timestamp,
            is_read: false,
            read_at: None,
        })
    }

    #[instrument(skip(self, room), fields(room = %room))]
    async fn mark_read(
        &self,
        message_id: MessageId,
        reader: UserId,
        room: RoomKey,
    ) -> Result<ReadOutcome, StoreError> {
        if !room.contains(reader) {
            return Ok(ReadOutcome::NotFound);
        }
        let start = std::time::Instant::now();

        let sender: Option<UserId> = sqlx::query_scalar(
            r#"
            SELECT m.sender_id
            FROM messages m
            JOIN conversations c ON c.id = m.conversation_id
            WHERE m.id = ? AND c.user_low = ? AND c.user_high = ?
            "#,
        )
        .bind(message_id)
        .bind(room.low())
        .bind(room.high())
        .fetch_optional(&self.pool)
        .await?;

        let outcome = match sender {
            None => ReadOutcome::NotFound,
            Some(sender) if sender == reader => ReadOutcome::OwnMessage,
            Some(_) => {
                let read_at = Utc::now();
                // the is_read guard makes the unread -> read flip happen once
                let updated = sqlx::query(
                    "UPDATE messages SET is_read = 1, read_at = ? WHERE id = ? AND is_read = 0",
                )
                .bind(read_at)
                .bind(message_id)
                .execute(&self.pool)
                .await?
                .rows_affected();

                if updated == 0 {
                    ReadOutcome::AlreadyRead
                } else {
                    ReadOutcome::Marked { read_at }
                }
            }
        };

        Metrics::observe_db_query("mark_read", start.elapsed());
        Ok(outcome)
    }

    #[instrument(skip(self))]
    async fn messages(&self, conversation_id: ConversationId) -> Result<Vec<Message>, StoreError> {
        let start = std::time::Instant::now();

        let messages = sqlx::query_as::<_, Message>(
            r#"
            SELECT id, conversation_id, sender_id, content, timestamp, is_read, read_at
            FROM messages
            WHERE conversation_id = ?
            ORDER BY timestamp ASC, id ASC
            "#,
        )
        .bind(conversation_id)
        .fetch_all(&self.pool)
        .await?;

        Metrics::observe_db_query("conversation_messages", start.elapsed());
        Ok(messages)
    }

    #[instrument(skip(self))]
    async fn conversations_for(
        &self,
        user_id: UserId,
    ) -> Result<Vec<ConversationSummary>, StoreError> {
        let start = std::time::Instant::now();

        let rows = sqlx::query_as::<_, SummaryRow>(
            r#"
            SELECT
                c.id, c.user_low, c.user_high, c.created_at, c.updated_at,
                u.id AS peer_id,
                u.username AS peer_username,
                COALESCE(p.is_online, 0) AS peer_online,
                (
                    SELECT COUNT(*) FROM messages m
                    WHERE m.conversation_id = c.id AND m.is_read = 0 AND m.sender_id <> ?
                ) AS unread_count
            FROM conversations c
            JOIN users u
                ON u.id = CASE WHEN c.user_low = ? THEN c.user_high ELSE c.user_low END
            LEFT JOIN profiles p ON p.user_id = u.id
            WHERE c.user_low = ? OR c.user_high = ?
            ORDER BY c.updated_at DESC, c.id DESC
            "#,
        )
        .bind(user_id)
        .bind(user_id)
        .bind(user_id)
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let mut summaries = Vec::with_capacity(rows.len());
        for row in rows {
            let last_message = self.last_message(row.id).await?;
            summaries.push(ConversationSummary {
                conversation: Conversation {
                    id: row.id,
                    user_low: row.user_low,
                    user_high: row.user_high,
                    created_at: row.created_at,
                    updated_at: row.updated_at,
                },
                peer: User {
                    id: row.peer_id,
                    username: row.peer_username,
                },
                peer_online: row.peer_online,
                last_message,
                unread_count: row.unread_count,
            });
        }

        Metrics::observe_db_query("conversations_for", start.elapsed());
        Ok(summaries)
    }
}
