//! Read-side HTTP endpoints backing the conversation list and history views.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{
    auth::AuthenticatedUser,
    db::models::{ConversationId, Message, MessageId, User},
    error::{ApiError, ConnectError},
    state::AppState,
};

#[derive(Debug, Serialize)]
pub struct MessageView {
    pub id: MessageId,
    pub sender: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub is_read: bool,
    pub read_at: Option<DateTime<Utc>>,
}

impl MessageView {
    fn new(message: Message, me: &User, peer: &User) -> Self {
        let sender = if message.sender_id == me.id {
            me.username.clone()
        } else {
            peer.username.clone()
        };

        Self {
            id: message.id,
            sender,
            message: message.content,
            timestamp: message.timestamp,
            is_read: message.is_read,
            read_at: message.read_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ConversationView {
    pub id: ConversationId,
    pub peer: String,
    pub peer_online: bool,
    pub updated_at: DateTime<Utc>,
    pub unread_count: i64,
    pub last_message: Option<MessageView>,
}

#[derive(Debug, Serialize)]
pub struct HistoryView {
    pub conversation_id: ConversationId,
    pub room: String,
    pub peer: String,
    pub messages: Vec<MessageView>,
}

#[derive(Debug, Serialize)]
pub struct PresenceView {
    pub username: String,
    pub is_online: bool,
    pub last_seen: Option<DateTime<Utc>>,
}

pub async fn list_conversations(
    State(state): State<Arc<AppState>>,
    AuthenticatedUser(me): AuthenticatedUser,
) -> Result<Json<Vec<ConversationView>>, ApiError> {
    let summaries = state.conversations.conversations_for(me.id).await?;

    let views = summaries
        .into_iter()
        .map(|summary| ConversationView {
            id: summary.conversation.id,
            peer_online: summary.peer_online,
            updated_at: summary.conversation.updated_at,
            unread_count: summary.unread_count,
            last_message: summary
                .last_message
                .map(|message| MessageView::new(message, &me, &summary.peer)),
            peer: summary.peer.username,
        })
        .collect();

    Ok(Json(views))
}

/// Opens the conversation with `username` if needed and returns it oldest
/// message first. Does not mark anything read.
pub async fn conversation_history(
    State(state): State<Arc<AppState>>,
    AuthenticatedUser(me): AuthenticatedUser,
    Path(username): Path<String>,
) -> Result<Json<HistoryView>, ApiError> {
    let peer = state
        .identities
        .by_username(&username)
        .await?
        .ok_or(ApiError::UnknownUser(username))?;

    if peer.id == me.id {
        return Err(ConnectError::SelfConversation.into());
    }

    let conversation = state.conversations.get_or_create(me.id, peer.id).await?;
    let messages = state.conversations.messages(conversation.id).await?;

    Ok(Json(HistoryView {
        conversation_id: conversation.id,
        room: conversation.room().to_string(),
        messages: messages
            .into_iter()
            .map(|message| MessageView::new(message, &me, &peer))
            .collect(),
        peer: peer.username,
    }))
}

pub async fn user_presence(
    State(state): State<Arc<AppState>>,
    AuthenticatedUser(_): AuthenticatedUser,
    Path(username): Path<String>,
) -> Result<Json<PresenceView>, ApiError> {
    let user = state
        .identities
        .by_username(&username)
        .await?
        .ok_or(ApiError::UnknownUser(username))?;

    let presence = state.presence.presence(user.id).await?;

    Ok(Json(PresenceView {
        username: user.username,
        is_online: presence.as_ref().is_some_and(|p| p.is_online),
        last_seen: presence.map(|p| p.last_seen),
    }))
}
