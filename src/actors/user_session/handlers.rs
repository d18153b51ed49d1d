use std::time::Instant;

use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use super::{SessionContext, SessionServices};
use crate::{
    actors::room_actor::RoomHandle,
    chat::{ChatEvent, Envelope},
    db::models::MessageId,
    error::StoreError,
    metrics::Metrics,
};

/// Applies one inbound frame. Bad input is dropped without a reply; the
/// connection stays open either way.
pub(super) async fn handle_frame(
    ctx: &SessionContext,
    services: &SessionServices,
    room: &RoomHandle,
    replies: &mpsc::Sender<ChatEvent>,
    text: &str,
) {
    let envelope = match Envelope::parse(text) {
        Ok(envelope) => envelope,
        Err(e) => {
            debug!("Ignoring frame from {}: {}", ctx.user.username, e);
            Metrics::envelope_rejected(e.reason());
            return;
        }
    };

    let start = Instant::now();
    let kind = envelope.kind();

    match envelope {
        Envelope::Message { message } => {
            handle_message(ctx, services, room, replies, message).await;
        }
        Envelope::Typing { is_typing } => {
            handle_typing(ctx, room, is_typing);
        }
        Envelope::Read { message_id } => {
            handle_read(ctx, services, room, replies, message_id).await;
        }
    }

    Metrics::envelope_processed(kind, start.elapsed());
}

async fn handle_message(
    ctx: &SessionContext,
    services: &SessionServices,
    room: &RoomHandle,
    replies: &mpsc::Sender<ChatEvent>,
    message: String,
) {
    let length = message.chars().count();
    if message.is_empty() || length > services.limits.max_message_chars {
        debug!(
            "Dropping message of {} chars from {}",
            length, ctx.user.username
        );
        Metrics::envelope_rejected("invalid_content");
        return;
    }

    let stored = match services
        .conversations
        .get_or_create(ctx.user.id, ctx.peer.id)
        .await
    {
        Ok(conversation) => {
            services
                .conversations
                .append_message(&conversation, ctx.user.id, &message)
                .await
        }
        Err(e) => Err(e),
    };

    let stored = match stored {
        Ok(stored) => stored,
        Err(e) => {
            report_failure(ctx, replies, "append_message", "message could not be saved", e);
            return;
        }
    };

    // the sender gets its own copy, carrying the server id and timestamp
    let event = ChatEvent::Message {
        message: stored.content,
        sender: ctx.user.username.clone(),
        timestamp: stored.timestamp,
        message_id: stored.id,
    };
    if let Err(e) = room.broadcast(event, None) {
        error!("Failed to broadcast message {} in {}: {}", stored.id, ctx.room, e);
    }
}

fn handle_typing(ctx: &SessionContext, room: &RoomHandle, is_typing: bool) {
    let event = ChatEvent::Typing {
        username: ctx.user.username.clone(),
        is_typing,
    };

    if let Err(e) = room.broadcast(event, Some(ctx.session_id)) {
        error!("Failed to broadcast typing in {}: {}", ctx.room, e);
    }
}

async fn handle_read(
    ctx: &SessionContext,
    services: &SessionServices,
    room: &RoomHandle,
    replies: &mpsc::Sender<ChatEvent>,
    message_id: MessageId,
) {
    let outcome = match services
        .conversations
        .mark_read(message_id, ctx.user.id, ctx.room)
        .await
    {
        Ok(outcome) => outcome,
        Err(e) => {
            report_failure(ctx, replies, "mark_read", "read receipt could not be saved", e);
            return;
        }
    };

    if !outcome.resolved() {
        debug!(
            "{} tried to read unknown message {} in {}",
            ctx.user.username, message_id, ctx.room
        );
        Metrics::envelope_rejected("unknown_message");
        return;
    }

    let event = ChatEvent::Read {
        message_id,
        reader: ctx.user.username.clone(),
    };
    if let Err(e) = room.broadcast(event, None) {
        error!("Failed to broadcast read receipt in {}: {}", ctx.room, e);
    }
}

/// Tells only the originating session that its action was lost.
fn report_failure(
    ctx: &SessionContext,
    replies: &mpsc::Sender<ChatEvent>,
    operation: &'static str,
    message: &str,
    err: StoreError,
) {
    error!("{} failed for {} in {}: {}", operation, ctx.user.username, ctx.room, err);
    Metrics::persistence_failed(operation);

    let event = ChatEvent::Error {
        message: message.to_string(),
    };
    if replies.try_send(event).is_err() {
        warn!("Could not notify {} about the failed {}", ctx.user.username, operation);
    }
}
