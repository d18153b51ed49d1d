use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt, future};

use crate::{actors::user_session::SessionContext, metrics::Metrics, state::AppState};

/// Adapts the socket to text frames and hands it to the session layer.
pub async fn chat_socket(socket: WebSocket, ctx: SessionContext, state: Arc<AppState>) {
    Metrics::websocket_connected();

    let (ws_sender, ws_receiver) = socket.split();
    let writer = ws_sender.with(|text: String| {
        future::ready(Ok::<_, axum::Error>(Message::Text(text.into())))
    });
    let reader = ws_receiver
        .take_while(|frame| {
            future::ready(matches!(frame, Ok(message) if !matches!(message, Message::Close(_))))
        })
        .filter_map(|frame| {
            future::ready(match frame {
                Ok(Message::Text(text)) => Some(text.as_str().to_owned()),
                Ok(Message::Binary(_)) => {
                    Metrics::envelope_rejected("binary_frame");
                    None
                }
                _ => None,
            })
        });

    state
        .connection_manager
        .handle_connection(ctx, writer, reader)
        .await;

    Metrics::websocket_disconnected();
}
