use std::{fmt::Display, sync::Arc};

use futures::{Sink, SinkExt, Stream, StreamExt};
use tokio::{
    sync::{mpsc, oneshot},
    task::AbortHandle,
};
use tracing::{debug, error, info, warn};

use super::{SessionContext, SessionServices, handlers};
use crate::{
    actors::room_actor::{RoomHandle, RoomMember},
    chat::ChatEvent,
    error::RegistryError,
    metrics::Metrics,
};

const REPLY_BUFFER_SIZE: usize = 8;

/// A joined connection. Created by [`UserSession::join`], consumed by
/// [`UserSession::run`]. Leaving is guaranteed once `join` has returned:
/// either `run` finishes it or dropping the session spawns it.
pub struct UserSession {
    ctx: Arc<SessionContext>,
    services: SessionServices,
    room: RoomHandle,
    events: mpsc::Receiver<ChatEvent>,
    evicted: oneshot::Receiver<()>,
    guard: SessionGuard,
}

impl UserSession {
    pub async fn join(ctx: SessionContext, services: SessionServices) -> Result<Self, RegistryError> {
        let ctx = Arc::new(ctx);
        let (sender, events) = mpsc::channel(services.limits.outbound_queue_capacity);
        let (evict, evicted) = oneshot::channel();

        let member = RoomMember {
            session_id: ctx.session_id,
            user_id: ctx.user.id,
            sender,
            evict,
        };
        let room = services.registry.join(ctx.room, member).await?;
        let guard = SessionGuard::new(ctx.clone(), services.clone(), room.clone());

        if let Err(e) = services.presence.set_online(ctx.user.id, true).await {
            warn!("Failed to mark {} online: {}", ctx.user.username, e);
        }

        let status = ChatEvent::Status {
            username: ctx.user.username.clone(),
            is_online: true,
        };
        if let Err(e) = room.broadcast(status, Some(ctx.session_id)) {
            warn!("Failed to announce {} in {}: {}", ctx.user.username, ctx.room, e);
        }

        info!(
            "Session {} for {} joined {}",
            ctx.session_id, ctx.user.username, ctx.room
        );

        Ok(Self {
            ctx,
            services,
            room,
            events,
            evicted,
            guard,
        })
    }

    /// Pumps events to `writer` and frames from `reader` until either side
    /// ends or the room evicts the session, then leaves.
    pub async fn run<W, R>(self, mut writer: W, mut reader: R)
    where
        W: Sink<String> + Send + Unpin + 'static,
        W::Error: Display,
        R: Stream<Item = String> + Send + Unpin + 'static,
    {
        let Self {
            ctx,
            services,
            room,
            mut events,
            mut evicted,
            guard,
        } = self;
        let (reply_sender, mut reply_receiver) = mpsc::channel::<ChatEvent>(REPLY_BUFFER_SIZE);

        // Task to handle outgoing events (from room to socket)
        let send_ctx = ctx.clone();
        let mut send_task = tokio::spawn(async move {
            loop {
                let event = tokio::select! {
                    Some(event) = events.recv() => event,
                    Some(event) = reply_receiver.recv() => event,
                    else => break,
                };

                if event.is_echo_for(&send_ctx.user.username) {
                    continue;
                }

                match serde_json::to_string(&event) {
                    Ok(json) => {
                        if let Err(e) = writer.send(json).await {
                            debug!(
                                "Send failed for session {}, likely disconnected: {}",
                                send_ctx.session_id, e
                            );
                            break;
                        }
                        Metrics::websocket_frame_sent();
                    }
                    Err(e) => {
                        error!("Failed to serialize {} event: {}", event.kind(), e);
                    }
                }
            }
        });

        // Task to handle incoming frames (from socket to room)
        let recv_ctx = ctx.clone();
        let recv_room = room.clone();
        let mut recv_task = tokio::spawn(async move {
            while let Some(text) = reader.next().await {
                Metrics::websocket_frame_received();
                handlers::handle_frame(&recv_ctx, &services, &recv_room, &reply_sender, &text)
                    .await;
            }
        });

        // declared after `guard` so the tasks stop before any leave runs
        let _tasks = SessionTasks([send_task.abort_handle(), recv_task.abort_handle()]);

        tokio::select! {
            _ = &mut send_task => {
                debug!("Send task completed for session {}", ctx.session_id);
                recv_task.abort();
            }
            _ = &mut recv_task => {
                debug!("Receive task completed for session {}", ctx.session_id);
                send_task.abort();
            }
            _ = &mut evicted => {
                warn!("Session {} evicted from {}", ctx.session_id, ctx.room);
                send_task.abort();
                recv_task.abort();
            }
        }

        drop(room);
        guard.close().await;
    }
}

/// Aborts the socket tasks when `run` ends or is cancelled mid-await.
struct SessionTasks([AbortHandle; 2]);

impl Drop for SessionTasks {
    fn drop(&mut self) {
        for task in &self.0 {
            task.abort();
        }
    }
}

/// Runs the leave sequence exactly once: presence offline, offline status
/// to the rest of the room, then unregistration.
struct SessionGuard {
    inner: Option<Departure>,
}

struct Departure {
    ctx: Arc<SessionContext>,
    services: SessionServices,
    room: RoomHandle,
}

impl SessionGuard {
    fn new(ctx: Arc<SessionContext>, services: SessionServices, room: RoomHandle) -> Self {
        Self {
            inner: Some(Departure {
                ctx,
                services,
                room,
            }),
        }
    }

    async fn close(mut self) {
        if let Some(departure) = self.inner.take() {
            departure.leave().await;
        }
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        let Some(departure) = self.inner.take() else {
            return;
        };

        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(departure.leave());
            }
            Err(_) => {
                // no runtime left to persist presence; at least free the room
                let _ = departure
                    .services
                    .registry
                    .leave(departure.ctx.room, departure.ctx.session_id);
            }
        }
    }
}

impl Departure {
    async fn leave(self) {
        let Self {
            ctx,
            services,
            room,
        } = self;

        if let Err(e) = services.presence.set_online(ctx.user.id, false).await {
            warn!("Failed to mark {} offline: {}", ctx.user.username, e);
        }

        let status = ChatEvent::Status {
            username: ctx.user.username.clone(),
            is_online: false,
        };
        if let Err(e) = room.broadcast(status, Some(ctx.session_id)) {
            debug!("Offline status for {} not delivered: {}", ctx.user.username, e);
        }

        if let Err(e) = services.registry.leave(ctx.room, ctx.session_id) {
            error!("Failed to leave {}: {}", ctx.room, e);
        }

        info!(
            "Session {} for {} left {}",
            ctx.session_id, ctx.user.username, ctx.room
        );
    }
}
