use std::collections::HashMap;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    chat::ChatEvent, db::models::UserId, error::RegistryError, metrics::Metrics, room::RoomKey,
};

pub type SessionId = Uuid;

/// A live session registered in a room.
#[derive(Debug)]
pub struct RoomMember {
    pub session_id: SessionId,
    pub user_id: UserId,
    /// Bounded outbound queue of the session.
    pub sender: mpsc::Sender<ChatEvent>,
    /// Fired when the room drops the session for falling behind.
    pub evict: oneshot::Sender<()>,
}

#[derive(Debug)]
pub enum RoomMessage {
    AddMember(RoomMember),
    RemoveMember {
        session_id: SessionId,
    },
    Broadcast {
        event: ChatEvent,
        exclude: Option<SessionId>,
    },
    GetMembers {
        respond_to: oneshot::Sender<Vec<(SessionId, UserId)>>,
    },
}

/// Cheap handle to a room's mailbox. Events sent through one handle are
/// delivered in the order they were sent.
#[derive(Clone, Debug)]
pub struct RoomHandle {
    room: RoomKey,
    sender: mpsc::UnboundedSender<RoomMessage>,
}

impl RoomHandle {
    pub fn room(&self) -> RoomKey {
        self.room
    }

    pub fn broadcast(
        &self,
        event: ChatEvent,
        exclude: Option<SessionId>,
    ) -> Result<(), RegistryError> {
        self.sender
            .send(RoomMessage::Broadcast { event, exclude })
            .map_err(|_| RegistryError::Unavailable)
    }

    pub async fn members(&self) -> Result<Vec<(SessionId, UserId)>, RegistryError> {
        let (respond_to, response) = oneshot::channel();
        self.sender
            .send(RoomMessage::GetMembers { respond_to })
            .map_err(|_| RegistryError::Unavailable)?;
        response.await.map_err(|_| RegistryError::Unavailable)
    }

    pub(crate) fn add_member(&self, member: RoomMember) -> Result<(), RegistryError> {
        self.sender
            .send(RoomMessage::AddMember(member))
            .map_err(|_| RegistryError::Unavailable)
    }

    pub(crate) fn remove_member(&self, session_id: SessionId) -> Result<(), RegistryError> {
        self.sender
            .send(RoomMessage::RemoveMember { session_id })
            .map_err(|_| RegistryError::Unavailable)
    }
}

/// Owns the membership of one room and fans events out to it. Runs until
/// every [`RoomHandle`] is dropped.
pub struct RoomActor {
    room: RoomKey,
    receiver: mpsc::UnboundedReceiver<RoomMessage>,
    members: HashMap<SessionId, RoomMember>,
}

impl RoomActor {
    pub fn new(room: RoomKey) -> (Self, RoomHandle) {
        let (sender, receiver) = mpsc::unbounded_channel();

        let actor = Self {
            room,
            receiver,
            members: HashMap::new(),
        };

        (actor, RoomHandle { room, sender })
    }

    pub async fn run(mut self) {
        info!("Room actor started for room: {}", self.room);

        while let Some(message) = self.receiver.recv().await {
            match message {
                RoomMessage::AddMember(member) => self.handle_add_member(member),
                RoomMessage::RemoveMember { session_id } => self.handle_remove_member(session_id),
                RoomMessage::Broadcast { event, exclude } => self.handle_broadcast(event, exclude),
                RoomMessage::GetMembers { respond_to } => {
                    let members = self
                        .members
                        .values()
                        .map(|member| (member.session_id, member.user_id))
                        .collect();
                    let _ = respond_to.send(members);
                }
            }
        }

        info!("Room actor stopped for room: {}", self.room);
    }

    fn handle_add_member(&mut self, member: RoomMember) {
        debug!(
            "Session {} (user {}) joined {}",
            member.session_id, member.user_id, self.room
        );
        self.members.insert(member.session_id, member);
    }

    fn handle_remove_member(&mut self, session_id: SessionId) {
        if self.members.remove(&session_id).is_some() {
            debug!("Session {} left {}", session_id, self.room);
        }
    }

    fn handle_broadcast(&mut self, event: ChatEvent, exclude: Option<SessionId>) {
        let mut overflowed = Vec::new();
        let mut closed = Vec::new();

        for (&session_id, member) in &self.members {
            if exclude == Some(session_id) {
                continue;
            }
            match member.sender.try_send(event.clone()) {
                Ok(()) => debug!("{} event queued for {} in {}", event.kind(), session_id, self.room),
                Err(mpsc::error::TrySendError::Full(_)) => overflowed.push(session_id),
                Err(mpsc::error::TrySendError::Closed(_)) => closed.push(session_id),
            }
        }

        for session_id in closed {
            debug!("Session {} channel closed in {}", session_id, self.room);
            self.members.remove(&session_id);
        }

        // a session that cannot keep up is cut off; the rest of the room is unaffected
        for session_id in overflowed {
            if let Some(member) = self.members.remove(&session_id) {
                warn!(
                    "Session {} (user {}) outbound queue full in {}, evicting",
                    session_id, member.user_id, self.room
                );
                let _ = member.evict.send(());
                Metrics::session_evicted();
            }
        }
    }
}
