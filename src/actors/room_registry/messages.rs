use tokio::sync::{mpsc, oneshot};

use crate::{
    actors::room_actor::{RoomHandle, RoomMember, SessionId},
    error::RegistryError,
    room::RoomKey,
};

#[derive(Debug)]
pub enum RegistryMessage {
    Join {
        room: RoomKey,
        member: RoomMember,
        respond_to: oneshot::Sender<RoomHandle>,
    },
    Leave {
        room: RoomKey,
        session_id: SessionId,
    },
    ActiveRooms {
        respond_to: oneshot::Sender<Vec<RoomKey>>,
    },
}

/// Clonable client of the [`RoomRegistry`](super::RoomRegistry) actor.
#[derive(Clone, Debug)]
pub struct RegistryHandle {
    sender: mpsc::UnboundedSender<RegistryMessage>,
}

impl RegistryHandle {
    pub(super) fn new(sender: mpsc::UnboundedSender<RegistryMessage>) -> Self {
        Self { sender }
    }

    /// Registers `member` in `room`, creating the room on first use. The
    /// member receives every broadcast sent after this returns.
    pub async fn join(&self, room: RoomKey, member: RoomMember) -> Result<RoomHandle, RegistryError> {
        let (respond_to, response) = oneshot::channel();
        self.sender
            .send(RegistryMessage::Join {
                room,
                member,
                respond_to,
            })
            .map_err(|_| RegistryError::Unavailable)?;

        response.await.map_err(|_| RegistryError::Unavailable)
    }

    /// Idempotent. The room is discarded once its last session leaves.
    pub fn leave(&self, room: RoomKey, session_id: SessionId) -> Result<(), RegistryError> {
        self.sender
            .send(RegistryMessage::Leave { room, session_id })
            .map_err(|_| RegistryError::Unavailable)
    }

    pub async fn active_rooms(&self) -> Result<Vec<RoomKey>, RegistryError> {
        let (respond_to, response) = oneshot::channel();
        self.sender
            .send(RegistryMessage::ActiveRooms { respond_to })
            .map_err(|_| RegistryError::Unavailable)?;

        response.await.map_err(|_| RegistryError::Unavailable)
    }
}
