use std::collections::{HashMap, HashSet};

use tokio::sync::mpsc;
use tracing::info;

use super::messages::{RegistryHandle, RegistryMessage};
use crate::{
    actors::room_actor::{RoomHandle, SessionId},
    room::RoomKey,
};

pub(super) struct RoomEntry {
    pub handle: RoomHandle,
    pub sessions: HashSet<SessionId>,
}

/// Maps each active room to its broadcast actor. Rooms are created lazily on
/// the first join and dropped when the last session leaves.
pub struct RoomRegistry {
    pub(super) receiver: mpsc::UnboundedReceiver<RegistryMessage>,
    pub(super) rooms: HashMap<RoomKey, RoomEntry>,
}

impl RoomRegistry {
    pub fn new() -> (Self, RegistryHandle) {
        let (sender, receiver) = mpsc::unbounded_channel();

        let registry = Self {
            receiver,
            rooms: HashMap::new(),
        };

        (registry, RegistryHandle::new(sender))
    }

    pub async fn run(mut self) {
        info!("Room registry started");

        while let Some(message) = self.receiver.recv().await {
            match message {
                RegistryMessage::Join {
                    room,
                    member,
                    respond_to,
                } => {
                    self.handle_join(room, member, respond_to);
                }
                RegistryMessage::Leave { room, session_id } => {
                    self.handle_leave(room, session_id);
                }
                RegistryMessage::ActiveRooms { respond_to } => {
                    let _ = respond_to.send(self.rooms.keys().copied().collect());
                }
            }
        }

        info!("Room registry stopped");
    }
}
