use uuid::Uuid;

use crate::{actors::room_actor::SessionId, db::models::User, room::RoomKey};

/// Who is talking to whom. Fixed for the lifetime of a session.
#[derive(Clone, Debug, PartialEq)]
pub struct SessionContext {
    pub session_id: SessionId,
    pub user: User,
    pub peer: User,
    pub room: RoomKey,
}

impl SessionContext {
    pub fn new(user: User, peer: User) -> Self {
        let room = RoomKey::new(user.id, peer.id);

        Self {
            session_id: Uuid::new_v4(),
            user,
            peer,
            room,
        }
    }
}
