use std::collections::HashSet;

use tokio::sync::oneshot;
use tracing::{debug, error};

use super::registry::{RoomEntry, RoomRegistry};
use crate::{
    actors::room_actor::{RoomActor, RoomHandle, RoomMember, SessionId},
    metrics::Metrics,
    room::RoomKey,
};

impl RoomRegistry {
    pub(super) fn handle_join(
        &mut self,
        room: RoomKey,
        member: RoomMember,
        respond_to: oneshot::Sender<RoomHandle>,
    ) {
        let session_id = member.session_id;
        let entry = self.rooms.entry(room).or_insert_with(|| {
            let (actor, handle) = RoomActor::new(room);
            tokio::spawn(actor.run());
            Metrics::room_opened();
            debug!("Room {} opened", room);

            RoomEntry {
                handle,
                sessions: HashSet::new(),
            }
        });

        if let Err(e) = entry.handle.add_member(member) {
            // dropping respond_to reports the failure to the joining session
            error!("Room {} rejected session {}: {}", room, session_id, e);
            if entry.sessions.is_empty() {
                self.rooms.remove(&room);
                Metrics::room_closed();
            }
            return;
        }

        entry.sessions.insert(session_id);
        let _ = respond_to.send(entry.handle.clone());
    }

    pub(super) fn handle_leave(&mut self, room: RoomKey, session_id: SessionId) {
        let Some(entry) = self.rooms.get_mut(&room) else {
            return;
        };

        if entry.sessions.remove(&session_id) {
            let _ = entry.handle.remove_member(session_id);
        }

        if entry.sessions.is_empty() {
            self.rooms.remove(&room);
            Metrics::room_closed();
            debug!("Room {} closed", room);
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::{mpsc, oneshot};
    use uuid::Uuid;

    use crate::{
        actors::{room_actor::RoomMember, room_registry::RoomRegistry},
        chat::ChatEvent,
        room::RoomKey,
    };

    fn member(user_id: i64) -> (RoomMember, mpsc::Receiver<ChatEvent>) {
        let (sender, receiver) = mpsc::channel(8);
        let (evict, _) = oneshot::channel();
        let member = RoomMember {
            session_id: Uuid::new_v4(),
            user_id,
            sender,
            evict,
        };
        (member, receiver)
    }

    #[tokio::test]
    async fn both_participants_share_one_room() {
        let (registry, handle) = RoomRegistry::new();
        tokio::spawn(registry.run());

        let (alice, _alice_rx) = member(1);
        let (bob, mut bob_rx) = member(2);
        let room = handle.join(RoomKey::new(1, 2), alice).await.unwrap();
        handle.join(RoomKey::new(2, 1), bob).await.unwrap();

        assert_eq!(handle.active_rooms().await.unwrap(), vec![RoomKey::new(1, 2)]);

        let event = ChatEvent::Status {
            username: "alice".to_string(),
            is_online: true,
        };
        room.broadcast(event.clone(), None).unwrap();
        assert_eq!(bob_rx.recv().await.unwrap(), event);
    }

    #[tokio::test]
    async fn room_is_discarded_after_last_leave() {
        let (registry, handle) = RoomRegistry::new();
        tokio::spawn(registry.run());

        let key = RoomKey::new(1, 2);
        let (alice, _alice_rx) = member(1);
        let (bob, _bob_rx) = member(2);
        let (alice_session, bob_session) = (alice.session_id, bob.session_id);
        let room = handle.join(key, alice).await.unwrap();
        handle.join(key, bob).await.unwrap();

        handle.leave(key, alice_session).unwrap();
        // leaving twice must not close the room under bob
        handle.leave(key, alice_session).unwrap();
        assert_eq!(handle.active_rooms().await.unwrap(), vec![key]);
        assert_eq!(room.members().await.unwrap(), vec![(bob_session, 2)]);

        handle.leave(key, bob_session).unwrap();
        assert!(handle.active_rooms().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn rejoining_opens_a_fresh_room() {
        let (registry, handle) = RoomRegistry::new();
        tokio::spawn(registry.run());

        let key = RoomKey::new(3, 4);
        let (first, _rx) = member(3);
        let session_id = first.session_id;
        handle.join(key, first).await.unwrap();
        handle.leave(key, session_id).unwrap();

        let (again, _rx) = member(3);
        let room = handle.join(key, again).await.unwrap();
        assert_eq!(room.room(), key);
        assert_eq!(room.members().await.unwrap().len(), 1);
    }
}
