mod context;
mod handlers;
mod session;

use std::sync::Arc;

use crate::{
    actors::room_registry::RegistryHandle,
    db::models::MAX_MESSAGE_CHARS,
    store::{ConversationStore, PresenceTracker},
};

pub use context::SessionContext;
pub use session::UserSession;

/// Per-session bounds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionLimits {
    /// Events a session may have queued before the room evicts it.
    pub outbound_queue_capacity: usize,
    pub max_message_chars: usize,
}

impl Default for SessionLimits {
    fn default() -> Self {
        Self {
            outbound_queue_capacity: 100,
            max_message_chars: MAX_MESSAGE_CHARS,
        }
    }
}

/// Everything a session talks to besides its own socket.
#[derive(Clone)]
pub struct SessionServices {
    pub registry: RegistryHandle,
    pub conversations: Arc<dyn ConversationStore>,
    pub presence: Arc<dyn PresenceTracker>,
    pub limits: SessionLimits,
}
