mod handlers;
mod messages;
mod registry;

pub use messages::{RegistryHandle, RegistryMessage};
pub use registry::RoomRegistry;
