pub mod connection_manager;
pub mod room_actor;
pub mod room_registry;
pub mod user_session;
