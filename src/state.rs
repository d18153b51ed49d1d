use std::sync::Arc;

use crate::{
    actors::{
        connection_manager::ConnectionManager,
        room_registry::{RegistryHandle, RoomRegistry},
        user_session::SessionServices,
    },
    config::ChatConfig,
    db::SqlChatStore,
    error::StartupError,
    store::{ConversationStore, IdentityLookup, PresenceTracker},
};

pub struct AppState {
    pub config: ChatConfig,
    pub identities: Arc<dyn IdentityLookup>,
    pub conversations: Arc<dyn ConversationStore>,
    pub presence: Arc<dyn PresenceTracker>,
    pub registry: RegistryHandle,
    pub connection_manager: Arc<ConnectionManager>,
}

impl AppState {
    /// Spawns the room registry; must be called inside a Tokio runtime.
    pub fn new(
        config: ChatConfig,
        identities: Arc<dyn IdentityLookup>,
        conversations: Arc<dyn ConversationStore>,
        presence: Arc<dyn PresenceTracker>,
    ) -> Self {
        let (registry, registry_handle) = RoomRegistry::new();
        tokio::spawn(registry.run());

        let services = SessionServices {
            registry: registry_handle.clone(),
            conversations: conversations.clone(),
            presence: presence.clone(),
            limits: config.session_limits(),
        };
        let connection_manager = Arc::new(ConnectionManager::new(identities.clone(), services));

        Self {
            config,
            identities,
            conversations,
            presence,
            registry: registry_handle,
            connection_manager,
        }
    }
}

pub struct AppStateBuilder {
    config: Option<ChatConfig>,
    store: Option<SqlChatStore>,
}

impl Default for AppStateBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl AppStateBuilder {
    pub fn new() -> Self {
        Self {
            config: None,
            store: None,
        }
    }

    pub fn with_config(mut self, config: ChatConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Use an existing store instead of connecting to `DATABASE_URL`.
    pub fn with_store(mut self, store: SqlChatStore) -> Self {
        self.store = Some(store);
        self
    }

    pub async fn build(self) -> Result<AppState, StartupError> {
        let config = match self.config {
            Some(config) => config,
            None => ChatConfig::from_env()?,
        };

        let store = match self.store {
            Some(store) => store,
            None => {
                SqlChatStore::connect(&config.database_url, config.db_max_connections).await?
            }
        };
        let store = Arc::new(store);

        Ok(AppState::new(config, store.clone(), store.clone(), store))
    }
}
