use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::db::models::{ConversationId, MAX_MESSAGE_CHARS, UserId};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error("user {0} cannot hold a conversation with themselves")]
    SelfConversation(UserId),
    #[error("message must be between 1 and {MAX_MESSAGE_CHARS} characters")]
    InvalidContent,
    #[error("user {user_id} is not a participant of conversation {conversation_id}")]
    NotParticipant {
        user_id: UserId,
        conversation_id: ConversationId,
    },
    #[error("username {0} is already taken")]
    UsernameTaken(String),
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("room registry is not running")]
    Unavailable,
}

/// Reasons a connection never reaches the joined state.
#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    #[error("caller is not authenticated")]
    Unauthenticated,
    #[error("user {0} not found")]
    PeerNotFound(String),
    #[error("cannot open a chat with yourself")]
    SelfConversation,
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{key} has an invalid value {value:?}")]
    Invalid { key: &'static str, value: String },
    #[error("MAX_MESSAGE_CHARS may not exceed {MAX_MESSAGE_CHARS}, got {0}")]
    MessageLimitTooLarge(usize),
}

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("server error: {0}")]
    Serve(#[source] std::io::Error),
}

/// Error returned from HTTP handlers.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Connect(#[from] ConnectError),
    #[error("user {0} not found")]
    UnknownUser(String),
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::Connect(ConnectError::Store(err))
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Connect(ConnectError::Unauthenticated) => StatusCode::UNAUTHORIZED,
            ApiError::Connect(ConnectError::PeerNotFound(_)) | ApiError::UnknownUser(_) => {
                StatusCode::NOT_FOUND
            }
            ApiError::Connect(ConnectError::SelfConversation)
            | ApiError::Connect(ConnectError::Store(StoreError::SelfConversation(_))) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Connect(ConnectError::Registry(_)) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Connect(ConnectError::Store(_)) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("request failed: {}", self);
        }

        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            "internal error".to_string()
        } else {
            self.to_string()
        };

        let body = Json(json!({
            "error": {
                "message": message
            }
        }));

        (status, body).into_response()
    }
}
