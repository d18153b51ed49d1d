use std::str::FromStr;

use axum::http::HeaderName;

use crate::{
    actors::user_session::SessionLimits, db::models::MAX_MESSAGE_CHARS, error::ConfigError,
};

/// Service settings, read from the environment (and `.env`).
#[derive(Clone, Debug)]
pub struct ChatConfig {
    pub bind_addr: String,
    pub database_url: String,
    pub db_max_connections: u32,
    pub outbound_queue_capacity: usize,
    pub max_message_chars: usize,
    /// Header carrying the user id of an already authenticated caller. The
    /// fronting proxy must strip it from incoming client requests.
    pub identity_header: HeaderName,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
            database_url: "sqlite://murmur.db".to_string(),
            db_max_connections: 8,
            outbound_queue_capacity: 100,
            max_message_chars: MAX_MESSAGE_CHARS,
            identity_header: HeaderName::from_static("x-user-id"),
        }
    }
}

impl ChatConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(addr) = lookup("MURMUR_ADDR") {
            config.bind_addr = addr;
        }
        if let Some(url) = lookup("DATABASE_URL") {
            config.database_url = url;
        }
        if let Some(value) = lookup("DB_MAX_CONNECTIONS") {
            config.db_max_connections = parse_positive("DB_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = lookup("OUTBOUND_QUEUE_CAPACITY") {
            config.outbound_queue_capacity = parse_positive("OUTBOUND_QUEUE_CAPACITY", &value)?;
        }
        if let Some(value) = lookup("MAX_MESSAGE_CHARS") {
            let limit: usize = parse_positive("MAX_MESSAGE_CHARS", &value)?;
            if limit > MAX_MESSAGE_CHARS {
                return Err(ConfigError::MessageLimitTooLarge(limit));
            }
            config.max_message_chars = limit;
        }
        if let Some(value) = lookup("IDENTITY_HEADER") {
            config.identity_header =
                HeaderName::from_str(value.trim()).map_err(|_| ConfigError::Invalid {
                    key: "IDENTITY_HEADER",
                    value,
                })?;
        }

        Ok(config)
    }

    pub fn session_limits(&self) -> SessionLimits {
        SessionLimits {
            outbound_queue_capacity: self.outbound_queue_capacity,
            max_message_chars: self.max_message_chars,
        }
    }
}

fn parse_positive<T>(key: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr + Default + PartialEq,
{
    match value.trim().parse::<T>() {
        Ok(parsed) if parsed != T::default() => Ok(parsed),
        _ => Err(ConfigError::Invalid {
            key,
            value: value.to_string(),
        }),
    }
}
