use std::str::FromStr;

use chrono::Utc;
use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};
use tracing::{info, instrument};

use crate::error::StoreError;

mod conversations;
pub mod models;
mod presence;
mod users;

use models::User;

/// SQLite-backed implementation of the identity, conversation and presence
/// collaborators.
#[derive(Clone, Debug)]
pub struct SqlChatStore {
    pool: SqlitePool,
}

impl SqlChatStore {
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;

        info!("connected to {}", database_url);
        Self::migrated(pool).await
    }

    /// A private in-memory database. Pinned to one connection so the data
    /// lives as long as the store.
    pub async fn in_memory() -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        Self::migrated(pool).await
    }

    async fn migrated(pool: SqlitePool) -> Result<Self, StoreError> {
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Creates a user together with an offline profile.
    #[instrument(skip(self))]
    pub async fn register_user(&self, username: &str) -> Result<User, StoreError> {
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query("INSERT INTO users (username) VALUES (?)")
            .bind(username)
            .execute(&mut *tx)
            .await;
        let id = match inserted {
            Ok(result) => result.last_insert_rowid(),
            Err(sqlx::Error::Database(err)) if err.is_unique_violation() => {
                return Err(StoreError::UsernameTaken(username.to_string()));
            }
            Err(err) => return Err(err.into()),
        };

        sqlx::query("INSERT INTO profiles (user_id, is_online, last_seen) VALUES (?, 0, ?)")
            .bind(id)
            .bind(Utc::now())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        info!(user_id = id, "registered user");
        Ok(User {
            id,
            username: username.to_string(),
        })
    }
}
