use async_trait::async_trait;
use tracing::instrument;

use super::{
    SqlChatStore,
    models::{User, UserId},
};
use crate::{error::StoreError, metrics::Metrics, store::IdentityLookup};

#[async_trait]
impl IdentityLookup for SqlChatStore {
    #[instrument(skip(self))]
    async fn by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let start = std::time::Instant::now();

        let user = sqlx::query_as::<_, User>("SELECT id, username FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;

        Metrics::observe_db_query("user_by_username", start.elapsed());
        Ok(user)
    }

    #[instrument(skip(self))]
    async fn by_id(&self, user_id: UserId) -> Result<Option<User>, StoreError> {
        let start = std::time::Instant::now();

        let user = sqlx::query_as::<_, User>("SELECT id, username FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        Metrics::observe_db_query("user_by_id", start.elapsed());
        Ok(user)
    }
}
