use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, instrument};

use super::{
    SqlChatStore,
    models::{Presence, UserId},
};
use crate::{error::StoreError, metrics::Metrics, store::PresenceTracker};

#[async_trait]
impl PresenceTracker for SqlChatStore {
    #[instrument(skip(self))]
    async fn set_online(&self, user_id: UserId, is_online: bool) -> Result<Presence, StoreError> {
        let start = std::time::Instant::now();
        // last_seen records the latest transition, online or offline
        let last_seen = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO profiles (user_id, is_online, last_seen)
            VALUES (?, ?, ?)
            ON CONFLICT (user_id) DO UPDATE SET
                is_online = excluded.is_online,
                last_seen = excluded.last_seen
            "#,
        )
        .bind(user_id)
        .bind(is_online)
        .bind(last_seen)
        .execute(&self.pool)
        .await?;

        Metrics::observe_db_query("set_online", start.elapsed());
        debug!("presence updated");

        Ok(Presence {
            user_id,
            is_online,
            last_seen,
        })
    }

    #[instrument(skip(self))]
    async fn presence(&self, user_id: UserId) -> Result<Option<Presence>, StoreError> {
        let presence = sqlx::query_as::<_, Presence>(
            "SELECT user_id, is_online, last_seen FROM profiles WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(presence)
    }
}
