use std::{fmt::Display, sync::Arc};

use futures::{Sink, Stream};
use tracing::{error, info};

use crate::{
    actors::user_session::{SessionContext, SessionServices, UserSession},
    db::models::User,
    error::{ConnectError, RegistryError},
    store::IdentityLookup,
};

pub struct ConnectionManager {
    identities: Arc<dyn IdentityLookup>,
    services: SessionServices,
}

impl ConnectionManager {
    pub fn new(identities: Arc<dyn IdentityLookup>, services: SessionServices) -> Self {
        Self {
            identities,
            services,
        }
    }

    /// Decides whether `caller` may open a chat with `peer_username`. Nothing
    /// is registered or persisted, so a rejected attempt leaves no trace.
    pub async fn resolve(
        &self,
        caller: Option<User>,
        peer_username: &str,
    ) -> Result<SessionContext, ConnectError> {
        let caller = caller.ok_or(ConnectError::Unauthenticated)?;

        let peer = self
            .identities
            .by_username(peer_username)
            .await?
            .ok_or_else(|| ConnectError::PeerNotFound(peer_username.to_string()))?;

        if peer.id == caller.id {
            return Err(ConnectError::SelfConversation);
        }

        Ok(SessionContext::new(caller, peer))
    }

    pub async fn join(&self, ctx: SessionContext) -> Result<UserSession, RegistryError> {
        UserSession::join(ctx, self.services.clone()).await
    }

    pub async fn handle_connection<W, R>(&self, ctx: SessionContext, writer: W, reader: R)
    where
        W: Sink<String> + Send + Unpin + 'static,
        W::Error: Display,
        R: Stream<Item = String> + Send + Unpin + 'static,
    {
        info!(
            "New connection for {} with {}",
            ctx.user.username, ctx.peer.username
        );
        let session_id = ctx.session_id;

        match self.join(ctx).await {
            Ok(session) => session.run(writer, reader).await,
            Err(e) => error!("Failed to join session {}: {}", session_id, e),
        }
    }
}
