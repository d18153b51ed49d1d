use std::sync::Arc;

use axum::{extract::FromRequestParts, http::request::Parts};

use crate::{
    db::models::{User, UserId},
    error::{ApiError, ConnectError},
    state::AppState,
};

/// The caller, as vouched for by the hosting layer: either a `User` placed in
/// the request extensions by an upstream middleware, or a user id in the
/// configured identity header.
///
/// The header value is trusted as-is. Deployments must sit behind a proxy
/// that strips this header from client requests and sets it only after
/// authenticating the caller; otherwise anyone can claim any user id.
#[derive(Clone, Debug)]
pub struct AuthenticatedUser(pub User);

impl FromRequestParts<Arc<AppState>> for AuthenticatedUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<AuthenticatedUser>() {
            return Ok(user.clone());
        }

        let user_id = parts
            .headers
            .get(&state.config.identity_header)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<UserId>().ok())
            .ok_or(ConnectError::Unauthenticated)?;

        state
            .identities
            .by_id(user_id)
            .await?
            .map(AuthenticatedUser)
            .ok_or_else(|| ConnectError::Unauthenticated.into())
    }
}
