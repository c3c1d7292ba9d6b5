//! Acting-user extractor.

use axum::{
    extract::FromRequestParts,
    http::{HeaderName, request::Parts},
};
use uuid::Uuid;

use ledgerline_shared::types::ActorId;

use crate::error::ApiError;

/// Header carrying the acting user's id.
pub static ACTOR_HEADER: HeaderName = HeaderName::from_static("x-actor-id");

/// The user performing a request.
///
/// Read from the optional `X-Actor-Id` header. Requests without the header
/// act as the system user.
#[derive(Debug, Clone, Copy)]
pub struct Actor(pub ActorId);

impl Actor {
    /// Returns the actor id.
    #[must_use]
    pub const fn id(self) -> ActorId {
        self.0
    }
}

impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Some(value) = parts.headers.get(&ACTOR_HEADER) else {
            return Ok(Self(ActorId::system()));
        };

        value
            .to_str()
            .ok()
            .and_then(|raw| Uuid::parse_str(raw.trim()).ok())
            .map(|id| Self(ActorId::from_uuid(id)))
            .ok_or_else(|| {
                ApiError::bad_request("INVALID_ACTOR_ID", "X-Actor-Id must be a valid UUID")
            })
    }
}
