//! Listener identity
//!
//! The upstream gateway authenticates the listener and forwards the
//! profile id in the `x-profile-id` header. Handlers that touch reading
//! progress take a [`ProfileId`] argument; requests without a valid id are
//! rejected with 401 before the handler runs.

use crate::error::Error;
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

pub const PROFILE_HEADER: &str = "x-profile-id";

/// Authenticated listener profile
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProfileId(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for ProfileId
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(PROFILE_HEADER)
            .ok_or_else(|| Error::Unauthorized(format!("missing {} header", PROFILE_HEADER)))?;

        let raw = raw
            .to_str()
            .map_err(|_| Error::Unauthorized(format!("{} is not valid text", PROFILE_HEADER)))?;

        Uuid::parse_str(raw.trim())
            .map(ProfileId)
            .map_err(|_| Error::Unauthorized(format!("{} is not a valid profile id", PROFILE_HEADER)))
    }
}
