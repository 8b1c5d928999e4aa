//! Caller identity extracted from request headers.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::domain::OwnerId;
use crate::error::BackupError;

/// Header carrying the authenticated identity, set by the fronting proxy.
pub const OWNER_HEADER: &str = "x-owner-id";

/// The identity a request acts for.
///
/// Rejects with [`BackupError::NotAuthenticated`] when the header is
/// missing, not valid UTF-8, or not a usable owner id.
#[derive(Debug, Clone)]
pub struct Identity(pub OwnerId);

impl<S: Send + Sync> FromRequestParts<S> for Identity {
    type Rejection = BackupError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(OWNER_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(OwnerId::parse)
            .map(Self)
            .ok_or(BackupError::NotAuthenticated)
    }
}
