//! Caller identity.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

use papyrus_core::defaults::USER_ID_HEADER;

use crate::error::ApiError;

/// The authenticated caller, taken from the `X-User-Id` header.
///
/// Session handling happens upstream; this service trusts the header and
/// scopes every task and document lookup to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrentUser(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(USER_ID_HEADER)
            .ok_or_else(|| ApiError::Unauthorized("Missing X-User-Id header".to_string()))?;

        value
            .to_str()
            .ok()
            .and_then(|v| Uuid::parse_str(v.trim()).ok())
            .map(CurrentUser)
            .ok_or_else(|| ApiError::Unauthorized("Invalid X-User-Id header".to_string()))
    }
}
