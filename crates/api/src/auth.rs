//! Principal extraction from trusted gateway headers.
//!
//! Authentication happens upstream; the gateway forwards the verified
//! identity as `x-principal-id` (UUID) and `x-principal-role`
//! (`customer` or `admin`).

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use common::{Principal, Role, UserId};

use crate::error::ApiError;

pub const PRINCIPAL_ID_HEADER: &str = "x-principal-id";
pub const PRINCIPAL_ROLE_HEADER: &str = "x-principal-role";

/// The authenticated caller of a request.
#[derive(Debug, Clone, Copy)]
pub struct Authenticated(pub Principal);

impl<S: Send + Sync> FromRequestParts<S> for Authenticated {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .ok_or_else(|| ApiError::Unauthenticated(format!("missing {name} header")))
        };

        let id: UserId = header(PRINCIPAL_ID_HEADER)?
            .parse()
            .map_err(|e| ApiError::Unauthenticated(format!("invalid principal id: {e}")))?;
        let role: Role = header(PRINCIPAL_ROLE_HEADER)?
            .parse()
            .map_err(ApiError::Unauthenticated)?;

        Ok(Authenticated(Principal { id, role }))
    }
}
