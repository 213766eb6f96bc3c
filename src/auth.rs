//! Authorization gate.
//!
//! Credentials are verified by the authenticating proxy in front of this
//! service, which forwards the caller's identity in request headers. Handlers
//! only decide whether the asserted roles are sufficient.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::HeaderMap;

use crate::utils::error::AppError;

pub const USER_ROLES_HEADER: &str = "x-user-roles";
pub const USER_NAME_HEADER: &str = "x-user-name";
pub const ADMIN_ROLE: &str = "Admin";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Caller {
    pub username: Option<String>,
    pub roles: Vec<String>,
}

impl Caller {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let username = headers
            .get(USER_NAME_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string);

        let roles = headers
            .get_all(USER_ROLES_HEADER)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(','))
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(str::to_string)
            .collect();

        Self { username, roles }
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r.eq_ignore_ascii_case(role))
    }

    pub fn require_role(&self, role: &str) -> Result<(), AppError> {
        if self.has_role(role) {
            Ok(())
        } else {
            Err(AppError::Forbidden(format!("{} role required", role)))
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Caller::from_headers(&parts.headers))
    }
}

/// Extractor that only succeeds for callers holding the admin role.
#[derive(Debug, Clone)]
pub struct RequireAdmin(pub Caller);

#[async_trait]
impl<S> FromRequestParts<S> for RequireAdmin
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let caller = Caller::from_request_parts(parts, state).await?;

        if let Err(err) = caller.require_role(ADMIN_ROLE) {
            tracing::warn!(
                caller = caller.username.as_deref().unwrap_or("anonymous"),
                "Admin-only route refused"
            );
            return Err(err);
        }

        Ok(RequireAdmin(caller))
    }
}
