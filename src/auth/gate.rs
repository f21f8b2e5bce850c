//! Request-time credential checks.
//!
//! [`AuthGate`] turns an `Authorization` header into an [`AuthContext`] or an
//! [`AuthError::Unauthenticated`]. [`RoleGate`] runs after it and only decides
//! between passing and [`AuthError::Forbidden`].

use super::claims::{Role, SessionClaims};
use super::codec::{CredentialCodec, CredentialError};
use super::revocation::RevocationStore;
use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

const BEARER_PREFIX: &str = "Bearer ";
const SENTINEL_TOKENS: &[&str] = &["null", "undefined"];

/// The two failure classes visible to callers. Neither carries a reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("unauthenticated")]
    Unauthenticated,
    #[error("forbidden")]
    Forbidden,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        match self {
            AuthError::Unauthenticated => (StatusCode::UNAUTHORIZED, "Unauthenticated").into_response(),
            AuthError::Forbidden => (StatusCode::FORBIDDEN, "Forbidden").into_response(),
        }
    }
}

/// Request-scoped result of a successful authentication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    pub claims: SessionClaims,
    /// The raw credential, kept for logout.
    pub credential: String,
}

impl AuthContext {
    pub fn subject_id(&self) -> &str {
        &self.claims.sub
    }

    pub fn role(&self) -> Role {
        self.claims.role
    }
}

impl<S: Send + Sync> FromRequestParts<S> for AuthContext {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthContext>()
            .cloned()
            .ok_or(AuthError::Unauthenticated)
    }
}

/// Extracts the token from a `Bearer <token>` header value.
///
/// Empty tokens and the `null`/`undefined` placeholders some clients send are
/// treated as absent.
pub fn bearer_token(header: Option<&str>) -> Option<&str> {
    let token = header?.strip_prefix(BEARER_PREFIX)?.trim();
    if token.is_empty() || SENTINEL_TOKENS.contains(&token) {
        return None;
    }
    Some(token)
}

pub struct AuthGate {
    codec: Arc<CredentialCodec>,
    revocations: Arc<dyn RevocationStore>,
}

impl AuthGate {
    pub fn new(codec: Arc<CredentialCodec>, revocations: Arc<dyn RevocationStore>) -> Self {
        Self { codec, revocations }
    }

    pub async fn authenticate(&self, authorization: Option<&str>) -> Result<AuthContext, AuthError> {
        let Some(token) = bearer_token(authorization) else {
            debug!("Rejecting request: missing or malformed bearer header");
            return Err(AuthError::Unauthenticated);
        };

        if self.revocations.is_revoked(token).await {
            debug!("Rejecting request: credential revoked");
            return Err(AuthError::Unauthenticated);
        }

        match self.codec.parse::<SessionClaims>(token) {
            Ok(claims) => Ok(AuthContext {
                claims,
                credential: token.to_string(),
            }),
            Err(e) => {
                let reason = match e {
                    CredentialError::Malformed => "malformed",
                    CredentialError::Expired(_) => "expired",
                    CredentialError::InvalidSignature => "invalid signature",
                };
                debug!("Rejecting request: credential {}", reason);
                Err(AuthError::Unauthenticated)
            }
        }
    }
}

/// Capability check on an already authenticated subject.
#[derive(Debug, Clone)]
pub struct RoleGate {
    allowed: Vec<Role>,
}

impl RoleGate {
    pub fn new(allowed: impl IntoIterator<Item = Role>) -> Self {
        Self {
            allowed: allowed.into_iter().collect(),
        }
    }

    pub fn check<'a>(&self, context: Option<&'a AuthContext>) -> Result<&'a AuthContext, AuthError> {
        let context = context.ok_or(AuthError::Unauthenticated)?;
        if self.allowed.contains(&context.role()) {
            Ok(context)
        } else {
            debug!(
                "Subject {} with role {} not in {:?}",
                context.subject_id(),
                context.role().as_str(),
                self.allowed
            );
            Err(AuthError::Forbidden)
        }
    }
}
