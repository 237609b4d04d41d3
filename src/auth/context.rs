//! Request-scoped security context.
//!
//! A `SecurityContext` lives in the request extensions of a single request.
//! It is inserted by the resource-access middleware and read by handlers
//! through the [`Authenticated`] extractor. There is no process-wide holder.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::auth::error::AuthError;
use crate::auth::scope::Scope;
use crate::types::Username;

/// Authenticated identity plus the scopes granted by its token.
///
/// Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityContext {
    /// Token subject
    subject: Username,
    /// Scope names as carried by the token, in grant order
    scopes: Vec<String>,
}

impl SecurityContext {
    pub fn new(subject: Username, scopes: Vec<String>) -> Self {
        Self { subject, scopes }
    }

    pub fn subject(&self) -> &Username {
        &self.subject
    }

    pub fn scopes(&self) -> &[String] {
        &self.scopes
    }

    pub fn has_scope(&self, scope: Scope) -> bool {
        self.scopes.iter().any(|granted| granted == scope.as_str())
    }

    /// Fail with `InsufficientScope` unless `scope` was granted.
    pub fn require_scope(&self, scope: Scope) -> Result<(), AuthError> {
        if self.has_scope(scope) {
            Ok(())
        } else {
            Err(AuthError::InsufficientScope(scope))
        }
    }
}

/// Extractor for routes that need a caller. Rejects with `Unauthenticated`.
#[derive(Debug, Clone)]
pub struct Authenticated(pub SecurityContext);

impl std::ops::Deref for Authenticated {
    type Target = SecurityContext;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<S> FromRequestParts<S> for Authenticated
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<SecurityContext>()
            .cloned()
            .map(Authenticated)
            .ok_or(AuthError::Unauthenticated)
    }
}
