//! Access-token validation for resource requests.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::debug;

use crate::auth::context::SecurityContext;
use crate::auth::error::AuthError;
use crate::auth::gateway::RequestOrigin;
use crate::auth::token::{TokenCodec, TokenKind};

/// Validates the bearer token of a request, when there is one.
///
/// Absence of a token is not an error here; routes that need a caller reject
/// through the [`Authenticated`](crate::auth::Authenticated) extractor. A
/// token that is present must be valid.
#[derive(Debug, Clone)]
pub struct AccessTokenGuard {
    codec: TokenCodec,
    prefix: String,
    /// Paths served without looking at the `Authorization` header.
    skip_paths: Vec<String>,
}

impl AccessTokenGuard {
    pub fn new(codec: TokenCodec, prefix: impl Into<String>) -> Self {
        Self {
            codec,
            prefix: prefix.into(),
            skip_paths: Vec::new(),
        }
    }

    /// Exempt an exact path, e.g. the login route.
    pub fn skip_path(mut self, path: impl Into<String>) -> Self {
        self.skip_paths.push(path.into());
        self
    }

    pub fn skips(&self, path: &str) -> bool {
        self.skip_paths.iter().any(|p| p == path)
    }

    /// Resolve the `Authorization` header into a security context.
    ///
    /// `Ok(None)` means anonymous: no header, or one without the prefix.
    pub fn authorize(&self, authorization: Option<&str>) -> Result<Option<SecurityContext>, AuthError> {
        let Some(token) = authorization.and_then(|value| value.strip_prefix(self.prefix.as_str()))
        else {
            return Ok(None);
        };

        let claims = self.codec.verify(token, TokenKind::Access)?;
        Ok(Some(SecurityContext::new(claims.subject, claims.scopes)))
    }
}

/// Axum middleware populating the [`SecurityContext`] from the access token.
///
/// Health checks and skipped paths pass straight through. Expired tokens get
/// a 401 `invalid_token` challenge, any other token failure a 400
/// `invalid_request` one; the request goes no further in either case.
pub async fn resource_access_middleware(
    State(guard): State<Arc<AccessTokenGuard>>,
    mut req: Request,
    next: Next,
) -> Response {
    let health_check = matches!(
        req.extensions().get::<RequestOrigin>(),
        Some(RequestOrigin::HealthCheck)
    );
    if health_check || guard.skips(req.uri().path()) {
        return next.run(req).await;
    }

    let authorization = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok());
    let decision = guard.authorize(authorization);

    match decision {
        Ok(Some(context)) => {
            debug!(subject = %context.subject(), "access token accepted");
            req.extensions_mut().insert(context);
            next.run(req).await
        }
        Ok(None) => {
            req.extensions_mut().remove::<SecurityContext>();
            next.run(req).await
        }
        Err(err) => {
            debug!(path = %req.uri().path(), error = %err, "access token rejected");
            req.extensions_mut().remove::<SecurityContext>();
            err.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::scope::{map_scopes, scope_names};
    use crate::auth::token::TokenClaims;
    use crate::config::TokenConfig;
    use crate::db::Role;
    use crate::types::Username;
    use chrono::{Duration, Utc};

    fn guard() -> AccessTokenGuard {
        let codec = TokenCodec::new(&TokenConfig::new("access", "refresh"));
        AccessTokenGuard::new(codec, "Bearer ").skip_path("/api/v1/auth/login")
    }

    fn bearer(guard: &AccessTokenGuard, claims: &TokenClaims) -> String {
        format!("Bearer {}", guard.codec.sign(claims).unwrap())
    }

    #[test]
    fn test_no_header_is_anonymous() {
        assert_eq!(guard().authorize(None), Ok(None));
    }

    #[test]
    fn test_other_scheme_is_anonymous() {
        assert_eq!(guard().authorize(Some("Basic amRvZTpzZWNyZXQ=")), Ok(None));
    }

    #[test]
    fn test_valid_token_builds_context() {
        let guard = guard();
        let scopes = scope_names(&map_scopes(Role::Client));
        let claims = guard.codec.claims_for(
            TokenKind::Access,
            Username::new("client-app"),
            scopes.clone(),
            Utc::now(),
        );

        let ctx = guard.authorize(Some(&bearer(&guard, &claims))).unwrap().unwrap();
        assert_eq!(ctx.subject().as_str(), "client-app");
        assert_eq!(ctx.scopes(), scopes.as_slice());
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let guard = guard();
        let claims = TokenClaims::new(
            TokenKind::Access,
            Username::new("jdoe"),
            "rpm-user-service",
            vec![],
            Utc::now() - Duration::minutes(10),
            Duration::minutes(10) - Duration::seconds(1),
        );
        assert_eq!(
            guard.authorize(Some(&bearer(&guard, &claims))),
            Err(AuthError::ExpiredToken)
        );
    }

    #[test]
    fn test_present_but_invalid_token_is_rejected() {
        let guard = guard();
        assert_eq!(guard.authorize(Some("Bearer ")), Err(AuthError::EmptyToken));
        assert!(matches!(
            guard.authorize(Some("Bearer not-a-token")),
            Err(AuthError::MalformedToken(_))
        ));
    }

    #[test]
    fn test_refresh_token_is_not_an_access_token() {
        let guard = guard();
        let claims = guard.codec.claims_for(
            TokenKind::Refresh,
            Username::new("jdoe"),
            vec![],
            Utc::now(),
        );
        assert!(matches!(
            guard.authorize(Some(&bearer(&guard, &claims))),
            Err(AuthError::MalformedToken(_))
        ));
    }

    #[test]
    fn test_skip_paths_are_exact() {
        let guard = guard();
        assert!(guard.skips("/api/v1/auth/login"));
        assert!(!guard.skips("/api/v1/auth/login/extra"));
        assert!(!guard.skips("/api/v1/users"));
    }
}
