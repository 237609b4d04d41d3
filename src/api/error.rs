//! HTTP mapping of pipeline and API errors.

use std::fmt;

use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::json;
use tracing::error;

use crate::auth::AuthError;

/// Realm advertised in `WWW-Authenticate` challenges.
pub const AUTH_REALM: &str = "auth-service";

fn bearer_challenge(error: Option<&str>, description: Option<&str>) -> String {
    let mut challenge = format!("Bearer realm=\"{}\"", AUTH_REALM);
    if let Some(error) = error {
        challenge.push_str(&format!(", error=\"{}\"", error));
    }
    if let Some(description) = description {
        // Quotes would end the parameter early.
        let description = description.replace('"', "'");
        challenge.push_str(&format!(", error_description=\"{}\"", description));
    }
    challenge
}

impl AuthError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::GatewaySubversion
            | Self::AuthenticationFailed
            | Self::ExpiredToken
            | Self::SecurityException(_)
            | Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::MalformedToken(_) | Self::EmptyToken => StatusCode::BAD_REQUEST,
            Self::InsufficientScope(_) => StatusCode::FORBIDDEN,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short machine-readable code used in JSON bodies.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::GatewaySubversion => "gateway_subversion",
            Self::AuthenticationFailed => "authentication_failed",
            Self::ExpiredToken => "expired_token",
            Self::MalformedToken(_) => "malformed_token",
            Self::EmptyToken => "empty_token",
            Self::SecurityException(_) => "security_exception",
            Self::Unauthenticated => "unauthenticated",
            Self::InsufficientScope(_) => "insufficient_scope",
            Self::Internal(_) => "internal_error",
        }
    }

    /// Value of the `WWW-Authenticate` header, if the error carries one.
    pub fn challenge(&self) -> Option<String> {
        match self {
            Self::ExpiredToken => Some(bearer_challenge(
                Some("invalid_token"),
                Some("The access token expired"),
            )),
            Self::MalformedToken(_) | Self::EmptyToken => Some(bearer_challenge(
                Some("invalid_request"),
                Some(&self.to_string()),
            )),
            Self::SecurityException(_) => Some(bearer_challenge(
                Some("invalid_token"),
                Some(&self.to_string()),
            )),
            Self::Unauthenticated => Some(bearer_challenge(None, None)),
            Self::InsufficientScope(scope) => Some(bearer_challenge(
                Some("insufficient_scope"),
                Some(&format!("Requires scope {}", scope)),
            )),
            Self::GatewaySubversion | Self::AuthenticationFailed | Self::Internal(_) => None,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // A request that skipped the gateway learns nothing.
        if matches!(self, Self::GatewaySubversion) {
            return status.into_response();
        }

        let message = match &self {
            Self::Internal(detail) => {
                error!("internal error in auth pipeline: {}", detail);
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        let mut response = (
            status,
            Json(json!({ "error": self.error_code(), "message": message })),
        )
            .into_response();

        if let Some(challenge) = self.challenge()
            && let Ok(value) = HeaderValue::from_str(&challenge)
        {
            response.headers_mut().insert(header::WWW_AUTHENTICATE, value);
        }

        response
    }
}

/// Errors returned by the user-management and auth handlers.
#[derive(Debug)]
pub enum ApiError {
    Auth(AuthError),
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    Internal(String),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auth(err) => write!(f, "{}", err),
            Self::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            Self::NotFound(msg) => write!(f, "Not found: {}", msg),
            Self::Conflict(msg) => write!(f, "Conflict: {}", msg),
            Self::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        Self::Auth(err)
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            Self::Auth(err) => return err.into_response(),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            Self::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg),
            Self::Internal(detail) => {
                error!("internal error: {}", detail);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "Internal server error".to_string(),
                )
            }
        };

        (status, Json(json!({ "error": code, "message": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Scope;

    fn challenge_of(response: &Response) -> Option<&str> {
        response
            .headers()
            .get(header::WWW_AUTHENTICATE)
            .and_then(|v| v.to_str().ok())
    }

    #[test]
    fn test_status_codes() {
        let cases = [
            (AuthError::GatewaySubversion, StatusCode::UNAUTHORIZED),
            (AuthError::AuthenticationFailed, StatusCode::UNAUTHORIZED),
            (AuthError::ExpiredToken, StatusCode::UNAUTHORIZED),
            (AuthError::MalformedToken("x".into()), StatusCode::BAD_REQUEST),
            (AuthError::EmptyToken, StatusCode::BAD_REQUEST),
            (AuthError::SecurityException("x".into()), StatusCode::UNAUTHORIZED),
            (AuthError::Unauthenticated, StatusCode::UNAUTHORIZED),
            (AuthError::InsufficientScope(Scope::ReadUsers), StatusCode::FORBIDDEN),
            (AuthError::Internal("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(err.clone().into_response().status(), status, "{err}");
        }
    }

    #[test]
    fn test_expired_token_challenge() {
        let response = AuthError::ExpiredToken.into_response();
        let challenge = challenge_of(&response).unwrap();
        assert!(challenge.starts_with("Bearer realm=\"auth-service\""));
        assert!(challenge.contains("error=\"invalid_token\""));
        assert!(challenge.contains("error_description="));
    }

    #[test]
    fn test_malformed_token_challenge() {
        let response = AuthError::MalformedToken("bad \"sig\"".into()).into_response();
        let challenge = challenge_of(&response).unwrap();
        assert!(challenge.contains("error=\"invalid_request\""));
        assert!(!challenge.contains("\"sig\""));
    }

    #[test]
    fn test_gateway_rejection_is_bare() {
        let response = AuthError::GatewaySubversion.into_response();
        assert!(challenge_of(&response).is_none());
        assert!(response.headers().get(header::CONTENT_TYPE).is_none());
    }

    #[test]
    fn test_unauthenticated_challenge_has_only_realm() {
        let response = AuthError::Unauthenticated.into_response();
        assert_eq!(challenge_of(&response), Some("Bearer realm=\"auth-service\""));
    }

    #[test]
    fn test_api_error_statuses() {
        assert_eq!(
            ApiError::Conflict("taken".into()).into_response().status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::NotFound("user".into()).into_response().status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(anyhow::anyhow!("db down")).into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ApiError::from(AuthError::EmptyToken).into_response().status(),
            StatusCode::BAD_REQUEST
        );
    }
}
