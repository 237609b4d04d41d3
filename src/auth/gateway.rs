//! Gateway-origin verification.
//!
//! The gateway stamps every request it forwards with a header whose value is
//! `hex(SHA-512(salt || secret))`. Requests without the stamp are rejected,
//! except health checks, which the platform calls directly.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use sha2::{Digest, Sha512};
use subtle::ConstantTimeEq;
use tracing::{debug, warn};

use crate::auth::context::SecurityContext;
use crate::auth::error::AuthError;
use crate::config::GatewayCredential;

/// Path fragment identifying health-check endpoints.
pub const HEALTH_CHECK_PATH: &str = "/actuator";

/// How a request was admitted by the gateway check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOrigin {
    /// Health-check path; gateway enforcement skipped.
    HealthCheck,
    /// Carried a valid gateway stamp.
    GatewayVerified,
}

/// Expected gateway header value for a salt and secret.
pub fn expected_gateway_value(salt: &str, secret: &str) -> String {
    let mut hasher = Sha512::new();
    hasher.update(salt.as_bytes());
    hasher.update(secret.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Verifies the gateway stamp. The expected value is computed once.
#[derive(Debug, Clone)]
pub struct GatewayGuard {
    header_name: String,
    expected: String,
}

impl GatewayGuard {
    pub fn new(credential: &GatewayCredential) -> Self {
        Self {
            header_name: credential.header_name.clone(),
            expected: expected_gateway_value(&credential.salt, &credential.secret),
        }
    }

    pub fn header_name(&self) -> &str {
        &self.header_name
    }

    /// Constant-time comparison against the expected stamp.
    fn matches(&self, value: &str) -> bool {
        value.trim().as_bytes().ct_eq(self.expected.as_bytes()).into()
    }

    /// Decide whether a request may proceed.
    pub fn check(&self, path: &str, header: Option<&str>) -> Result<RequestOrigin, AuthError> {
        if path.contains(HEALTH_CHECK_PATH) {
            return Ok(RequestOrigin::HealthCheck);
        }

        match header {
            Some(value) if self.matches(value) => Ok(RequestOrigin::GatewayVerified),
            _ => Err(AuthError::GatewaySubversion),
        }
    }
}

/// Axum middleware running the gateway check ahead of everything else.
///
/// On success the [`RequestOrigin`] is stored in the request extensions. On
/// failure any security context is dropped and a bare 401 is returned.
pub async fn gateway_middleware(
    State(guard): State<Arc<GatewayGuard>>,
    mut req: Request,
    next: Next,
) -> Response {
    let header = req
        .headers()
        .get(guard.header_name())
        .and_then(|h| h.to_str().ok());
    let header_present = header.is_some();
    let decision = guard.check(req.uri().path(), header);

    match decision {
        Ok(origin) => {
            debug!(path = %req.uri().path(), ?origin, "gateway check passed");
            req.extensions_mut().insert(origin);
            next.run(req).await
        }
        Err(_) => {
            warn!(
                path = %req.uri().path(),
                header_present,
                "rejecting request that bypassed the gateway"
            );
            req.extensions_mut().remove::<SecurityContext>();
            StatusCode::UNAUTHORIZED.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credential() -> GatewayCredential {
        GatewayCredential {
            header_name: "X-RPM-Gateway".to_string(),
            salt: "salt".to_string(),
            secret: "secret".to_string(),
        }
    }

    #[test]
    fn test_expected_value_is_sha512_hex_of_salt_then_secret() {
        let value = expected_gateway_value("salt", "secret");
        assert_eq!(value.len(), 128);
        assert!(value.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));

        let mut hasher = Sha512::new();
        hasher.update(b"saltsecret");
        assert_eq!(value, format!("{:x}", hasher.finalize()));

        assert_ne!(value, expected_gateway_value("secret", "salt"));
    }

    #[test]
    fn test_matching_header_passes() {
        let guard = GatewayGuard::new(&credential());
        let stamp = expected_gateway_value("salt", "secret");
        assert_eq!(
            guard.check("/api/v1/users", Some(&stamp)),
            Ok(RequestOrigin::GatewayVerified)
        );
    }

    #[test]
    fn test_missing_or_wrong_header_fails() {
        let guard = GatewayGuard::new(&credential());
        assert_eq!(
            guard.check("/api/v1/users", None),
            Err(AuthError::GatewaySubversion)
        );
        assert_eq!(
            guard.check("/api/v1/users", Some("secret")),
            Err(AuthError::GatewaySubversion)
        );
        let other = expected_gateway_value("salt", "other");
        assert_eq!(
            guard.check("/api/v1/users", Some(&other)),
            Err(AuthError::GatewaySubversion)
        );
    }

    #[test]
    fn test_actuator_paths_always_pass() {
        let guard = GatewayGuard::new(&credential());
        assert_eq!(
            guard.check("/actuator/health", None),
            Ok(RequestOrigin::HealthCheck)
        );
        assert_eq!(
            guard.check("/management/actuator/info", Some("garbage")),
            Ok(RequestOrigin::HealthCheck)
        );
    }

    #[test]
    fn test_near_miss_stamps_fail() {
        let guard = GatewayGuard::new(&credential());
        let stamp = expected_gateway_value("salt", "secret");

        let mut last_flipped = stamp.clone();
        let last = if stamp.ends_with('0') { "1" } else { "0" };
        last_flipped.replace_range(stamp.len() - 1.., last);
        assert_eq!(
            guard.check("/api/v1/users", Some(&last_flipped)),
            Err(AuthError::GatewaySubversion)
        );

        let truncated = &stamp[..stamp.len() - 1];
        assert_eq!(
            guard.check("/api/v1/users", Some(truncated)),
            Err(AuthError::GatewaySubversion)
        );
        let extended = format!("{stamp}0");
        assert_eq!(
            guard.check("/api/v1/users", Some(&extended)),
            Err(AuthError::GatewaySubversion)
        );

        let padded = format!("  {stamp} ");
        assert_eq!(
            guard.check("/api/v1/users", Some(&padded)),
            Ok(RequestOrigin::GatewayVerified)
        );
    }
}
