//! Error taxonomy of the authentication pipeline.
//!
//! Every guard and service returns one of these instead of failing by panic
//! or by a sentinel; the HTTP layer turns the variant into a status code and
//! challenge header.

use std::fmt;

use crate::auth::scope::Scope;
use crate::auth::token::TokenError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// The request did not come through the trusted gateway.
    GatewaySubversion,
    /// Username or password did not match, or the account may not log in.
    AuthenticationFailed,
    /// The presented token reached its expiry.
    ExpiredToken,
    /// The presented token could not be parsed or verified.
    MalformedToken(String),
    /// A token was required but none was supplied.
    EmptyToken,
    /// A refresh was refused because the subject is gone or locked.
    SecurityException(String),
    /// The route requires an authenticated caller.
    Unauthenticated,
    /// The caller lacks the scope the operation needs.
    InsufficientScope(Scope),
    /// Anything else; never caused by the caller's credentials.
    Internal(String),
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GatewaySubversion => write!(f, "Request did not pass through the gateway"),
            Self::AuthenticationFailed => write!(f, "Bad credentials"),
            Self::ExpiredToken => write!(f, "The access token expired"),
            Self::MalformedToken(msg) => write!(f, "Malformed token: {}", msg),
            Self::EmptyToken => write!(f, "Token is missing or empty"),
            Self::SecurityException(msg) => write!(f, "Security exception: {}", msg),
            Self::Unauthenticated => write!(f, "Authentication required"),
            Self::InsufficientScope(scope) => write!(f, "Missing required scope: {}", scope),
            Self::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for AuthError {}

impl From<TokenError> for AuthError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Empty => Self::EmptyToken,
            TokenError::Expired => Self::ExpiredToken,
            TokenError::Malformed(msg) => Self::MalformedToken(msg),
            TokenError::InvalidClaims(msg) | TokenError::Signing(msg) => Self::Internal(msg),
        }
    }
}
