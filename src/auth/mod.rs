//! Request authentication and authorization pipeline.
//!
//! Every inbound request runs through these stages, in order:
//!
//! - **Gateway check** ([`gateway_middleware`]): the request must carry the
//!   gateway stamp, unless it targets a health-check path.
//! - **Login** ([`CredentialAuthenticator`]): on the login route only,
//!   username and password are verified and a token pair is issued.
//! - **Resource access** ([`resource_access_middleware`]): on every other
//!   route, a bearer access token, if present, must verify; its subject and
//!   scopes become the request's [`SecurityContext`].
//!
//! Handlers then authorize business operations from the `SecurityContext`
//! alone. [`TokenRefreshService`] trades a refresh token for a new access
//! token.
//!
//! ## Usage
//!
//! ```ignore
//! async fn delete_user(Authenticated(ctx): Authenticated) -> Result<(), AuthError> {
//!     ctx.require_scope(Scope::DeleteUsers)?;
//!     // ...
//! }
//! ```

mod access;
mod authenticator;
mod context;
mod error;
mod gateway;
mod password;
mod refresh;
pub mod scope;
pub mod token;
mod user_store;

pub use access::{AccessTokenGuard, resource_access_middleware};
pub use authenticator::{CredentialAuthenticator, LoginRequest, UserPrincipal};
pub use context::{Authenticated, SecurityContext};
pub use error::AuthError;
pub use gateway::{
    GatewayGuard, HEALTH_CHECK_PATH, RequestOrigin, expected_gateway_value, gateway_middleware,
};
pub use password::{Argon2PasswordHasher, PasswordHasher};
pub use refresh::TokenRefreshService;
pub use scope::{Scope, map_scopes};
pub use token::{TokenClaims, TokenCodec, TokenError, TokenKind};
pub use user_store::{SurrealUserStore, UserStore};

#[cfg(test)]
pub(crate) use user_store::tests as user_store_tests;
