//! Username/password login.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::auth::error::AuthError;
use crate::auth::password::PasswordHasher;
use crate::auth::scope::{join_scopes, map_scopes, parse_scopes, scope_names};
use crate::auth::token::{TokenClaims, TokenCodec, TokenKind};
use crate::auth::user_store::UserStore;
use crate::db::AppUser;
use crate::types::{EncodedToken, Username};

/// Body of the login request.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

impl LoginRequest {
    /// Parse the raw body. An unreadable body is an internal failure, not a
    /// credential failure.
    pub fn from_json(body: &[u8]) -> Result<Self, AuthError> {
        serde_json::from_slice(body)
            .map_err(|e| AuthError::Internal(format!("unreadable login request: {}", e)))
    }
}

/// Tokens and grant details returned by login and refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPrincipal {
    pub username: Username,
    pub access_token: EncodedToken,
    pub access_token_created_at: DateTime<Utc>,
    pub access_token_expires_at: DateTime<Utc>,
    /// Absent on refresh; refresh tokens are not rotated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<EncodedToken>,
    /// Comma-joined scope names
    pub granted_scopes: String,
}

impl UserPrincipal {
    pub fn from_access_claims(
        claims: &TokenClaims,
        access_token: EncodedToken,
        refresh_token: Option<EncodedToken>,
    ) -> Self {
        Self {
            username: claims.subject.clone(),
            access_token,
            access_token_created_at: claims.issued_at_utc(),
            access_token_expires_at: claims.expires_at_utc(),
            refresh_token,
            granted_scopes: join_scopes(&claims.scopes),
        }
    }

    pub fn scopes(&self) -> Vec<String> {
        parse_scopes(&self.granted_scopes)
    }
}

/// Verifies credentials and issues the token pair for a login.
#[derive(Clone)]
pub struct CredentialAuthenticator {
    codec: TokenCodec,
    store: Arc<dyn UserStore>,
    hasher: Arc<dyn PasswordHasher>,
    /// Verified against when the username is unknown, so both paths pay for
    /// a password check.
    dummy_hash: Option<String>,
}

const DUMMY_PASSWORD: &str = "unknown-user-placeholder";

impl CredentialAuthenticator {
    pub fn new(
        codec: TokenCodec,
        store: Arc<dyn UserStore>,
        hasher: Arc<dyn PasswordHasher>,
    ) -> Self {
        let dummy_hash = match hasher.hash(DUMMY_PASSWORD) {
            Ok(hash) => Some(hash),
            Err(e) => {
                warn!("could not prepare placeholder password hash: {}", e);
                None
            }
        };
        Self {
            codec,
            store,
            hasher,
            dummy_hash,
        }
    }

    /// Look up the user and check the password. Every mismatch, including an
    /// unknown username or a locked account, is `AuthenticationFailed`.
    pub async fn authenticate_credentials(
        &self,
        username: &str,
        password: &str,
    ) -> Result<AppUser, AuthError> {
        if username.is_empty() || password.is_empty() {
            return Err(AuthError::AuthenticationFailed);
        }

        let user = self
            .store
            .find_by_username(&Username::new(username))
            .await
            .map_err(|e| AuthError::Internal(e.to_string()))?;
        let Some(user) = user else {
            if let Some(dummy_hash) = &self.dummy_hash {
                let _ = self.hasher.verify(password, dummy_hash);
            }
            return Err(AuthError::AuthenticationFailed);
        };

        let matches = match self.hasher.verify(password, &user.password_hash) {
            Ok(matches) => matches,
            Err(e) => {
                warn!(username = %user.username, "stored password hash is unusable: {}", e);
                false
            }
        };
        if !matches {
            return Err(AuthError::AuthenticationFailed);
        }

        if user.role.is_locked() {
            warn!(username = %user.username, "login attempt on locked account");
            return Err(AuthError::AuthenticationFailed);
        }

        Ok(user)
    }

    /// Authenticate and issue a refresh token and an access token.
    ///
    /// Both tokens carry the same subject, issuer, issued-at and scopes. The
    /// access token expires at the configured access lifetime, capped by the
    /// refresh token's expiry; with equal lifetimes the claims are identical.
    pub async fn login(&self, request: &LoginRequest) -> Result<UserPrincipal, AuthError> {
        let user = match self
            .authenticate_credentials(&request.username, &request.password)
            .await
        {
            Ok(user) => user,
            Err(err) => {
                warn!(username = %request.username, "login failed: {}", err);
                return Err(err);
            }
        };

        let now = Utc::now();
        let scopes = scope_names(&map_scopes(user.role));

        let refresh_claims =
            self.codec
                .claims_for(TokenKind::Refresh, user.username.clone(), scopes, now);
        let refresh_token = self.codec.sign(&refresh_claims)?;

        let refresh_expiry = refresh_claims.expires_at;
        let mut access_claims = refresh_claims.with_kind(TokenKind::Access);
        access_claims.expires_at =
            refresh_expiry.min((now + self.codec.ttl(TokenKind::Access)).timestamp());
        let access_token = self.codec.sign(&access_claims)?;

        info!(username = %user.username, role = %user.role, "login succeeded");

        Ok(UserPrincipal::from_access_claims(
            &access_claims,
            access_token,
            Some(refresh_token),
        ))
    }
}
