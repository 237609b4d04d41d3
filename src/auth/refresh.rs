//! Access-token refresh.

use std::sync::Arc;

use tracing::{info, warn};

use crate::auth::authenticator::UserPrincipal;
use crate::auth::error::AuthError;
use crate::auth::token::{TokenCodec, TokenKind};
use crate::auth::user_store::UserStore;

/// Mints a new access token from a still-valid refresh token.
///
/// Scopes come from the refresh token itself, not from the user's current
/// role. The store is consulted only to refuse subjects that were removed or
/// locked since the refresh token was issued.
#[derive(Clone)]
pub struct TokenRefreshService {
    codec: TokenCodec,
    store: Arc<dyn UserStore>,
}

impl TokenRefreshService {
    pub fn new(codec: TokenCodec, store: Arc<dyn UserStore>) -> Self {
        Self { codec, store }
    }

    pub async fn refresh(&self, refresh_token: &str) -> Result<UserPrincipal, AuthError> {
        let claims = self.codec.verify(refresh_token, TokenKind::Refresh)?;

        let user = self
            .store
            .find_by_username(&claims.subject)
            .await
            .map_err(|e| AuthError::Internal(e.to_string()))?;
        match user {
            None => {
                warn!(subject = %claims.subject, "refresh for unknown subject");
                return Err(AuthError::SecurityException(
                    "subject no longer exists".to_string(),
                ));
            }
            Some(user) if user.role.is_locked() => {
                warn!(subject = %claims.subject, "refresh for locked account");
                return Err(AuthError::SecurityException("account is locked".to_string()));
            }
            Some(_) => {}
        }

        let (access_claims, access_token) =
            self.codec
                .issue(TokenKind::Access, claims.subject, claims.scopes)?;

        info!(subject = %access_claims.subject, "access token refreshed");

        Ok(UserPrincipal::from_access_claims(&access_claims, access_token, None))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::scope::{map_scopes, scope_names};
    use crate::auth::user_store::SurrealUserStore;
    use crate::auth::user_store::tests::{new_user, setup_test_store};
    use crate::config::TokenConfig;
    use crate::db::Role;
    use crate::types::{EncodedToken, Username};
    use chrono::{Duration, Utc};

    async fn setup(role: Role) -> (TokenRefreshService, TokenCodec, SurrealUserStore) {
        let store = setup_test_store().await;
        store.create(&new_user("jdoe", role, "hash")).await.unwrap();

        let codec = TokenCodec::new(&TokenConfig::new("access", "refresh"));
        let service = TokenRefreshService::new(codec.clone(), Arc::new(store.clone()));
        (service, codec, store)
    }

    fn refresh_token_for(codec: &TokenCodec, username: &str, role: Role) -> EncodedToken {
        let claims = codec.claims_for(
            TokenKind::Refresh,
            Username::new(username),
            scope_names(&map_scopes(role)),
            Utc::now(),
        );
        codec.sign(&claims).unwrap()
    }

    #[tokio::test]
    async fn test_refresh_mints_access_token_with_token_scopes() {
        let (service, codec, store) = setup(Role::Dev).await;
        let token = refresh_token_for(&codec, "jdoe", Role::Dev);

        // Downgrade after issuance; scopes still come from the refresh token.
        let user = store
            .find_by_username(&Username::new("jdoe"))
            .await
            .unwrap()
            .unwrap();
        store.update_role(&user.id, Role::User).await.unwrap();

        let principal = service.refresh(token.as_str()).await.unwrap();
        assert!(principal.refresh_token.is_none());
        assert_eq!(principal.scopes(), scope_names(&map_scopes(Role::Dev)));

        let access = codec
            .verify(principal.access_token.as_str(), TokenKind::Access)
            .unwrap();
        assert_eq!(access.subject.as_str(), "jdoe");
        assert_eq!(access.scopes, scope_names(&map_scopes(Role::Dev)));
    }

    #[tokio::test]
    async fn test_locked_subject_is_refused() {
        let (service, codec, store) = setup(Role::User).await;
        let token = refresh_token_for(&codec, "jdoe", Role::User);

        let user = store
            .find_by_username(&Username::new("jdoe"))
            .await
            .unwrap()
            .unwrap();
        store.update_role(&user.id, Role::Locked).await.unwrap();

        assert!(matches!(
            service.refresh(token.as_str()).await,
            Err(AuthError::SecurityException(_))
        ));
    }

    #[tokio::test]
    async fn test_unknown_subject_is_refused() {
        let (service, codec, _) = setup(Role::User).await;
        let token = refresh_token_for(&codec, "ghost", Role::Admin);

        assert!(matches!(
            service.refresh(token.as_str()).await,
            Err(AuthError::SecurityException(_))
        ));
    }

    #[tokio::test]
    async fn test_access_token_cannot_refresh() {
        let (service, codec, _) = setup(Role::User).await;
        let access = codec
            .sign(&codec.claims_for(
                TokenKind::Access,
                Username::new("jdoe"),
                vec![],
                Utc::now(),
            ))
            .unwrap();

        assert!(matches!(
            service.refresh(access.as_str()).await,
            Err(AuthError::MalformedToken(_))
        ));
    }

    #[tokio::test]
    async fn test_expired_and_empty_refresh_tokens() {
        let (service, codec, _) = setup(Role::User).await;
        let mut stale = codec.claims_for(
            TokenKind::Refresh,
            Username::new("jdoe"),
            vec![],
            Utc::now() - Duration::days(3),
        );
        stale.expires_at = Utc::now().timestamp() - 1;
        let token = codec.sign(&stale).unwrap();

        assert_eq!(
            service.refresh(token.as_str()).await.unwrap_err(),
            AuthError::ExpiredToken
        );
        assert_eq!(service.refresh("").await.unwrap_err(), AuthError::EmptyToken);
    }
}
