// Core modules
pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod logging;
pub mod types;

// Re-export key types and functions
pub use api::{AppState, create_router};
pub use auth::{
    Argon2PasswordHasher, AuthError, CredentialAuthenticator, GatewayGuard, SecurityContext,
    SurrealUserStore, TokenCodec, TokenRefreshService, UserStore,
};
pub use config::{GatewayCredential, ServiceConfig, TokenConfig};
pub use db::{DatabaseConfig, Role, create_connection, ensure_schema};

use anyhow::Result;
use axum::Router;
use std::sync::Arc;

/// Open the configured database, apply the schema and return a SurrealDB-backed user store.
pub async fn open_user_store(config: DatabaseConfig) -> Result<SurrealUserStore> {
    let db = create_connection(config).await?;
    ensure_schema(&db).await?;
    Ok(SurrealUserStore::new(db))
}

/// Convenience function to build the complete application router.
pub async fn build_app(config: &ServiceConfig) -> Result<Router> {
    let store = open_user_store(config.database.clone()).await?;
    Ok(create_router(
        config,
        Arc::new(store),
        Arc::new(Argon2PasswordHasher),
    ))
}
