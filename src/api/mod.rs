// REST API of the user service

use axum::{
    Router, middleware,
    routing::{get, post, put},
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::auth::{
    AccessTokenGuard, CredentialAuthenticator, GatewayGuard, PasswordHasher, TokenCodec,
    TokenRefreshService, UserStore, gateway_middleware, resource_access_middleware,
};
use crate::config::ServiceConfig;

pub mod error;
mod health;
mod session;
pub mod users;


pub use error::{ApiError, AUTH_REALM};
pub use session::REFRESH_COOKIE;

pub const HEALTH_PATH: &str = "/actuator/health";
pub const LOGIN_PATH: &str = "/api/v1/auth/login";
pub const REFRESH_PATH: &str = "/api/v1/auth/refresh";

/// Services shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub authenticator: Arc<CredentialAuthenticator>,
    pub refresher: Arc<TokenRefreshService>,
    pub store: Arc<dyn UserStore>,
    pub hasher: Arc<dyn PasswordHasher>,
    /// Prefix of the `Authorization` header set on login and refresh responses
    pub token_prefix: String,
}

impl AppState {
    pub fn new(
        config: &ServiceConfig,
        store: Arc<dyn UserStore>,
        hasher: Arc<dyn PasswordHasher>,
    ) -> Self {
        let codec = TokenCodec::new(&config.tokens);
        Self {
            authenticator: Arc::new(CredentialAuthenticator::new(
                codec.clone(),
                store.clone(),
                hasher.clone(),
            )),
            refresher: Arc::new(TokenRefreshService::new(codec, store.clone())),
            store,
            hasher,
            token_prefix: config.tokens.header_prefix.clone(),
        }
    }
}

/// Build the router with the full middleware chain.
///
/// Requests pass, outermost first: tracing and CORS, the gateway check, then
/// access-token validation. Login and refresh authenticate by other means and
/// skip the access-token stage.
pub fn create_router(
    config: &ServiceConfig,
    store: Arc<dyn UserStore>,
    hasher: Arc<dyn PasswordHasher>,
) -> Router {
    let gateway = Arc::new(GatewayGuard::new(&config.gateway));
    let access = Arc::new(
        AccessTokenGuard::new(
            TokenCodec::new(&config.tokens),
            config.tokens.header_prefix.clone(),
        )
        .skip_path(LOGIN_PATH)
        .skip_path(REFRESH_PATH),
    );
    let state = AppState::new(config, store, hasher);

    Router::new()
        .route(HEALTH_PATH, get(health::health))
        .route(LOGIN_PATH, post(session::login))
        .route(REFRESH_PATH, post(session::refresh))
        .route("/api/v1/users", post(users::register).get(users::list))
        .route("/api/v1/users/availability", get(users::availability))
        .route("/api/v1/users/me", get(users::me))
        .route(
            "/api/v1/users/{id}",
            get(users::get_user).delete(users::delete_user),
        )
        .route("/api/v1/users/{id}/role", put(users::update_role))
        .layer(middleware::from_fn_with_state(
            access,
            resource_access_middleware,
        ))
        .layer(middleware::from_fn_with_state(gateway, gateway_middleware))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}
