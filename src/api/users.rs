//! User-management handlers. Every route authorizes from the caller's
//! security context alone.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::AppState;
use super::error::ApiError;
use crate::auth::{Authenticated, Scope};
use crate::db::{AppUser, Role, UserCreate};
use crate::types::{Email, UserId, Username};

/// Public view of a user; never carries the password hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: UserId,
    pub first_name: String,
    pub last_name: String,
    pub email: Email,
    pub username: Username,
    pub role: Role,
}

impl From<AppUser> for UserView {
    fn from(user: AppUser) -> Self {
        Self {
            id: user.id,
            first_name: user.first_name,
            last_name: user.last_name,
            email: user.email,
            username: user.username,
            role: user.role,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub role: Option<Role>,
}

impl RegisterRequest {
    fn check(&self) -> Result<(), ApiError> {
        let required = [
            ("firstName", &self.first_name),
            ("lastName", &self.last_name),
            ("username", &self.username),
            ("password", &self.password),
        ];
        if let Some((field, _)) = required.iter().find(|(_, value)| value.trim().is_empty()) {
            return Err(ApiError::BadRequest(format!("{} is required", field)));
        }
        if !self.email.contains('@') {
            return Err(ApiError::BadRequest("email is not valid".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
pub struct AvailabilityQuery {
    pub username: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Availability {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username_available: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_available: Option<bool>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentUser {
    #[serde(flatten)]
    pub user: UserView,
    pub granted_scopes: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct RoleUpdate {
    pub role: Role,
}

pub(super) async fn register(
    State(state): State<AppState>,
    Authenticated(ctx): Authenticated,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<UserView>), ApiError> {
    ctx.require_scope(Scope::CreateUser)?;
    let role = request.role.unwrap_or(Role::User);
    if role != Role::User {
        ctx.require_scope(Scope::UpdateUsers)?;
    }
    request.check()?;

    let username = Username::new(request.username.trim());
    let email = Email::new(request.email.trim());
    if state.store.find_by_username(&username).await?.is_some() {
        return Err(ApiError::Conflict(format!("username '{}' is taken", username)));
    }
    if state.store.find_by_email(&email).await?.is_some() {
        return Err(ApiError::Conflict(format!("email '{}' is registered", email)));
    }

    let password_hash = state.hasher.hash(&request.password)?;
    let created = state
        .store
        .create(&UserCreate {
            first_name: request.first_name,
            last_name: request.last_name,
            email,
            username,
            password_hash,
            role,
        })
        .await?;

    info!(
        username = %created.username,
        role = %created.role,
        by = %ctx.subject(),
        "user registered"
    );

    Ok((StatusCode::CREATED, Json(created.into())))
}

pub(super) async fn availability(
    State(state): State<AppState>,
    Authenticated(ctx): Authenticated,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<Availability>, ApiError> {
    ctx.require_scope(Scope::CheckAvailability)?;
    if query.username.is_none() && query.email.is_none() {
        return Err(ApiError::BadRequest(
            "username or email must be given".to_string(),
        ));
    }

    let username_available = match query.username {
        Some(name) => Some(
            state
                .store
                .find_by_username(&Username::new(name.trim()))
                .await?
                .is_none(),
        ),
        None => None,
    };
    let email_available = match query.email {
        Some(email) => Some(
            state
                .store
                .find_by_email(&Email::new(email.trim()))
                .await?
                .is_none(),
        ),
        None => None,
    };

    Ok(Json(Availability {
        username_available,
        email_available,
    }))
}

pub(super) async fn me(
    State(state): State<AppState>,
    Authenticated(ctx): Authenticated,
) -> Result<Json<CurrentUser>, ApiError> {
    let user = state
        .store
        .find_by_username(ctx.subject())
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("user '{}'", ctx.subject())))?;

    Ok(Json(CurrentUser {
        user: user.into(),
        granted_scopes: ctx.scopes().to_vec(),
    }))
}

pub(super) async fn list(
    State(state): State<AppState>,
    Authenticated(ctx): Authenticated,
) -> Result<Json<Vec<UserView>>, ApiError> {
    ctx.require_scope(Scope::ReadUsers)?;
    let users = state.store.list().await?;
    Ok(Json(users.into_iter().map(UserView::from).collect()))
}

pub(super) async fn get_user(
    State(state): State<AppState>,
    Authenticated(ctx): Authenticated,
    Path(id): Path<String>,
) -> Result<Json<UserView>, ApiError> {
    ctx.require_scope(Scope::ReadUsers)?;
    let user = state
        .store
        .find_by_id(&UserId::new(id.as_str()))
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("user {}", id)))?;
    Ok(Json(user.into()))
}

pub(super) async fn update_role(
    State(state): State<AppState>,
    Authenticated(ctx): Authenticated,
    Path(id): Path<String>,
    Json(update): Json<RoleUpdate>,
) -> Result<Json<UserView>, ApiError> {
    ctx.require_scope(Scope::UpdateUsers)?;
    let user = state
        .store
        .update_role(&UserId::new(id.as_str()), update.role)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("user {}", id)))?;

    info!(
        username = %user.username,
        role = %user.role,
        by = %ctx.subject(),
        "role updated"
    );

    Ok(Json(user.into()))
}

pub(super) async fn delete_user(
    State(state): State<AppState>,
    Authenticated(ctx): Authenticated,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    ctx.require_scope(Scope::DeleteUsers)?;
    if !state.store.delete(&UserId::new(id.as_str())).await? {
        return Err(ApiError::NotFound(format!("user {}", id)));
    }

    info!(user_id = %id, by = %ctx.subject(), "user deleted");
    Ok(StatusCode::NO_CONTENT)
}
