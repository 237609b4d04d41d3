//! User storage.
//!
//! The auth pipeline only needs [`UserStore::find_by_username`]; the rest of
//! the trait backs the user-management routes.

use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

use crate::db::Db;
use crate::db::schema::{AppUser, Role, UserCreate, UserRecord};
use crate::types::{Email, UserId, Username};

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_username(&self, username: &Username) -> Result<Option<AppUser>>;

    async fn find_by_email(&self, email: &Email) -> Result<Option<AppUser>>;

    async fn find_by_id(&self, id: &UserId) -> Result<Option<AppUser>>;

    async fn list(&self) -> Result<Vec<AppUser>>;

    /// Insert a user. Fails if the username or email is taken.
    async fn create(&self, create: &UserCreate) -> Result<AppUser>;

    async fn update_role(&self, id: &UserId, role: Role) -> Result<Option<AppUser>>;

    /// Returns whether a user was removed.
    async fn delete(&self, id: &UserId) -> Result<bool>;
}

/// SurrealDB-backed user store (table: `app_user`).
#[derive(Clone)]
pub struct SurrealUserStore {
    db: Db,
}

impl SurrealUserStore {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    async fn find_one(&self, field: &'static str, value: String) -> Result<Option<AppUser>> {
        let query = format!("SELECT * FROM app_user WHERE {field} = $value LIMIT 1");

        let mut res = self.db.query(&query).bind(("value", value)).await?;

        let users: Vec<UserRecord> = res.take(0)?;
        Ok(users.into_iter().next().map(AppUser::from))
    }
}

#[async_trait]
impl UserStore for SurrealUserStore {
    async fn find_by_username(&self, username: &Username) -> Result<Option<AppUser>> {
        self.find_one("username", username.as_str().to_string()).await
    }

    async fn find_by_email(&self, email: &Email) -> Result<Option<AppUser>> {
        self.find_one("email", email.as_str().to_string()).await
    }

    async fn find_by_id(&self, id: &UserId) -> Result<Option<AppUser>> {
        self.find_one("user_id", id.as_str().to_string()).await
    }

    async fn list(&self) -> Result<Vec<AppUser>> {
        let mut res = self
            .db
            .query("SELECT * FROM app_user ORDER BY username ASC")
            .await?;

        let users: Vec<UserRecord> = res.take(0)?;
        Ok(users.into_iter().map(AppUser::from).collect())
    }

    async fn create(&self, create: &UserCreate) -> Result<AppUser> {
        if self.find_by_username(&create.username).await?.is_some() {
            anyhow::bail!("username '{}' is already taken", create.username);
        }
        if self.find_by_email(&create.email).await?.is_some() {
            anyhow::bail!("email '{}' is already registered", create.email);
        }

        let query = r#"
            CREATE app_user CONTENT {
                user_id: $user_id,
                first_name: $first_name,
                last_name: $last_name,
                email: $email,
                username: $username,
                password: $password,
                role: $role,
                created_at: time::now(),
                updated_at: time::now()
            }
        "#;

        let mut res = self
            .db
            .query(query)
            .bind(("user_id", Uuid::new_v4().to_string()))
            .bind(("first_name", create.first_name.clone()))
            .bind(("last_name", create.last_name.clone()))
            .bind(("email", create.email.as_str().to_string()))
            .bind(("username", create.username.as_str().to_string()))
            .bind(("password", create.password_hash.clone()))
            .bind(("role", create.role.as_str().to_string()))
            .await?;

        let users: Vec<UserRecord> = res.take(0)?;
        users
            .into_iter()
            .next()
            .map(AppUser::from)
            .ok_or_else(|| anyhow::anyhow!("Failed to create user"))
    }

    async fn update_role(&self, id: &UserId, role: Role) -> Result<Option<AppUser>> {
        let query = r#"
            UPDATE app_user SET
                role = $role,
                updated_at = time::now()
            WHERE user_id = $user_id
        "#;

        let mut res = self
            .db
            .query(query)
            .bind(("role", role.as_str().to_string()))
            .bind(("user_id", id.as_str().to_string()))
            .await?;

        let users: Vec<UserRecord> = res.take(0)?;
        Ok(users.into_iter().next().map(AppUser::from))
    }

    async fn delete(&self, id: &UserId) -> Result<bool> {
        let query = "DELETE app_user WHERE user_id = $user_id RETURN BEFORE";

        let mut res = self
            .db
            .query(query)
            .bind(("user_id", id.as_str().to_string()))
            .await?;

        let removed: Vec<UserRecord> = res.take(0)?;
        Ok(!removed.is_empty())
    }
}
