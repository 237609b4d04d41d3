use serde::{Deserialize, Serialize};
use std::fmt;
use surrealdb::{RecordId, sql::Datetime};

use crate::types::{Email, UserId, Username};

/// Role of a user account. The closed set of roles the service knows about.
///
/// Stored as its upper-case name. Anything else read back from the store
/// resolves to `Locked`, so an unknown role never carries access.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    Dev,
    User,
    Client,
    Locked,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "ADMIN",
            Self::Dev => "DEV",
            Self::User => "USER",
            Self::Client => "CLIENT",
            Self::Locked => "LOCKED",
        }
    }

    /// Parse a stored role name, case-insensitively. Unrecognized values are `Locked`.
    pub fn parse_lossy(value: &str) -> Self {
        match value.trim().to_ascii_uppercase().as_str() {
            "ADMIN" => Self::Admin,
            "DEV" => Self::Dev,
            "USER" => Self::User,
            "CLIENT" => Self::Client,
            _ => Self::Locked,
        }
    }

    pub fn is_locked(&self) -> bool {
        matches!(self, Self::Locked)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persisted user record (table: `app_user`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    /// Database identifier
    pub id: RecordId,
    /// Public identifier
    pub user_id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub username: String,
    /// Argon2id PHC string
    pub password: String,
    /// Role name, see [`Role::parse_lossy`]
    pub role: String,
    pub created_at: Option<Datetime>,
    pub updated_at: Option<Datetime>,
}

/// Identity record handed to the auth pipeline.
///
/// The pipeline only reads `username`, `role` and `id` from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppUser {
    pub id: UserId,
    pub first_name: String,
    pub last_name: String,
    pub email: Email,
    pub username: Username,
    pub password_hash: String,
    pub role: Role,
}

impl From<UserRecord> for AppUser {
    fn from(record: UserRecord) -> Self {
        Self {
            id: UserId::new(record.user_id),
            first_name: record.first_name,
            last_name: record.last_name,
            email: Email::new(record.email),
            username: Username::new(record.username),
            password_hash: record.password,
            role: Role::parse_lossy(&record.role),
        }
    }
}

/// Payload for creating a new user. The password must already be hashed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserCreate {
    pub first_name: String,
    pub last_name: String,
    pub email: Email,
    pub username: Username,
    pub password_hash: String,
    pub role: Role,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_round_trips_through_its_name() {
        for role in [Role::Admin, Role::Dev, Role::User, Role::Client, Role::Locked] {
            assert_eq!(Role::parse_lossy(role.as_str()), role);
        }
    }

    #[test]
    fn test_unknown_role_is_locked() {
        assert_eq!(Role::parse_lossy("SUPERUSER"), Role::Locked);
        assert_eq!(Role::parse_lossy(""), Role::Locked);
        assert_eq!(Role::parse_lossy(" dev "), Role::Dev);
    }

    #[test]
    fn test_role_serde_uses_upper_case_names() {
        assert_eq!(serde_json::to_string(&Role::Client).unwrap(), "\"CLIENT\"");
        let role: Role = serde_json::from_str("\"ADMIN\"").unwrap();
        assert_eq!(role, Role::Admin);
    }
}
