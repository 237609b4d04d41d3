//! Role to scope mapping.
//!
//! Scopes are the unit of authorization. They are derived from a role once,
//! at login or refresh time, and embedded into the issued token. Access-token
//! validation never re-derives them from the live role.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::db::Role;

/// A named permission unit granted by a role.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    // User management
    CreateUser,
    CheckAvailability,
    ReadUsers,
    UpdateUsers,
    DeleteUsers,
    // Project management
    CreateProject,
    ReadProject,
    ReadProjectMembers,
    UpdateProject,
    DeleteProject,
}

impl Scope {
    /// Every scope in canonical order: user management first, then project management.
    pub const ALL: [Scope; 10] = [
        Scope::CreateUser,
        Scope::CheckAvailability,
        Scope::ReadUsers,
        Scope::UpdateUsers,
        Scope::DeleteUsers,
        Scope::CreateProject,
        Scope::ReadProject,
        Scope::ReadProjectMembers,
        Scope::UpdateProject,
        Scope::DeleteProject,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreateUser => "create_user",
            Self::CheckAvailability => "check_availability",
            Self::ReadUsers => "read_users",
            Self::UpdateUsers => "update_users",
            Self::DeleteUsers => "delete_users",
            Self::CreateProject => "create_project",
            Self::ReadProject => "read_project",
            Self::ReadProjectMembers => "read_project_members",
            Self::UpdateProject => "update_project",
            Self::DeleteProject => "delete_project",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|scope| scope.as_str() == value)
    }

    /// Scopes that allow removing user accounts. Withheld from DEV.
    pub fn is_user_deletion(&self) -> bool {
        matches!(self, Self::DeleteUsers)
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const CLIENT_SCOPES: [Scope; 5] = [
    Scope::CreateUser,
    Scope::CheckAvailability,
    Scope::ReadProject,
    Scope::ReadProjectMembers,
    Scope::CreateProject,
];

const USER_SCOPES: [Scope; 3] = [
    Scope::ReadProject,
    Scope::ReadProjectMembers,
    Scope::CreateProject,
];

/// Map a role to its ordered set of scopes.
///
/// `Locked` maps to nothing. A role without an explicit arm here must map to
/// nothing as well, never to another role's scopes.
pub fn map_scopes(role: Role) -> Vec<Scope> {
    match role {
        Role::Admin => Scope::ALL.to_vec(),
        Role::Dev => Scope::ALL
            .into_iter()
            .filter(|scope| !scope.is_user_deletion())
            .collect(),
        Role::Client => CLIENT_SCOPES.to_vec(),
        Role::User => USER_SCOPES.to_vec(),
        Role::Locked => Vec::new(),
    }
}

/// Scope names in order, as carried inside tokens.
pub fn scope_names(scopes: &[Scope]) -> Vec<String> {
    scopes.iter().map(|scope| scope.as_str().to_string()).collect()
}

/// Join scope names into the comma-separated wire form.
pub fn join_scopes<S: AsRef<str>>(scopes: &[S]) -> String {
    scopes
        .iter()
        .map(|scope| scope.as_ref())
        .collect::<Vec<_>>()
        .join(",")
}

/// Split the comma-separated wire form back into ordered scope names.
///
/// Blank entries are dropped, so an empty string yields no scopes.
pub fn parse_scopes(joined: &str) -> Vec<String> {
    joined
        .split(',')
        .map(str::trim)
        .filter(|scope| !scope.is_empty())
        .map(str::to_string)
        .collect()
}
