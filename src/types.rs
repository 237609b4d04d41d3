//! NewType wrappers for strong typing throughout the user service.
//!
//! These types prevent accidental mixing of semantically different strings
//! (e.g., passing a username where a user ID is expected).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Macro to generate a NewType wrapper with standard trait implementations.
macro_rules! newtype_string {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new instance.
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Get the inner value as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume and return the inner String.
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

newtype_string!(
    /// Public identifier of a user account (UUID v4 string).
    ///
    /// Assigned on creation and stable for the lifetime of the account. It is
    /// distinct from the SurrealDB record ID, which never leaves the store.
    UserId
);

newtype_string!(
    /// Login name of a user account. Unique across all users.
    ///
    /// This is also the `sub` claim of every token issued for the account.
    Username
);

newtype_string!(
    /// Email address of a user account. Unique across all users.
    Email
);

newtype_string!(
    /// A signed, compact token (`header.payload.signature`).
    ///
    /// Safe to place in an HTTP header or cookie. The `Display` impl prints
    /// the full token, so never pass one to a log macro.
    EncodedToken
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_id_creation() {
        let id = UserId::new("7f1c0c1e-1d55-4a4e-9b44-2b8d6f0b3c11");
        assert_eq!(id.as_str(), "7f1c0c1e-1d55-4a4e-9b44-2b8d6f0b3c11");
        assert_eq!(id.to_string(), "7f1c0c1e-1d55-4a4e-9b44-2b8d6f0b3c11");
    }

    #[test]
    fn test_username_from_string() {
        let name: Username = "jdoe".into();
        assert_eq!(name.as_str(), "jdoe");

        let name: Username = String::from("asmith").into();
        assert_eq!(name.into_inner(), "asmith");
    }

    #[test]
    fn test_email_serde_is_transparent() {
        let email = Email::new("jdoe@example.com");
        let json = serde_json::to_string(&email).unwrap();
        assert_eq!(json, "\"jdoe@example.com\"");

        let parsed: Email = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, email);
    }

    #[test]
    fn test_type_hash_and_borrow() {
        use std::borrow::Borrow;
        use std::collections::HashSet;

        let mut set = HashSet::new();
        set.insert(Username::new("jdoe"));
        assert!(set.contains("jdoe"));

        let token = EncodedToken::new("a.b.c");
        let s: &str = token.borrow();
        assert_eq!(s, "a.b.c");
    }
}
