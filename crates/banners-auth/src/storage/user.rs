//! User storage trait.
//!
//! Defines the interface for user persistence operations.
//! Implementations are provided by storage backends (PostgreSQL, in-memory).

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{AuthError, AuthResult};

// =============================================================================
// Role
// =============================================================================

/// Role carried in the token. Only `Admin` may manage banners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Admin,
    #[default]
    User,
}

impl UserRole {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::User => "user",
        }
    }

    #[must_use]
    pub fn is_admin(&self) -> bool {
        matches!(self, Self::Admin)
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserRole {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Self::Admin),
            "user" => Ok(Self::User),
            other => Err(AuthError::invalid_request(format!("unknown role: {other}"))),
        }
    }
}

// =============================================================================
// User Type
// =============================================================================

/// A stored user account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "user_id")]
    pub id: i64,

    pub username: String,

    /// Argon2 PHC string. Never expose through the API.
    #[serde(skip_serializing)]
    pub password_hash: String,

    pub role: UserRole,

    /// Feature the account is scoped to, if any.
    pub feature_id: Option<i32>,

    /// Tags the account is scoped to.
    #[serde(default)]
    pub tag_ids: Vec<i32>,
}

/// Fields of a user about to be created. The ID is assigned by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub username: String,
    pub password_hash: String,
    pub role: UserRole,
    pub feature_id: Option<i32>,
    pub tag_ids: Vec<i32>,
}

impl NewUser {
    /// Assigns the store-generated ID.
    #[must_use]
    pub fn into_user(self, id: i64) -> User {
        User {
            id,
            username: self.username,
            password_hash: self.password_hash,
            role: self.role,
            feature_id: self.feature_id,
            tag_ids: self.tag_ids,
        }
    }
}

// =============================================================================
// Storage Trait
// =============================================================================

/// Storage operations for user accounts.
///
/// Usernames are unique.
#[async_trait]
pub trait UserStorage: Send + Sync {
    /// Persists a new user and returns the generated ID.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UserExists` if the username is taken, or
    /// `AuthError::Storage` if the backend fails.
    async fn create(&self, user: &NewUser) -> AuthResult<i64>;

    /// Looks a user up by username.
    ///
    /// # Errors
    ///
    /// Returns an error only for backend failures; an unknown username is
    /// `Ok(None)`.
    async fn find_by_username(&self, username: &str) -> AuthResult<Option<User>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_round_trip() {
        assert_eq!("admin".parse::<UserRole>().unwrap(), UserRole::Admin);
        assert_eq!("user".parse::<UserRole>().unwrap(), UserRole::User);
        assert!("root".parse::<UserRole>().is_err());
        assert_eq!(UserRole::Admin.to_string(), "admin");
        assert_eq!(serde_json::to_value(UserRole::User).unwrap(), "user");
    }

    #[test]
    fn test_password_hash_not_serialized() {
        let user = NewUser {
            username: "alice".into(),
            password_hash: "$argon2id$secret".into(),
            role: UserRole::User,
            feature_id: Some(3),
            tag_ids: vec![1],
        }
        .into_user(7);

        let value = serde_json::to_value(&user).unwrap();
        assert_eq!(value["user_id"], 7);
        assert!(value.get("password_hash").is_none());
    }
}
