//! User model
//!
//! Defines the `User` entity, its role and the inputs accepted by the
//! user and auth services.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A registered account.
///
/// Soft-deleted users (`deleted_at` set) are never returned by the
/// repositories.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    /// Username (unique among live users)
    pub username: String,
    /// Email address (unique among live users)
    pub email: String,
    /// Password hash (argon2id PHC string)
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub full_name: Option<String>,
    pub role: UserRole,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing)]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl User {
    /// Build an unsaved user. The password must already be hashed.
    pub fn new(
        username: String,
        email: String,
        password_hash: String,
        full_name: Option<String>,
        role: UserRole,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: 0, // Will be set by the database
            username,
            email,
            password_hash,
            full_name,
            role,
            is_active: true,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    /// Admins may act on any record, everyone else only on their own
    pub fn can_manage(&self, owner_id: i64) -> bool {
        self.is_admin() || self.id == owner_id
    }
}

/// User role for authorization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    /// Full access, including user management
    Admin,
    /// Manages own articles and profile
    #[default]
    User,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Admin => "admin",
            UserRole::User => "user",
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserRole {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "admin" => Ok(UserRole::Admin),
            "user" => Ok(UserRole::User),
            _ => Err(anyhow::anyhow!("Invalid user role: {}", s)),
        }
    }
}

/// Registration request (plaintext password, hashed by the service)
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterInput {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub full_name: Option<String>,
}

/// Login request; `login` is a username or an email address
#[derive(Debug, Clone, Deserialize)]
pub struct LoginInput {
    pub login: String,
    pub password: String,
}

/// Partial user update. Only admins may set `role` or `is_active`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateUserInput {
    pub username: Option<String>,
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub role: Option<UserRole>,
    pub is_active: Option<bool>,
}

impl UpdateUserInput {
    pub fn has_changes(&self) -> bool {
        self.username.is_some()
            || self.email.is_some()
            || self.full_name.is_some()
            || self.role.is_some()
            || self.is_active.is_some()
    }

    /// Whether the update touches admin-only fields
    pub fn touches_privileges(&self) -> bool {
        self.role.is_some() || self.is_active.is_some()
    }
}

/// Password change request
#[derive(Debug, Clone, Deserialize)]
pub struct ChangePasswordInput {
    pub current_password: String,
    pub new_password: String,
}

/// Filters for the user list
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserFilter {
    /// Case-insensitive match on username, email or full name
    pub search: Option<String>,
    pub role: Option<UserRole>,
    pub is_active: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: i64, role: UserRole) -> User {
        let mut user = User::new(
            format!("user{}", id),
            format!("user{}@example.com", id),
            "hash".to_string(),
            None,
            role,
        );
        user.id = id;
        user
    }

    #[test]
    fn test_user_new_is_active() {
        let user = user(0, UserRole::User);
        assert!(user.is_active);
        assert!(user.deleted_at.is_none());
    }

    #[test]
    fn test_can_manage() {
        let admin = user(1, UserRole::Admin);
        let regular = user(2, UserRole::User);

        assert!(admin.can_manage(2));
        assert!(regular.can_manage(2));
        assert!(!regular.can_manage(1));
    }

    #[test]
    fn test_password_hash_never_serialized() {
        let json = serde_json::to_value(user(1, UserRole::User)).unwrap();
        assert!(json.get("password_hash").is_none());
        assert!(json.get("deleted_at").is_none());
        assert_eq!(json["role"], "user");
    }

    #[test]
    fn test_role_parse() {
        assert_eq!("ADMIN".parse::<UserRole>().unwrap(), UserRole::Admin);
        assert_eq!("user".parse::<UserRole>().unwrap(), UserRole::User);
        assert!("editor".parse::<UserRole>().is_err());
    }

    #[test]
    fn test_update_privileges() {
        let input = UpdateUserInput {
            full_name: Some("Ann".to_string()),
            ..Default::default()
        };
        assert!(input.has_changes());
        assert!(!input.touches_privileges());

        let input = UpdateUserInput {
            is_active: Some(false),
            ..Default::default()
        };
        assert!(input.touches_privileges());
    }
}
