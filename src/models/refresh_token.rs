//! Stored refresh token

use chrono::{DateTime, Utc};

/// Server-side record of an issued refresh token, keyed by its JWT `jti`.
///
/// A refresh token is only honoured while its record exists, which makes
/// rotation and logout effective before the JWT itself expires.
#[derive(Debug, Clone, PartialEq)]
pub struct RefreshToken {
    pub id: String,
    pub user_id: i64,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl RefreshToken {
    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }
}
