//! Refresh token repository
//!
//! Stores the `jti` of every outstanding refresh token. Deleting a record
//! revokes the token.

use crate::db::{Backend, DynDatabasePool};
use crate::models::RefreshToken;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

#[async_trait]
pub trait RefreshTokenRepository: Send + Sync {
    async fn create(&self, token: &RefreshToken) -> Result<()>;

    async fn get(&self, id: &str) -> Result<Option<RefreshToken>>;

    /// Delete one token. Returns false if it was already gone.
    async fn delete(&self, id: &str) -> Result<bool>;

    /// Delete every token of a user, returning how many were removed
    async fn delete_for_user(&self, user_id: i64) -> Result<u64>;

    /// Purge tokens that expired before `now`
    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64>;
}

pub struct SqlxRefreshTokenRepository {
    pool: DynDatabasePool,
}

impl SqlxRefreshTokenRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn RefreshTokenRepository> {
        Arc::new(Self::new(pool))
    }
}

#[derive(sqlx::FromRow)]
struct RefreshTokenRow {
    id: String,
    user_id: i64,
    expires_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

impl From<RefreshTokenRow> for RefreshToken {
    fn from(row: RefreshTokenRow) -> Self {
        RefreshToken {
            id: row.id,
            user_id: row.user_id,
            expires_at: row.expires_at,
            created_at: row.created_at,
        }
    }
}

#[async_trait]
impl RefreshTokenRepository for SqlxRefreshTokenRepository {
    async fn create(&self, token: &RefreshToken) -> Result<()> {
        match self.pool.backend() {
            Backend::Sqlite(p) => {
                sqlx::query(
                    "INSERT INTO refresh_tokens (id, user_id, expires_at, created_at) VALUES (?, ?, ?, ?)",
                )
                .bind(&token.id)
                .bind(token.user_id)
                .bind(token.expires_at)
                .bind(token.created_at)
                .execute(p)
                .await
                .map(|_| ())
            }
            Backend::Postgres(p) => {
                sqlx::query(
                    "INSERT INTO refresh_tokens (id, user_id, expires_at, created_at) VALUES ($1, $2, $3, $4)",
                )
                .bind(&token.id)
                .bind(token.user_id)
                .bind(token.expires_at)
                .bind(token.created_at)
                .execute(p)
                .await
                .map(|_| ())
            }
        }
        .context("Failed to store refresh token")?;
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<RefreshToken>> {
        let row = match self.pool.backend() {
            Backend::Sqlite(p) => {
                sqlx::query_as::<_, RefreshTokenRow>(
                    "SELECT id, user_id, expires_at, created_at FROM refresh_tokens WHERE id = ?",
                )
                .bind(id)
                .fetch_optional(p)
                .await
            }
            Backend::Postgres(p) => {
                sqlx::query_as::<_, RefreshTokenRow>(
                    "SELECT id, user_id, expires_at, created_at FROM refresh_tokens WHERE id = $1",
                )
                .bind(id)
                .fetch_optional(p)
                .await
            }
        }
        .context("Failed to get refresh token")?;
        Ok(row.map(RefreshToken::from))
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let affected = match self.pool.backend() {
            Backend::Sqlite(p) => sqlx::query("DELETE FROM refresh_tokens WHERE id = ?")
                .bind(id)
                .execute(p)
                .await
                .map(|r| r.rows_affected()),
            Backend::Postgres(p) => sqlx::query("DELETE FROM refresh_tokens WHERE id = $1")
                .bind(id)
                .execute(p)
                .await
                .map(|r| r.rows_affected()),
        }
        .context("Failed to delete refresh token")?;
        Ok(affected > 0)
    }

    async fn delete_for_user(&self, user_id: i64) -> Result<u64> {
        match self.pool.backend() {
            Backend::Sqlite(p) => sqlx::query("DELETE FROM refresh_tokens WHERE user_id = ?")
                .bind(user_id)
                .execute(p)
                .await
                .map(|r| r.rows_affected()),
            Backend::Postgres(p) => sqlx::query("DELETE FROM refresh_tokens WHERE user_id = $1")
                .bind(user_id)
                .execute(p)
                .await
                .map(|r| r.rows_affected()),
        }
        .context("Failed to delete user refresh tokens")
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        match self.pool.backend() {
            Backend::Sqlite(p) => sqlx::query("DELETE FROM refresh_tokens WHERE expires_at < ?")
                .bind(now)
                .execute(p)
                .await
                .map(|r| r.rows_affected()),
            Backend::Postgres(p) => sqlx::query("DELETE FROM refresh_tokens WHERE expires_at < $1")
                .bind(now)
                .execute(p)
                .await
                .map(|r| r.rows_affected()),
        }
        .context("Failed to purge expired refresh tokens")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxUserRepository, UserRepository};
    use crate::db::{create_test_pool, migrations};
    use crate::models::{User, UserRole};
    use chrono::Duration;

    async fn setup_test_repo() -> (SqlxRefreshTokenRepository, i64) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let user = SqlxUserRepository::new(pool.clone())
            .create(&User::new(
                "owner".to_string(),
                "owner@example.com".to_string(),
                "hash".to_string(),
                None,
                UserRole::User,
            ))
            .await
            .expect("Failed to create user");
        (SqlxRefreshTokenRepository::new(pool), user.id)
    }

    fn token(id: &str, user_id: i64, ttl: Duration) -> RefreshToken {
        let now = Utc::now();
        RefreshToken {
            id: id.to_string(),
            user_id,
            expires_at: now + ttl,
            created_at: now,
        }
    }

    #[tokio::test]
    async fn test_create_get_delete() {
        let (repo, user_id) = setup_test_repo().await;
        let stored = token("jti-1", user_id, Duration::hours(1));
        repo.create(&stored).await.unwrap();

        let found = repo.get("jti-1").await.unwrap().expect("token stored");
        assert_eq!(found.user_id, user_id);
        assert!(!found.is_expired());

        assert!(repo.delete("jti-1").await.unwrap());
        assert!(repo.get("jti-1").await.unwrap().is_none());
        assert!(!repo.delete("jti-1").await.unwrap());
    }

    #[tokio::test]
    async fn test_create_rejects_duplicate_id() {
        let (repo, user_id) = setup_test_repo().await;
        repo.create(&token("dup", user_id, Duration::hours(1))).await.unwrap();

        let err = repo
            .create(&token("dup", user_id, Duration::hours(1)))
            .await
            .unwrap_err();
        assert!(crate::db::is_unique_violation(&err));
    }

    #[tokio::test]
    async fn test_delete_for_user() {
        let (repo, user_id) = setup_test_repo().await;
        repo.create(&token("a", user_id, Duration::hours(1))).await.unwrap();
        repo.create(&token("b", user_id, Duration::hours(1))).await.unwrap();

        assert_eq!(repo.delete_for_user(user_id).await.unwrap(), 2);
        assert!(repo.get("a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_expired() {
        let (repo, user_id) = setup_test_repo().await;
        repo.create(&token("old", user_id, Duration::hours(-1))).await.unwrap();
        repo.create(&token("fresh", user_id, Duration::hours(1))).await.unwrap();

        assert_eq!(repo.delete_expired(Utc::now()).await.unwrap(), 1);
        assert!(repo.get("old").await.unwrap().is_none());
        assert!(repo.get("fresh").await.unwrap().is_some());
    }
}
