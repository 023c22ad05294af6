//! JWT access/refresh token service
//!
//! Access tokens are short-lived and stateless. Refresh tokens carry a
//! `jti` that must exist in the `refresh_tokens` table; each refresh
//! deletes the old record and issues a new pair, so a refresh token can be
//! used exactly once.

use std::sync::Arc;

use anyhow::Context;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::{ServiceError, ServiceResult};
use crate::config::JwtConfig;
use crate::db::repositories::{RefreshTokenRepository, UserRepository};
use crate::models::{RefreshToken, User, UserRole};

/// Which half of a token pair a JWT is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// JWT claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User ID
    pub sub: String,
    pub role: UserRole,
    pub kind: TokenKind,
    /// Unique token ID
    pub jti: String,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    pub fn user_id(&self) -> ServiceResult<i64> {
        self.sub
            .parse()
            .map_err(|_| ServiceError::unauthorized("Invalid token subject"))
    }
}

/// Tokens returned to the client after login, registration or refresh
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// Always `Bearer`
    pub token_type: String,
    /// Access token lifetime in seconds
    pub expires_in: u64,
}

pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    issuer: String,
    access_ttl_secs: u64,
    refresh_ttl_secs: u64,
    refresh_repo: Arc<dyn RefreshTokenRepository>,
    user_repo: Arc<dyn UserRepository>,
}

impl TokenService {
    pub fn new(
        config: &JwtConfig,
        refresh_repo: Arc<dyn RefreshTokenRepository>,
        user_repo: Arc<dyn UserRepository>,
    ) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&config.issuer]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);

        Self {
            encoding_key: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
            validation,
            issuer: config.issuer.clone(),
            access_ttl_secs: config.access_ttl_secs,
            refresh_ttl_secs: config.refresh_ttl_secs,
            refresh_repo,
            user_repo,
        }
    }

    /// Issue an access/refresh pair and persist the refresh token's `jti`
    pub async fn issue_pair(&self, user: &User) -> ServiceResult<TokenPair> {
        let now = Utc::now();
        let access_expires_at = expiry(now, self.access_ttl_secs)?;
        let refresh_expires_at = expiry(now, self.refresh_ttl_secs)?;
        let access = self.claims_for(user, TokenKind::Access, now, access_expires_at);
        let refresh = self.claims_for(user, TokenKind::Refresh, now, refresh_expires_at);

        self.refresh_repo
            .create(&RefreshToken {
                id: refresh.jti.clone(),
                user_id: user.id,
                expires_at: refresh_expires_at,
                created_at: now,
            })
            .await
            .context("Failed to store refresh token")?;

        Ok(TokenPair {
            access_token: self.sign(&access)?,
            refresh_token: self.sign(&refresh)?,
            token_type: "Bearer".to_string(),
            expires_in: self.access_ttl_secs,
        })
    }

    /// Validate an access token (signature, issuer, expiry, kind)
    pub fn verify_access(&self, token: &str) -> ServiceResult<Claims> {
        let claims = self.decode(token)?;
        if claims.kind != TokenKind::Access {
            return Err(ServiceError::unauthorized("Expected an access token"));
        }
        Ok(claims)
    }

    /// Exchange a refresh token for a new pair. The old token is consumed.
    pub async fn refresh(&self, refresh_token: &str) -> ServiceResult<TokenPair> {
        let claims = self.decode_refresh(refresh_token)?;
        let user_id = claims.user_id()?;

        let stored = self
            .refresh_repo
            .get(&claims.jti)
            .await
            .context("Failed to load refresh token")?;
        match stored {
            Some(stored) if stored.user_id == user_id && !stored.is_expired() => {}
            _ => {
                tracing::warn!(user_id, jti = %claims.jti, "Rejected unknown or reused refresh token");
                return Err(ServiceError::unauthorized("Refresh token has been revoked"));
            }
        }

        // A concurrent refresh may have consumed it first
        let consumed = self
            .refresh_repo
            .delete(&claims.jti)
            .await
            .context("Failed to consume refresh token")?;
        if !consumed {
            return Err(ServiceError::unauthorized("Refresh token has been revoked"));
        }

        let user = self
            .user_repo
            .get_by_id(user_id)
            .await
            .context("Failed to load user")?
            .filter(|u| u.is_active)
            .ok_or_else(|| ServiceError::unauthorized("Account is no longer available"))?;

        self.issue_pair(&user).await
    }

    /// Revoke one refresh token owned by `user_id`. Unknown tokens are ignored.
    pub async fn revoke(&self, user_id: i64, refresh_token: &str) -> ServiceResult<()> {
        let claims = self.decode_refresh(refresh_token)?;
        if claims.user_id()? != user_id {
            return Err(ServiceError::forbidden("Refresh token belongs to another user"));
        }
        self.refresh_repo
            .delete(&claims.jti)
            .await
            .context("Failed to revoke refresh token")?;
        Ok(())
    }

    /// Revoke every refresh token of a user
    pub async fn revoke_all(&self, user_id: i64) -> ServiceResult<u64> {
        let removed = self
            .refresh_repo
            .delete_for_user(user_id)
            .await
            .context("Failed to revoke refresh tokens")?;
        Ok(removed)
    }

    /// Drop refresh token records that can no longer be used
    pub async fn purge_expired(&self) -> ServiceResult<u64> {
        let removed = self
            .refresh_repo
            .delete_expired(Utc::now())
            .await
            .context("Failed to purge refresh tokens")?;
        Ok(removed)
    }

    fn claims_for(
        &self,
        user: &User,
        kind: TokenKind,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Claims {
        Claims {
            sub: user.id.to_string(),
            role: user.role,
            kind,
            jti: Uuid::new_v4().to_string(),
            iss: self.issuer.clone(),
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
        }
    }

    fn sign(&self, claims: &Claims) -> ServiceResult<String> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| ServiceError::Internal(anyhow::anyhow!("Token generation failed: {}", e)))
    }

    fn decode(&self, token: &str) -> ServiceResult<Claims> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!(error = %e, "Token rejected");
                ServiceError::unauthorized("Invalid or expired token")
            })
    }

    fn decode_refresh(&self, token: &str) -> ServiceResult<Claims> {
        let claims = self.decode(token)?;
        if claims.kind != TokenKind::Refresh {
            return Err(ServiceError::unauthorized("Expected a refresh token"));
        }
        Ok(claims)
    }
}

/// `now + ttl_secs`, or an error when the lifetime does not fit a timestamp
fn expiry(now: DateTime<Utc>, ttl_secs: u64) -> ServiceResult<DateTime<Utc>> {
    i64::try_from(ttl_secs)
        .ok()
        .and_then(Duration::try_seconds)
        .and_then(|ttl| now.checked_add_signed(ttl))
        .ok_or_else(|| {
            ServiceError::Internal(anyhow::anyhow!(
                "Token lifetime of {}s is out of range",
                ttl_secs
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxRefreshTokenRepository, SqlxUserRepository};
    use crate::db::{create_test_pool, migrations};

    const SECRET: &str = "test-secret-that-is-at-least-32-bytes!";

    fn jwt_config() -> JwtConfig {
        JwtConfig {
            secret: SECRET.to_string(),
            ..Default::default()
        }
    }

    async fn setup_test_service() -> (TokenService, Arc<dyn UserRepository>, User) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let users = SqlxUserRepository::boxed(pool.clone());
        let user = users
            .create(&User::new(
                "alice".to_string(),
                "alice@example.com".to_string(),
                "hash".to_string(),
                None,
                UserRole::User,
            ))
            .await
            .expect("Failed to create user");
        let service = TokenService::new(
            &jwt_config(),
            SqlxRefreshTokenRepository::boxed(pool),
            users.clone(),
        );
        (service, users, user)
    }

    #[tokio::test]
    async fn test_issue_and_verify_access() {
        let (service, _users, user) = setup_test_service().await;
        let pair = service.issue_pair(&user).await.unwrap();

        assert_eq!(pair.token_type, "Bearer");
        assert_eq!(pair.expires_in, 900);

        let claims = service.verify_access(&pair.access_token).unwrap();
        assert_eq!(claims.user_id().unwrap(), user.id);
        assert_eq!(claims.role, UserRole::User);
        assert_eq!(claims.iss, "keel");
        assert_eq!(claims.kind, TokenKind::Access);
    }

    #[tokio::test]
    async fn test_out_of_range_lifetime_is_an_error() {
        let (_service, users, user) = setup_test_service().await;
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool).await.unwrap();

        for ttl in [10_000_000_000_000, u64::MAX] {
            let service = TokenService::new(
                &JwtConfig {
                    refresh_ttl_secs: ttl,
                    ..jwt_config()
                },
                SqlxRefreshTokenRepository::boxed(pool.clone()),
                users.clone(),
            );
            let err = service.issue_pair(&user).await.unwrap_err();
            assert!(matches!(err, ServiceError::Internal(_)));
        }
    }

    #[test]
    fn test_expiry_adds_lifetime() {
        let now = Utc::now();
        assert_eq!(expiry(now, 900).unwrap(), now + Duration::seconds(900));
        assert!(expiry(now, u64::MAX).is_err());
    }

    #[tokio::test]
    async fn test_refresh_token_is_not_an_access_token() {
        let (service, _users, user) = setup_test_service().await;
        let pair = service.issue_pair(&user).await.unwrap();

        let err = service.verify_access(&pair.refresh_token).unwrap_err();
        assert!(matches!(err, ServiceError::Unauthorized(_)));
        assert!(service.refresh(&pair.access_token).await.is_err());
    }

    #[tokio::test]
    async fn test_refresh_rotates_and_rejects_reuse() {
        let (service, _users, user) = setup_test_service().await;
        let first = service.issue_pair(&user).await.unwrap();

        let second = service.refresh(&first.refresh_token).await.unwrap();
        assert_ne!(second.refresh_token, first.refresh_token);
        service.verify_access(&second.access_token).unwrap();

        let reused = service.refresh(&first.refresh_token).await.unwrap_err();
        assert!(matches!(reused, ServiceError::Unauthorized(_)));

        // The rotated token still works once
        service.refresh(&second.refresh_token).await.unwrap();
    }

    #[tokio::test]
    async fn test_revoke_and_revoke_all() {
        let (service, _users, user) = setup_test_service().await;
        let a = service.issue_pair(&user).await.unwrap();
        let b = service.issue_pair(&user).await.unwrap();
        let c = service.issue_pair(&user).await.unwrap();

        service.revoke(user.id, &a.refresh_token).await.unwrap();
        assert!(matches!(
            service.revoke(user.id + 1, &b.refresh_token).await,
            Err(ServiceError::Forbidden(_))
        ));
        assert!(service.refresh(&a.refresh_token).await.is_err());

        assert_eq!(service.revoke_all(user.id).await.unwrap(), 2);
        assert!(service.refresh(&b.refresh_token).await.is_err());
        assert!(service.refresh(&c.refresh_token).await.is_err());
    }

    #[tokio::test]
    async fn test_refresh_rejected_for_inactive_user() {
        let (service, users, mut user) = setup_test_service().await;
        let pair = service.issue_pair(&user).await.unwrap();

        user.is_active = false;
        users.update(&user).await.unwrap();

        let err = service.refresh(&pair.refresh_token).await.unwrap_err();
        assert!(matches!(err, ServiceError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn test_rejects_bad_signature_issuer_and_expiry() {
        let (service, _users, user) = setup_test_service().await;
        let now = Utc::now().timestamp();
        let claims = |iss: &str, exp: i64| Claims {
            sub: user.id.to_string(),
            role: UserRole::User,
            kind: TokenKind::Access,
            jti: Uuid::new_v4().to_string(),
            iss: iss.to_string(),
            iat: now,
            exp,
        };
        let sign = |claims: &Claims, secret: &str| {
            encode(&Header::default(), claims, &EncodingKey::from_secret(secret.as_bytes())).unwrap()
        };

        let forged = sign(&claims("keel", now + 600), "another-secret-another-secret-123");
        assert!(service.verify_access(&forged).is_err());

        let foreign = sign(&claims("someone-else", now + 600), SECRET);
        assert!(service.verify_access(&foreign).is_err());

        let expired = sign(&claims("keel", now - 3600), SECRET);
        assert!(service.verify_access(&expired).is_err());

        let good = sign(&claims("keel", now + 600), SECRET);
        assert!(service.verify_access(&good).is_ok());

        assert!(service.verify_access("not.a.jwt").is_err());
    }

    #[tokio::test]
    async fn test_purge_expired_keeps_live_tokens() {
        let (service, _users, user) = setup_test_service().await;
        let pair = service.issue_pair(&user).await.unwrap();

        assert_eq!(service.purge_expired().await.unwrap(), 0);
        service.refresh(&pair.refresh_token).await.unwrap();
    }
}
