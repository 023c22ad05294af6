//! User service
//!
//! Implements business logic for accounts and authentication:
//! - Registration (the first user becomes admin)
//! - Login by username or email, logout
//! - Access token authentication for the API middleware
//! - Profile updates, password changes and soft deletion

use std::sync::Arc;

use anyhow::Context;

use super::email::DynMailer;
use super::error::{map_write_error, ServiceError, ServiceResult};
use super::password::{hash_password, verify_dummy, verify_password};
use super::token::{TokenPair, TokenService};
use super::validation::{
    normalize_optional, validate_email, validate_optional_length, validate_password,
    validate_username,
};
use crate::db::repositories::UserRepository;
use crate::models::{
    ListParams, LoginInput, PagedResult, RegisterInput, UpdateUserInput, User, UserFilter,
    UserRole,
};

const FULL_NAME_MAX: usize = 100;
const INVALID_CREDENTIALS: &str = "Invalid username/email or password";

/// User service for managing users and authentication
pub struct UserService {
    user_repo: Arc<dyn UserRepository>,
    tokens: Arc<TokenService>,
    mailer: DynMailer,
}

impl UserService {
    pub fn new(user_repo: Arc<dyn UserRepository>, tokens: Arc<TokenService>, mailer: DynMailer) -> Self {
        Self {
            user_repo,
            tokens,
            mailer,
        }
    }

    /// Register a new user and issue its first token pair.
    ///
    /// The first account in the system is created as admin. If no tokens
    /// can be issued the new account is soft-deleted again. The welcome
    /// email is sent in the background and never fails the registration.
    pub async fn register(&self, input: RegisterInput) -> ServiceResult<(User, TokenPair)> {
        let username = input.username.trim().to_string();
        let email = input.email.trim().to_lowercase();
        let full_name = normalize_optional(input.full_name);

        validate_username(&username)?;
        validate_email(&email)?;
        validate_password(&input.password)?;
        validate_optional_length("full_name", full_name.as_deref(), FULL_NAME_MAX)?;

        self.ensure_username_free(&username, None).await?;
        self.ensure_email_free(&email, None).await?;

        let is_first = self
            .user_repo
            .count_all()
            .await
            .context("Failed to count users")?
            == 0;
        let role = if is_first { UserRole::Admin } else { UserRole::User };

        let password_hash = hash_password(&input.password)?;
        let user = User::new(username, email, password_hash, full_name, role);
        let created = self
            .user_repo
            .create(&user)
            .await
            .map_err(|e| map_write_error(e, || "Username or email is already taken".to_string()))?;

        let tokens = match self.tokens.issue_pair(&created).await {
            Ok(tokens) => tokens,
            Err(e) => {
                // Soft delete frees the username and email again
                if let Err(cleanup) = self.user_repo.soft_delete(created.id).await {
                    tracing::error!(user_id = created.id, error = %cleanup, "Failed to roll back registration");
                }
                return Err(e);
            }
        };

        tracing::info!(user_id = created.id, username = %created.username, role = %created.role, "User registered");
        self.send_welcome(created.clone());

        Ok((created, tokens))
    }

    /// Check credentials and issue a token pair.
    ///
    /// Unknown accounts and wrong passwords get the same error.
    pub async fn login(&self, input: LoginInput) -> ServiceResult<(User, TokenPair)> {
        let login = input.login.trim();
        if login.is_empty() || input.password.is_empty() {
            return Err(ServiceError::validation("login and password are required"));
        }

        let user = self.find_by_login(login).await?;
        let Some(user) = user else {
            verify_dummy(&input.password);
            tracing::warn!(login, "Login failed: unknown account");
            return Err(ServiceError::unauthorized(INVALID_CREDENTIALS));
        };

        if !verify_password(&input.password, &user.password_hash)? {
            tracing::warn!(user_id = user.id, "Login failed: wrong password");
            return Err(ServiceError::unauthorized(INVALID_CREDENTIALS));
        }

        if !user.is_active {
            tracing::warn!(user_id = user.id, "Login refused: account disabled");
            return Err(ServiceError::forbidden("Account is disabled"));
        }

        let tokens = self.tokens.issue_pair(&user).await?;
        tracing::info!(user_id = user.id, "User logged in");
        Ok((user, tokens))
    }

    /// Revoke one refresh token, or all of the user's tokens when none is given
    pub async fn logout(&self, user_id: i64, refresh_token: Option<&str>) -> ServiceResult<()> {
        match refresh_token {
            Some(token) => self.tokens.revoke(user_id, token).await?,
            None => {
                self.tokens.revoke_all(user_id).await?;
            }
        }
        tracing::info!(user_id, "User logged out");
        Ok(())
    }

    /// Resolve an access token to a live, active user
    pub async fn authenticate(&self, access_token: &str) -> ServiceResult<User> {
        let claims = self.tokens.verify_access(access_token)?;
        let user = self
            .user_repo
            .get_by_id(claims.user_id()?)
            .await
            .context("Failed to load user")?
            .ok_or_else(|| ServiceError::unauthorized("Account no longer exists"))?;
        if !user.is_active {
            return Err(ServiceError::forbidden("Account is disabled"));
        }
        Ok(user)
    }

    pub async fn get(&self, id: i64) -> ServiceResult<User> {
        self.user_repo
            .get_by_id(id)
            .await
            .context("Failed to get user")?
            .ok_or_else(|| ServiceError::not_found(format!("User not found: {}", id)))
    }

    pub async fn list(&self, filter: &UserFilter, params: &ListParams) -> ServiceResult<PagedResult<User>> {
        let total = self.user_repo.count(filter).await.context("Failed to count users")?;
        let items = self
            .user_repo
            .list(filter, params.offset(), params.limit())
            .await
            .context("Failed to list users")?;
        Ok(PagedResult::new(items, total, params))
    }

    /// Apply a partial update. Users may edit only themselves; only admins
    /// may change `role` or `is_active`.
    pub async fn update(&self, actor: &User, id: i64, input: UpdateUserInput) -> ServiceResult<User> {
        if !actor.can_manage(id) {
            return Err(ServiceError::forbidden("You may only update your own account"));
        }
        if input.touches_privileges() && !actor.is_admin() {
            return Err(ServiceError::forbidden("Only admins may change role or status"));
        }

        let mut user = self.get(id).await?;
        if !input.has_changes() {
            return Ok(user);
        }

        if let Some(username) = input.username {
            let username = username.trim().to_string();
            validate_username(&username)?;
            if username != user.username {
                self.ensure_username_free(&username, Some(id)).await?;
            }
            user.username = username;
        }
        if let Some(email) = input.email {
            let email = email.trim().to_lowercase();
            validate_email(&email)?;
            if email != user.email {
                self.ensure_email_free(&email, Some(id)).await?;
            }
            user.email = email;
        }
        if let Some(full_name) = input.full_name {
            let full_name = normalize_optional(Some(full_name));
            validate_optional_length("full_name", full_name.as_deref(), FULL_NAME_MAX)?;
            user.full_name = full_name;
        }
        if let Some(role) = input.role {
            user.role = role;
        }
        let deactivated = input.is_active == Some(false) && user.is_active;
        if let Some(is_active) = input.is_active {
            user.is_active = is_active;
        }

        let updated = self
            .user_repo
            .update(&user)
            .await
            .map_err(|e| map_write_error(e, || "Username or email is already taken".to_string()))?
            .ok_or_else(|| ServiceError::not_found(format!("User not found: {}", id)))?;

        if deactivated {
            self.tokens.revoke_all(id).await?;
        }
        tracing::info!(user_id = id, actor_id = actor.id, "User updated");
        Ok(updated)
    }

    /// Change a password after checking the current one. Other sessions
    /// are logged out.
    pub async fn change_password(&self, user_id: i64, current: &str, new: &str) -> ServiceResult<()> {
        let user = self.get(user_id).await?;
        if !verify_password(current, &user.password_hash)? {
            return Err(ServiceError::unauthorized("Current password is incorrect"));
        }
        validate_password(new)?;

        let hash = hash_password(new)?;
        let updated = self
            .user_repo
            .update_password(user_id, &hash)
            .await
            .context("Failed to update password")?;
        if !updated {
            return Err(ServiceError::not_found(format!("User not found: {}", user_id)));
        }

        self.tokens.revoke_all(user_id).await?;
        tracing::info!(user_id, "Password changed");
        Ok(())
    }

    /// Soft-delete a user (admin only, never oneself) and revoke its tokens
    pub async fn delete(&self, actor: &User, id: i64) -> ServiceResult<()> {
        if !actor.is_admin() {
            return Err(ServiceError::forbidden("Only admins may delete users"));
        }
        if actor.id == id {
            return Err(ServiceError::forbidden("Admins cannot delete their own account"));
        }

        let deleted = self.user_repo.soft_delete(id).await.context("Failed to delete user")?;
        if !deleted {
            return Err(ServiceError::not_found(format!("User not found: {}", id)));
        }
        self.tokens.revoke_all(id).await?;

        tracing::info!(user_id = id, actor_id = actor.id, "User deleted");
        Ok(())
    }

    async fn find_by_login(&self, login: &str) -> ServiceResult<Option<User>> {
        let user = if login.contains('@') {
            self.user_repo.get_by_email(&login.to_lowercase()).await
        } else {
            self.user_repo.get_by_username(login).await
        }
        .context("Failed to look up user")?;
        Ok(user)
    }

    async fn ensure_username_free(&self, username: &str, exclude_id: Option<i64>) -> ServiceResult<()> {
        let existing = self
            .user_repo
            .get_by_username(username)
            .await
            .context("Failed to check username")?;
        match existing {
            Some(other) if Some(other.id) != exclude_id => Err(ServiceError::conflict(format!(
                "Username '{}' is already taken",
                username
            ))),
            _ => Ok(()),
        }
    }

    async fn ensure_email_free(&self, email: &str, exclude_id: Option<i64>) -> ServiceResult<()> {
        let existing = self
            .user_repo
            .get_by_email(email)
            .await
            .context("Failed to check email")?;
        match existing {
            Some(other) if Some(other.id) != exclude_id => Err(ServiceError::conflict(format!(
                "Email '{}' is already registered",
                email
            ))),
            _ => Ok(()),
        }
    }

    fn send_welcome(&self, user: User) {
        let mailer = self.mailer.clone();
        tokio::spawn(async move {
            if let Err(e) = mailer.send_welcome(&user).await {
                tracing::warn!(user_id = user.id, error = %e, "Failed to send welcome email");
            }
        });
    }
}
