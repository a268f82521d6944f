use crate::models::PasswordResetToken;
use crate::repositories::user_repository::UserRepository;
use crate::services::api_token_service::{generate_token, hash_token, ApiTokenError, ApiTokenService};
use crate::services::email_service::EmailService;
use crate::services::user_service::{
    hash_password, normalize_email, validate_password, UserServiceError,
};
use chrono::{Duration, Utc};
use sqlx::SqlitePool;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum PasswordResetError {
    #[error("Invalid or expired reset link")]
    InvalidToken,
    #[error("This reset link has already been used")]
    TokenAlreadyUsed,
    #[error("{0}")]
    Validation(String),
    #[error("User service error: {0}")]
    UserServiceError(String),
    #[error("API token error: {0}")]
    ApiTokenError(#[from] ApiTokenError),
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

impl From<UserServiceError> for PasswordResetError {
    fn from(err: UserServiceError) -> Self {
        match err {
            UserServiceError::WeakPassword | UserServiceError::PasswordMismatch => {
                PasswordResetError::Validation(err.to_string())
            }
            other => PasswordResetError::UserServiceError(other.to_string()),
        }
    }
}

pub struct PasswordResetService {
    pool: SqlitePool,
    email_service: Arc<dyn EmailService>,
    user_repository: Arc<dyn UserRepository>,
    api_tokens: Arc<ApiTokenService>,
    ttl: Duration,
}

impl PasswordResetService {
    pub fn new(
        pool: SqlitePool,
        email_service: Arc<dyn EmailService>,
        user_repository: Arc<dyn UserRepository>,
        api_tokens: Arc<ApiTokenService>,
        ttl: Duration,
    ) -> Self {
        Self {
            pool,
            email_service,
            user_repository,
            api_tokens,
            ttl,
        }
    }

    /// Starts a reset for `email`. Succeeds whether or not the account
    /// exists, so callers cannot probe for registered addresses.
    pub async fn request_reset(&self, email: &str) -> Result<(), PasswordResetError> {
        let email = normalize_email(email);
        let user = self
            .user_repository
            .find_by_email(&email)
            .await
            .map_err(|e| PasswordResetError::UserServiceError(e.to_string()))?;

        let Some(user) = user else {
            tracing::debug!("Password reset requested for unknown email");
            return Ok(());
        };

        let token = self.create_reset_token(user.id).await?;

        if let Err(e) = self
            .email_service
            .send_password_reset_email(&user.email, &user.name, &token)
            .await
        {
            tracing::error!("❌ Failed to send password reset email to {}: {:?}", user.email, e);
        } else {
            tracing::info!("✅ Password reset email sent to: {}", user.email);
        }

        Ok(())
    }

    /// Stores a fresh reset token for `user_id` and returns its plaintext.
    /// Any earlier unused token of the user stops working.
    pub async fn create_reset_token(&self, user_id: i64) -> Result<String, PasswordResetError> {
        let token = generate_token();
        let now = Utc::now().timestamp();
        let expires_at = now + self.ttl.num_seconds();

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "UPDATE password_reset_tokens SET used_at = ? WHERE user_id = ? AND used_at IS NULL",
        )
        .bind(now)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO password_reset_tokens (user_id, token_hash, expires_at, created_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(user_id)
        .bind(hash_token(&token))
        .bind(expires_at)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(token)
    }

    /// Looks up a token that is still usable.
    pub async fn verify_token(&self, token: &str) -> Result<PasswordResetToken, PasswordResetError> {
        let record = sqlx::query_as::<_, PasswordResetToken>(
            r#"
            SELECT id, user_id, token_hash, expires_at, created_at, used_at
            FROM password_reset_tokens
            WHERE token_hash = ?
            "#,
        )
        .bind(hash_token(token))
        .fetch_optional(&self.pool)
        .await?
        .ok_or(PasswordResetError::InvalidToken)?;

        if record.used_at.is_some() {
            return Err(PasswordResetError::TokenAlreadyUsed);
        }
        if record.expires_at < Utc::now().timestamp() {
            return Err(PasswordResetError::InvalidToken);
        }

        Ok(record)
    }

    /// Sets a new password for the owner of `token`. The token is claimed
    /// in the same transaction as the password write, so it can succeed at
    /// most once; input errors leave it usable.
    pub async fn reset_password(
        &self,
        token: &str,
        new_password: &str,
        new_password_confirm: &str,
    ) -> Result<(), PasswordResetError> {
        let record = self.verify_token(token).await?;

        if new_password != new_password_confirm {
            return Err(UserServiceError::PasswordMismatch.into());
        }
        validate_password(new_password)?;
        let password_hash = hash_password(new_password)?;

        let now = Utc::now().timestamp();
        let mut tx = self.pool.begin().await?;

        let claimed = sqlx::query(
            r#"
            UPDATE password_reset_tokens SET used_at = ?
            WHERE id = ? AND used_at IS NULL AND expires_at >= ?
            "#,
        )
        .bind(now)
        .bind(record.id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        if claimed.rows_affected() != 1 {
            tx.rollback().await?;
            return Err(PasswordResetError::TokenAlreadyUsed);
        }

        let updated = sqlx::query("UPDATE users SET password_hash = ? WHERE id = ?")
            .bind(&password_hash)
            .bind(record.user_id)
            .execute(&mut *tx)
            .await?;

        if updated.rows_affected() != 1 {
            tx.rollback().await?;
            return Err(UserServiceError::UserNotFound.into());
        }

        tx.commit().await?;

        let revoked = self.api_tokens.revoke_all_for_user(record.user_id).await?;
        tracing::info!(
            "Password reset for user {} ({} API tokens revoked)",
            record.user_id,
            revoked
        );

        Ok(())
    }

    pub async fn cleanup_expired_tokens(&self) -> Result<u64, PasswordResetError> {
        let result = sqlx::query(
            "DELETE FROM password_reset_tokens WHERE expires_at < ? OR used_at IS NOT NULL",
        )
        .bind(Utc::now().timestamp())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
