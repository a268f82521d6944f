use crate::models::ApiToken;
use chrono::{Duration, Utc};
use rand::Rng;
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;

#[derive(Debug, thiserror::Error)]
pub enum ApiTokenError {
    #[error("Invalid API token")]
    InvalidToken,
    #[error("API token expired")]
    Expired,
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedToken {
    pub user_id: i64,
    pub expires_at: i64,
}

/// 32 random bytes, hex-encoded.
pub fn generate_token() -> String {
    let mut rng = rand::thread_rng();
    let bytes: Vec<u8> = (0..32).map(|_| rng.gen()).collect();
    hex::encode(bytes)
}

/// SHA-256 hex digest; only this form of a token is ever stored.
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Bearer tokens for the JSON API.
pub struct ApiTokenService {
    pool: SqlitePool,
    ttl: Duration,
}

impl ApiTokenService {
    pub fn new(pool: SqlitePool, ttl: Duration) -> Self {
        Self { pool, ttl }
    }

    /// Issues a token for `user_id` and returns the plaintext. It cannot be
    /// recovered later.
    pub async fn issue(&self, user_id: i64) -> Result<String, ApiTokenError> {
        let token = generate_token();
        let now = Utc::now().timestamp();
        let expires_at = now + self.ttl.num_seconds();

        sqlx::query(
            "INSERT INTO api_tokens (user_id, token_hash, expires_at, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(user_id)
        .bind(hash_token(&token))
        .bind(expires_at)
        .bind(now)
        .execute(&self.pool)
        .await?;

        tracing::debug!("Issued API token for user {}", user_id);
        Ok(token)
    }

    pub async fn validate(&self, token: &str) -> Result<ValidatedToken, ApiTokenError> {
        let token_hash = hash_token(token);

        let record = sqlx::query_as::<_, ApiToken>(
            r#"
            SELECT id, user_id, token_hash, expires_at, created_at, last_used_at
            FROM api_tokens
            WHERE token_hash = ?
            "#,
        )
        .bind(&token_hash)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(ApiTokenError::InvalidToken)?;

        let now = Utc::now().timestamp();
        if record.expires_at < now {
            sqlx::query("DELETE FROM api_tokens WHERE id = ?")
                .bind(record.id)
                .execute(&self.pool)
                .await?;
            return Err(ApiTokenError::Expired);
        }

        sqlx::query("UPDATE api_tokens SET last_used_at = ? WHERE id = ?")
            .bind(now)
            .bind(record.id)
            .execute(&self.pool)
            .await?;

        Ok(ValidatedToken {
            user_id: record.user_id,
            expires_at: record.expires_at,
        })
    }

    /// Returns whether a token was actually removed.
    pub async fn revoke(&self, token: &str) -> Result<bool, ApiTokenError> {
        let result = sqlx::query("DELETE FROM api_tokens WHERE token_hash = ?")
            .bind(hash_token(token))
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn revoke_all_for_user(&self, user_id: i64) -> Result<u64, ApiTokenError> {
        let result = sqlx::query("DELETE FROM api_tokens WHERE user_id = ?")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn cleanup_expired(&self) -> Result<u64, ApiTokenError> {
        let result = sqlx::query("DELETE FROM api_tokens WHERE expires_at < ?")
            .bind(Utc::now().timestamp())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() > 0 {
            tracing::info!("Removed {} expired API tokens", result.rows_affected());
        }
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::test_helpers;

    async fn service_with_user() -> (ApiTokenService, SqlitePool, i64) {
        let pool = test_helpers::create_test_db().await.unwrap();
        let user_id = test_helpers::insert_test_user(&pool, "Site Ops", "ops@example.com", "secret1")
            .await
            .unwrap();
        (ApiTokenService::new(pool.clone(), Duration::hours(24)), pool, user_id)
    }

    async fn backdate(pool: &SqlitePool, token: &str) {
        sqlx::query("UPDATE api_tokens SET expires_at = ? WHERE token_hash = ?")
            .bind(Utc::now().timestamp() - 60)
            .bind(hash_token(token))
            .execute(pool)
            .await
            .unwrap();
    }

    async fn stored_count(pool: &SqlitePool, token: &str) -> i64 {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM api_tokens WHERE token_hash = ?")
            .bind(hash_token(token))
            .fetch_one(pool)
            .await
            .unwrap();
        count
    }

    #[test]
    fn test_generate_token_shape() {
        let a = generate_token();
        let b = generate_token();
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn test_hash_token_is_stable_sha256() {
        assert_eq!(
            hash_token("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_ne!(hash_token("abc"), hash_token("abd"));
    }

    #[tokio::test]
    async fn test_validate_live_token() {
        let (service, _pool, user_id) = service_with_user().await;
        let token = service.issue(user_id).await.unwrap();

        let validated = service.validate(&token).await.unwrap();
        assert_eq!(validated.user_id, user_id);
        assert!(matches!(
            service.validate("not-a-token").await,
            Err(ApiTokenError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn test_expired_token_is_rejected_and_deleted() {
        let (service, pool, user_id) = service_with_user().await;
        let token = service.issue(user_id).await.unwrap();
        backdate(&pool, &token).await;

        assert!(matches!(service.validate(&token).await, Err(ApiTokenError::Expired)));
        assert_eq!(stored_count(&pool, &token).await, 0);

        // Once deleted the token is simply unknown
        assert!(matches!(
            service.validate(&token).await,
            Err(ApiTokenError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn test_cleanup_expired_keeps_live_tokens() {
        let (service, pool, user_id) = service_with_user().await;
        let live = service.issue(user_id).await.unwrap();
        let stale = service.issue(user_id).await.unwrap();
        backdate(&pool, &stale).await;

        assert_eq!(service.cleanup_expired().await.unwrap(), 1);
        assert_eq!(stored_count(&pool, &stale).await, 0);
        assert_eq!(service.validate(&live).await.unwrap().user_id, user_id);
    }

    #[tokio::test]
    async fn test_revoke_all_for_user() {
        let (service, _pool, user_id) = service_with_user().await;
        let first = service.issue(user_id).await.unwrap();
        service.issue(user_id).await.unwrap();

        assert_eq!(service.revoke_all_for_user(user_id).await.unwrap(), 2);
        assert!(!service.revoke(&first).await.unwrap());
    }
}
