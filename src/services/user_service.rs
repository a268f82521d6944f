use crate::models::user::User;
use crate::repositories::user_repository::{RepositoryError, UserRepository};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, SaltString},
    Argon2, PasswordVerifier,
};
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;

pub const MIN_PASSWORD_LENGTH: usize = 6;
pub const MIN_NAME_LENGTH: usize = 2;

static EMAIL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern is a valid regex")
});

#[derive(Debug, thiserror::Error)]
pub enum UserServiceError {
    #[error("Name must be at least 2 characters")]
    InvalidName,
    #[error("Invalid email address")]
    InvalidEmail,
    #[error("Password must be at least 6 characters")]
    WeakPassword,
    #[error("Passwords do not match")]
    PasswordMismatch,
    #[error("User not found")]
    UserNotFound,
    #[error("User already exists")]
    EmailTaken,
    #[error("Password hashing failed: {0}")]
    HashingError(String),
    #[error("Repository error: {0}")]
    RepositoryError(#[from] RepositoryError),
}

pub struct CreateUserRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub password_confirm: Option<String>,
}

pub struct UpdatePasswordRequest {
    pub user_id: i64,
    pub new_password: String,
    pub new_password_confirm: Option<String>,
}

/// Lower-cases and trims an email so lookups are case-insensitive.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub struct UserService {
    repository: Arc<dyn UserRepository>,
}

impl UserService {
    pub fn new(repository: Arc<dyn UserRepository>) -> Self {
        Self { repository }
    }

    pub async fn create_user(&self, request: CreateUserRequest) -> Result<User, UserServiceError> {
        let name = request.name.trim();
        if name.chars().count() < MIN_NAME_LENGTH {
            return Err(UserServiceError::InvalidName);
        }

        let email = normalize_email(&request.email);
        validate_email(&email)?;

        if let Some(ref confirm) = request.password_confirm {
            if request.password != *confirm {
                return Err(UserServiceError::PasswordMismatch);
            }
        }

        validate_password(&request.password)?;

        let password_hash = hash_password(&request.password)?;

        match self
            .repository
            .create_user(name, &email, &password_hash)
            .await
        {
            Ok(user) => {
                tracing::info!("Created user {} ({})", user.id, user.email);
                Ok(user)
            }
            Err(RepositoryError::AlreadyExists) => Err(UserServiceError::EmailTaken),
            Err(e) => Err(UserServiceError::RepositoryError(e)),
        }
    }

    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, UserServiceError> {
        Ok(self.repository.find_by_email(&normalize_email(email)).await?)
    }

    pub async fn find_user_by_id(&self, id: i64) -> Result<Option<User>, UserServiceError> {
        Ok(self.repository.find_by_id(id).await?)
    }

    pub async fn list_users(
        &self,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<User>, UserServiceError> {
        Ok(self.repository.list_users(limit, offset).await?)
    }

    pub async fn delete_user(&self, id: i64) -> Result<(), UserServiceError> {
        match self.repository.delete_user(id).await {
            Ok(()) => Ok(()),
            Err(RepositoryError::NotFound) => Err(UserServiceError::UserNotFound),
            Err(e) => Err(UserServiceError::RepositoryError(e)),
        }
    }

    pub async fn update_password(
        &self,
        request: UpdatePasswordRequest,
    ) -> Result<(), UserServiceError> {
        if let Some(ref confirm) = request.new_password_confirm {
            if request.new_password != *confirm {
                return Err(UserServiceError::PasswordMismatch);
            }
        }

        validate_password(&request.new_password)?;

        let password_hash = hash_password(&request.new_password)?;

        match self
            .repository
            .update_password(request.user_id, &password_hash)
            .await
        {
            Ok(()) => Ok(()),
            Err(RepositoryError::NotFound) => Err(UserServiceError::UserNotFound),
            Err(e) => Err(UserServiceError::RepositoryError(e)),
        }
    }

    pub fn verify_password(&self, password: &str, password_hash: &str) -> bool {
        verify_password(password, password_hash)
    }
}

pub fn validate_email(email: &str) -> Result<(), UserServiceError> {
    if email.len() > 255 || !EMAIL_PATTERN.is_match(email) {
        return Err(UserServiceError::InvalidEmail);
    }
    Ok(())
}

pub fn validate_password(password: &str) -> Result<(), UserServiceError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(UserServiceError::WeakPassword);
    }
    Ok(())
}

pub fn hash_password(password: &str) -> Result<String, UserServiceError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| UserServiceError::HashingError(e.to_string()))
}

pub fn verify_password(password: &str, password_hash: &str) -> bool {
    match PasswordHash::new(password_hash) {
        Ok(parsed_hash) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok(),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::user_repository::MockUserRepository;
    use mockall::predicate::*;

    fn request(name: &str, email: &str, password: &str) -> CreateUserRequest {
        CreateUserRequest {
            name: name.to_string(),
            email: email.to_string(),
            password: password.to_string(),
            password_confirm: None,
        }
    }

    #[tokio::test]
    async fn test_create_user_normalizes_email() {
        let mut mock_repo = MockUserRepository::new();

        mock_repo
            .expect_create_user()
            .with(eq("Ada Lovelace"), eq("ada@example.com"), always())
            .times(1)
            .returning(|name, email, hash| {
                let user = User {
                    id: 1,
                    name: name.to_string(),
                    email: email.to_string(),
                    password_hash: hash.to_string(),
                    created_at: None,
                };
                Box::pin(async move { Ok(user) })
            });

        let service = UserService::new(Arc::new(mock_repo));

        let user = service
            .create_user(request("  Ada Lovelace ", " Ada@Example.COM", "secret1"))
            .await
            .expect("Expected Ok result");
        assert_eq!(user.email, "ada@example.com");
        assert!(verify_password("secret1", &user.password_hash));
    }

    #[tokio::test]
    async fn test_create_user_duplicate_maps_to_email_taken() {
        let mut mock_repo = MockUserRepository::new();
        mock_repo
            .expect_create_user()
            .times(1)
            .returning(|_, _, _| Box::pin(async move { Err(RepositoryError::AlreadyExists) }));

        let service = UserService::new(Arc::new(mock_repo));
        let result = service
            .create_user(request("Ada", "ada@example.com", "secret1"))
            .await;
        assert!(matches!(result, Err(UserServiceError::EmailTaken)));
    }

    #[tokio::test]
    async fn test_create_user_validation() {
        let service = UserService::new(Arc::new(MockUserRepository::new()));

        let result = service.create_user(request("A", "a@example.com", "secret1")).await;
        assert!(matches!(result, Err(UserServiceError::InvalidName)));

        let result = service.create_user(request("Ada", "invalid-email", "secret1")).await;
        assert!(matches!(result, Err(UserServiceError::InvalidEmail)));

        let result = service.create_user(request("Ada", "a@example.com", "short")).await;
        assert!(matches!(result, Err(UserServiceError::WeakPassword)));

        let mut mismatched = request("Ada", "a@example.com", "secret1");
        mismatched.password_confirm = Some("secret2".to_string());
        let result = service.create_user(mismatched).await;
        assert!(matches!(result, Err(UserServiceError::PasswordMismatch)));
    }

    #[tokio::test]
    async fn test_update_password_unknown_user() {
        let mut mock_repo = MockUserRepository::new();
        mock_repo
            .expect_update_password()
            .with(eq(42), always())
            .times(1)
            .returning(|_, _| Box::pin(async move { Err(RepositoryError::NotFound) }));

        let service = UserService::new(Arc::new(mock_repo));
        let result = service
            .update_password(UpdatePasswordRequest {
                user_id: 42,
                new_password: "newsecret".to_string(),
                new_password_confirm: None,
            })
            .await;
        assert!(matches!(result, Err(UserServiceError::UserNotFound)));
    }

    #[test]
    fn test_verify_password_rejects_garbage_hash() {
        assert!(!verify_password("secret1", "not-a-phc-string"));
    }
}
