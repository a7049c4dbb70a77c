use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use tracing::instrument;

use crate::{errors::ApiError, models::user::UserModel, store::UserRepository};

#[derive(Clone, Debug)]
pub struct AuthService {
    repo: UserRepository,
}

impl AuthService {
    pub fn new(repo: UserRepository) -> Self {
        Self { repo }
    }

    #[instrument(name = "AuthService: Register", skip(self, password), fields(user_email = %email))]
    pub async fn register(&self, email: &str, password: &str) -> Result<uuid::Uuid, ApiError> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| ApiError::Internal(anyhow::anyhow!("failed to hash password: {}", e)))?
            .to_string();

        self.repo.create_user(email, &hash).await.map_err(|e| {
            if is_unique_violation(&e) {
                ApiError::UserAlreadyExists
            } else {
                ApiError::Internal(e.into())
            }
        })
    }

    #[instrument(
        name = "AuthService: Login attempt",
        skip(self, password),
        fields(user_email = %email)
    )]
    pub async fn login(&self, email: &str, password: &str) -> Result<UserModel, ApiError> {
        let user = self.repo.find_by_email(email).await.map_err(|e| {
            tracing::error!("Database error during login: {:?}", e);
            ApiError::Internal(e)
        })?;

        let user = match user {
            Some(u) => u,
            None => {
                tracing::warn!("Login failed: user not found");
                return Err(ApiError::WrongCredentials);
            }
        };

        let parsed_hash = PasswordHash::new(&user.password_hash).map_err(|e| {
            tracing::error!("Failed to parse stored password hash: {:?}", e);
            ApiError::Internal(anyhow::anyhow!("corrupt password hash"))
        })?;

        if Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_err()
        {
            tracing::warn!("Login failed: invalid password provided");
            return Err(ApiError::WrongCredentials);
        }

        tracing::info!("User authenticated successfully");
        Ok(user)
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Database(db) if db.code().as_deref() == Some("23505")
    )
}
