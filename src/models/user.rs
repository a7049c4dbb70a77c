use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use uuid::Uuid;

#[derive(Debug, FromRow, Serialize, Deserialize)]
pub struct UserModel {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub superadmin: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// The resolved session the authorization gate hands to handlers.
#[derive(Debug, Clone)]
pub struct Session {
    pub user: SessionUser,
}

#[derive(Debug, Clone)]
pub struct SessionUser {
    pub id: Uuid,
    pub superadmin: bool,
}
