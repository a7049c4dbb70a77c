use axum::{
    Json,
    http::{HeaderValue, Method, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::store::LinkStoreError;

#[derive(Debug, Error)]
pub enum ApiError {
    // Validation
    #[error("Missing url")]
    MissingUrl,

    #[error("Invalid key")]
    InvalidKey,

    #[error("Missing key or url or title or timestamp")]
    MissingEditFields,

    #[error("Key already exists")]
    KeyExists,

    // Authentication / authorization
    #[error("Missing credentials")]
    MissingCredentials,

    #[error("Wrong credentials")]
    WrongCredentials,

    #[error("Invalid or expired session")]
    InvalidToken,

    #[error("Missing permissions")]
    MissingPermissions,

    #[error("Missing access")]
    MissingAccess,

    #[error("User already exists")]
    UserAlreadyExists,

    // Lookup
    #[error("Project not found")]
    ProjectNotFound,

    #[error("Link not found")]
    LinkNotFound,

    #[error("Method {method} Not Allowed")]
    MethodNotAllowed {
        method: Method,
        allow: &'static str,
    },

    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::MissingUrl
            | ApiError::InvalidKey
            | ApiError::MissingEditFields
            | ApiError::KeyExists
            | ApiError::MissingCredentials => StatusCode::BAD_REQUEST,
            ApiError::WrongCredentials | ApiError::InvalidToken => StatusCode::UNAUTHORIZED,
            ApiError::MissingPermissions | ApiError::MissingAccess => StatusCode::FORBIDDEN,
            ApiError::UserAlreadyExists => StatusCode::CONFLICT,
            ApiError::ProjectNotFound | ApiError::LinkNotFound => StatusCode::NOT_FOUND,
            ApiError::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Internal(source) = &self {
            tracing::error!("request failed: {:?}", source);
        }

        let status = self.status();
        let body = Json(json!({ "error": self.to_string() }));
        let mut response = (status, body).into_response();

        if let ApiError::MethodNotAllowed { allow, .. } = self {
            response
                .headers_mut()
                .insert(header::ALLOW, HeaderValue::from_static(allow));
        }

        response
    }
}

impl From<LinkStoreError> for ApiError {
    fn from(err: LinkStoreError) -> Self {
        match err {
            LinkStoreError::Conflict => ApiError::KeyExists,
            LinkStoreError::NotFound => ApiError::LinkNotFound,
            other => ApiError::Internal(other.into()),
        }
    }
}
