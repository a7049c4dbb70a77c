use std::collections::HashMap;
use std::sync::LazyLock;

use axum::RequestPartsExt;
use axum::extract::{FromRequestParts, Path, State};
use axum::http::StatusCode;
use axum::http::request::Parts;
use axum::response::IntoResponse;
use axum::Json;
use axum_extra::extract::TypedHeader;
use axum_extra::headers::{Authorization, authorization::Bearer};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use tracing::instrument;
use uuid::Uuid;

use crate::errors::ApiError;
use crate::models::project::Project;
use crate::models::user::{Session, SessionUser};
use crate::startup::AppState;

static KEYS: LazyLock<Keys> = LazyLock::new(|| {
    let secret = std::env::var("JWT_SECRET").expect("JWT_SECRET must be set");
    Keys::new(secret.as_bytes())
});

pub struct Keys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl Keys {
    pub fn new(secret: &[u8]) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub superadmin: bool,
    pub exp: usize,
}

#[derive(Debug, Serialize)]
pub struct AuthBody {
    access_token: String,
    token_type: String,
}

impl AuthBody {
    fn new(access_token: String) -> Self {
        Self {
            access_token,
            token_type: "Bearer".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AuthPayload {
    email: String,
    password: String,
}

#[instrument(name = "HTTP: Register", skip(state, payload))]
pub async fn register_handler(
    State(state): State<AppState>,
    Json(payload): Json<AuthPayload>,
) -> Result<impl IntoResponse, ApiError> {
    if payload.email.is_empty() || payload.password.is_empty() {
        return Err(ApiError::MissingCredentials);
    }

    state
        .auth_service
        .register(&payload.email, &payload.password)
        .await?;

    Ok(StatusCode::CREATED)
}

#[instrument(
    name = "HTTP: Authorize",
    skip(state, payload),
    fields(user_email = %payload.email)
)]
pub async fn authorize_handler(
    State(state): State<AppState>,
    Json(payload): Json<AuthPayload>,
) -> Result<Json<AuthBody>, ApiError> {
    if payload.email.is_empty() || payload.password.is_empty() {
        return Err(ApiError::MissingCredentials);
    }

    let user = state
        .auth_service
        .login(&payload.email, &payload.password)
        .await?;

    let claims = Claims {
        sub: user.id.to_string(),
        superadmin: user.superadmin,
        exp: (chrono::Utc::now() + chrono::Duration::hours(24)).timestamp() as usize,
    };

    let token = encode(&Header::default(), &claims, &KEYS.encoding).map_err(|e| {
        tracing::error!("JWT encoding failed: {:?}", e);
        ApiError::Internal(anyhow::anyhow!("failed to generate session token"))
    })?;

    tracing::info!("JWT issued for user");
    Ok(Json(AuthBody::new(token)))
}

impl<S> FromRequestParts<S> for Claims
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    #[instrument(name = "Extracting Claims", skip(_state, parts))]
    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) = parts
            .extract::<TypedHeader<Authorization<Bearer>>>()
            .await
            .map_err(|_| {
                tracing::warn!("No bearer token on request");
                ApiError::InvalidToken
            })?;

        let token_data = decode::<Claims>(bearer.token(), &KEYS.decoding, &Validation::default())
            .map_err(|e| {
            tracing::warn!("JWT decoding failed: {:?}", e);
            ApiError::InvalidToken
        })?;

        Ok(token_data.claims)
    }
}

/// The project authorization gate. Resolves the bearer session and the
/// `{slug}` path parameter to a project plus the caller's membership, and
/// hands both to the handler as explicit parameters. Requests without a
/// valid session, with an unknown slug, or from a caller with neither a
/// membership nor the superadmin flag never reach the handler.
#[derive(Debug, Clone)]
pub struct ProjectGate {
    pub project: Project,
    pub session: Session,
}

impl FromRequestParts<AppState> for ProjectGate {
    type Rejection = ApiError;

    #[instrument(name = "Project authorization gate", skip(parts, state))]
    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let claims = Claims::from_request_parts(parts, state).await?;
        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| ApiError::InvalidToken)?;

        let Path(params) = parts
            .extract::<Path<HashMap<String, String>>>()
            .await
            .map_err(|_| ApiError::ProjectNotFound)?;
        let slug = params.get("slug").ok_or(ApiError::ProjectNotFound)?;

        let project = state
            .project_service
            .find_for_user(slug, user_id)
            .await
            .map_err(ApiError::Internal)?
            .ok_or(ApiError::ProjectNotFound)?;

        if project.users.is_empty() && !claims.superadmin {
            tracing::warn!(project = %project.slug, "Caller has no access to project");
            return Err(ApiError::MissingAccess);
        }

        Ok(ProjectGate {
            project,
            session: Session {
                user: SessionUser {
                    id: user_id,
                    superadmin: claims.superadmin,
                },
            },
        })
    }
}
