use axum::{
    Json,
    extract::{Path, State},
    http::Method,
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::instrument;

use crate::{
    errors::ApiError,
    models::{
        link::{Link, LinkMetadata, LinkRecord, valid_key},
        project::Project,
        user::Session,
    },
    routes::auth::ProjectGate,
    startup::AppState,
};

#[derive(Debug, Default, Deserialize)]
pub struct CreateLinkBody {
    pub key: Option<String>,
    pub url: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub image: Option<String>,
}

/// Echo body for a successful create. Absent metadata is left out of the
/// JSON entirely rather than serialized as null.
#[derive(Debug, Serialize)]
pub struct CreatedLink {
    pub key: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct EditLinkBody {
    pub key: Option<String>,
    pub url: Option<String>,
    pub title: Option<String>,
    pub timestamp: Option<i64>,
    pub description: Option<String>,
    pub image: Option<String>,
}

/// GET /api/projects/{slug}/links. Returns every link under the project's
/// domain. Any caller past the gate may list; no role check.
#[instrument(name = "HTTP: List links", skip(state, gate), fields(project = %gate.project.slug))]
pub async fn list_links(
    State(state): State<AppState>,
    gate: ProjectGate,
) -> Result<Json<Vec<Link>>, ApiError> {
    let links = state.link_service.list(&gate.project.domain).await?;
    Ok(Json(links))
}

/// POST /api/projects/{slug}/links. Creates a link. Checks run in order:
/// role, then url presence, then key shape; the first failure wins.
#[instrument(
    name = "HTTP: Create link",
    skip(state, gate, body),
    fields(project = %gate.project.slug)
)]
pub async fn create_link(
    State(state): State<AppState>,
    gate: ProjectGate,
    Json(body): Json<CreateLinkBody>,
) -> Result<impl IntoResponse, ApiError> {
    ensure_can_create(&gate.project, &gate.session)?;
    let (key, url) = validate_create(&body)?;

    state
        .link_service
        .create(
            &gate.project.domain,
            key,
            url,
            LinkMetadata {
                title: body.title.clone(),
                description: body.description.clone(),
                image: body.image.clone(),
            },
        )
        .await?;

    Ok(Json(CreatedLink {
        key: key.to_string(),
        url: url.to_string(),
        title: body.title.clone(),
        description: body.description.clone(),
        image: body.image.clone(),
    }))
}

/// PUT /api/projects/{slug}/links/{key}. Edits a link, possibly renaming
/// it. The path carries the current key; the body carries the new one.
#[instrument(
    name = "HTTP: Edit link",
    skip(state, gate, body),
    fields(project = %gate.project.slug)
)]
pub async fn update_link(
    State(state): State<AppState>,
    gate: ProjectGate,
    Path((_slug, old_key)): Path<(String, String)>,
    Json(body): Json<EditLinkBody>,
) -> Result<Json<Link>, ApiError> {
    let (new_key, record) = validate_edit(&body)?;

    let updated = state
        .link_service
        .edit(&gate.project.domain, &old_key, new_key, record)
        .await?;

    Ok(Json(updated))
}

/// DELETE /api/projects/{slug}/links/{key}. Idempotent: deleting an
/// absent key still answers 200 with a zero count.
#[instrument(
    name = "HTTP: Delete link",
    skip(state, gate),
    fields(project = %gate.project.slug)
)]
pub async fn delete_link(
    State(state): State<AppState>,
    gate: ProjectGate,
    Path((_slug, key)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let removed = state
        .link_service
        .delete(&gate.project.domain, &key)
        .await?;

    Ok(Json(json!({ "deleted": removed })))
}

pub async fn collection_method_not_allowed(method: Method) -> ApiError {
    ApiError::MethodNotAllowed {
        method,
        allow: "GET, POST",
    }
}

pub async fn link_method_not_allowed(method: Method) -> ApiError {
    ApiError::MethodNotAllowed {
        method,
        allow: "PUT, DELETE",
    }
}

/// Creation is allowed for superadmins and for callers whose first resolved
/// membership carries an editing role.
fn ensure_can_create(project: &Project, session: &Session) -> Result<(), ApiError> {
    if session.user.superadmin {
        return Ok(());
    }
    match project.users.first() {
        Some(membership) if membership.role.can_edit_links() => Ok(()),
        _ => Err(ApiError::MissingPermissions),
    }
}

fn validate_create(body: &CreateLinkBody) -> Result<(&str, &str), ApiError> {
    let url = body
        .url
        .as_deref()
        .filter(|url| !url.is_empty())
        .ok_or(ApiError::MissingUrl)?;
    let key = body
        .key
        .as_deref()
        .filter(|key| valid_key(key))
        .ok_or(ApiError::InvalidKey)?;
    Ok((key, url))
}

fn validate_edit(body: &EditLinkBody) -> Result<(&str, LinkRecord), ApiError> {
    let (key, url, title, timestamp) = match (
        body.key.as_deref().filter(|s| !s.is_empty()),
        body.url.as_deref().filter(|s| !s.is_empty()),
        body.title.as_deref().filter(|s| !s.is_empty()),
        body.timestamp,
    ) {
        (Some(key), Some(url), Some(title), Some(timestamp)) => (key, url, title, timestamp),
        _ => return Err(ApiError::MissingEditFields),
    };

    Ok((
        key,
        LinkRecord {
            url: url.to_string(),
            title: Some(title.to_string()),
            description: body.description.clone(),
            image: body.image.clone(),
            timestamp,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        project::{ProjectUser, Role},
        user::SessionUser,
    };
    use uuid::Uuid;

    fn project_with_role(role: Option<Role>) -> Project {
        Project {
            id: Uuid::new_v4(),
            name: "Acme".into(),
            slug: "acme".into(),
            domain: "acme.sh".into(),
            users: role
                .map(|role| {
                    vec![ProjectUser {
                        user_id: Uuid::new_v4(),
                        role,
                    }]
                })
                .unwrap_or_default(),
        }
    }

    fn session(superadmin: bool) -> Session {
        Session {
            user: SessionUser {
                id: Uuid::new_v4(),
                superadmin,
            },
        }
    }

    #[test]
    fn editing_roles_may_create_links() {
        for role in [Role::Owner, Role::Manager, Role::Member] {
            let project = project_with_role(Some(role));
            assert!(ensure_can_create(&project, &session(false)).is_ok());
        }
    }

    #[test]
    fn viewers_are_missing_permissions() {
        let project = project_with_role(Some(Role::Viewer));
        assert!(matches!(
            ensure_can_create(&project, &session(false)),
            Err(ApiError::MissingPermissions)
        ));
    }

    #[test]
    fn superadmin_bypasses_the_role_check() {
        let project = project_with_role(None);
        assert!(ensure_can_create(&project, &session(true)).is_ok());
    }

    #[test]
    fn missing_url_is_reported_before_the_key_is_inspected() {
        let body = CreateLinkBody {
            key: Some("not a valid key".into()),
            ..Default::default()
        };
        assert!(matches!(
            validate_create(&body),
            Err(ApiError::MissingUrl)
        ));
    }

    #[test]
    fn absent_or_malformed_keys_are_invalid() {
        let mut body = CreateLinkBody {
            url: Some("https://example.com".into()),
            ..Default::default()
        };
        assert!(matches!(validate_create(&body), Err(ApiError::InvalidKey)));

        body.key = Some("foo bar".into());
        assert!(matches!(validate_create(&body), Err(ApiError::InvalidKey)));

        body.key = Some("foo/bar".into());
        assert!(matches!(validate_create(&body), Err(ApiError::InvalidKey)));
    }

    #[test]
    fn valid_create_bodies_pass_through() {
        let body = CreateLinkBody {
            key: Some("abc".into()),
            url: Some("https://example.com".into()),
            ..Default::default()
        };
        let (key, url) = validate_create(&body).unwrap();
        assert_eq!(key, "abc");
        assert_eq!(url, "https://example.com");
    }

    #[test]
    fn edits_require_all_four_fields() {
        let complete = EditLinkBody {
            key: Some("abc".into()),
            url: Some("https://example.com".into()),
            title: Some("Example".into()),
            timestamp: Some(1_700_000_000_000),
            ..Default::default()
        };
        assert!(validate_edit(&complete).is_ok());

        for missing in ["key", "url", "title", "timestamp"] {
            let mut body = EditLinkBody {
                key: complete.key.clone(),
                url: complete.url.clone(),
                title: complete.title.clone(),
                timestamp: complete.timestamp,
                ..Default::default()
            };
            match missing {
                "key" => body.key = None,
                "url" => body.url = None,
                "title" => body.title = None,
                _ => body.timestamp = None,
            }
            assert!(
                matches!(validate_edit(&body), Err(ApiError::MissingEditFields)),
                "expected rejection when {} is absent",
                missing
            );
        }
    }

    #[test]
    fn create_echo_omits_absent_metadata() {
        let mut echo = CreatedLink {
            key: "abc".into(),
            url: "https://example.com".into(),
            title: None,
            description: None,
            image: None,
        };
        let json = serde_json::to_value(&echo).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "key": "abc", "url": "https://example.com" })
        );

        echo.title = Some("Example".into());
        let json = serde_json::to_value(&echo).unwrap();
        assert_eq!(json["title"], "Example");
        assert!(json.get("description").is_none());
    }

    #[test]
    fn edit_carries_optional_metadata_through() {
        let body = EditLinkBody {
            key: Some("abc".into()),
            url: Some("https://example.com".into()),
            title: Some("Example".into()),
            timestamp: Some(42),
            description: Some("desc".into()),
            image: None,
        };
        let (key, record) = validate_edit(&body).unwrap();
        assert_eq!(key, "abc");
        assert_eq!(record.description.as_deref(), Some("desc"));
        assert_eq!(record.image, None);
        assert_eq!(record.timestamp, 42);
    }
}
