use sqlx::{Pool, Postgres, prelude::FromRow};
use tracing::instrument;
use uuid::Uuid;

use crate::models::project::{Project, ProjectUser, Role};

#[derive(Clone, Debug)]
pub struct ProjectRepository {
    pool: Pool<Postgres>,
}

#[derive(FromRow)]
struct ProjectRow {
    id: Uuid,
    name: String,
    slug: String,
    domain: String,
    role: Option<String>,
}

impl ProjectRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Fetch a project by slug together with the requesting user's
    /// membership, if any. The left join keeps the project visible to the
    /// gate even when the caller has no membership (superadmins pass the
    /// gate without one).
    #[instrument(name = "Fetching project by slug", skip(self))]
    pub async fn find_by_slug_for_user(
        &self,
        slug: &str,
        user_id: Uuid,
    ) -> anyhow::Result<Option<Project>> {
        let row = sqlx::query_as::<_, ProjectRow>(
            r#"SELECT p.id, p.name, p.slug, p.domain, pu.role
               FROM projects p
               LEFT JOIN project_users pu
                 ON pu.project_id = p.id AND pu.user_id = $2
               WHERE p.slug = $1"#,
        )
        .bind(slug)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to fetch project: {:?}", e);
            e
        })?;

        Ok(row.map(|r| {
            let users = match r.role.as_deref().map(str::parse::<Role>) {
                Some(Ok(role)) => vec![ProjectUser { user_id, role }],
                Some(Err(err)) => {
                    tracing::warn!("Ignoring unparseable membership role: {}", err);
                    Vec::new()
                }
                None => Vec::new(),
            };
            Project {
                id: r.id,
                name: r.name,
                slug: r.slug,
                domain: r.domain,
                users,
            }
        }))
    }
}
