use tracing::instrument;
use uuid::Uuid;

use crate::{models::project::Project, store::ProjectRepository};

#[derive(Clone, Debug)]
pub struct ProjectService {
    repo: ProjectRepository,
}

impl ProjectService {
    pub fn new(repo: ProjectRepository) -> Self {
        Self { repo }
    }

    #[instrument(name = "Service: Find project for user", skip(self))]
    pub async fn find_for_user(
        &self,
        slug: &str,
        user_id: Uuid,
    ) -> anyhow::Result<Option<Project>> {
        self.repo.find_by_slug_for_user(slug, user_id).await
    }
}
