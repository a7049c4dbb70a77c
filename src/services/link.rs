use tracing::instrument;

use crate::{
    models::link::{Link, LinkMetadata, LinkRecord},
    store::{LinkStore, LinkStoreError},
};

#[derive(Clone)]
pub struct LinkService {
    store: LinkStore,
}

impl LinkService {
    pub fn new(store: LinkStore) -> Self {
        Self { store }
    }

    pub async fn list(&self, domain: &str) -> Result<Vec<Link>, LinkStoreError> {
        self.store.list(domain).await
    }

    pub async fn get(&self, domain: &str, key: &str) -> Result<Option<Link>, LinkStoreError> {
        self.store.get(domain, key).await
    }

    /// Create a link. The last-modified marker is stamped here; callers
    /// never supply it on creation.
    #[instrument(name = "Service: Create link", skip(self, meta))]
    pub async fn create(
        &self,
        domain: &str,
        key: &str,
        url: &str,
        meta: LinkMetadata,
    ) -> Result<Link, LinkStoreError> {
        let record = LinkRecord {
            url: url.to_string(),
            title: meta.title,
            description: meta.description,
            image: meta.image,
            timestamp: chrono::Utc::now().timestamp_millis(),
        };
        self.store.add(domain, key, record).await
    }

    #[instrument(name = "Service: Edit link", skip(self, record))]
    pub async fn edit(
        &self,
        domain: &str,
        old_key: &str,
        new_key: &str,
        record: LinkRecord,
    ) -> Result<Link, LinkStoreError> {
        self.store.edit(domain, old_key, new_key, record).await
    }

    pub async fn delete(&self, domain: &str, key: &str) -> Result<u64, LinkStoreError> {
        self.store.delete(domain, key).await
    }

    /// Resolve a key to its destination URL for redirecting. Lookup
    /// failures are treated as a miss; the redirect route has no useful
    /// recovery beyond 404 anyway.
    #[instrument(name = "Service: Resolve link", skip(self))]
    pub async fn resolve(&self, domain: &str, key: &str) -> Option<String> {
        match self.store.get(domain, key).await {
            Ok(found) => found.map(|link| link.url),
            Err(e) => {
                tracing::error!("Failed to resolve link: {:?}", e);
                None
            }
        }
    }
}
