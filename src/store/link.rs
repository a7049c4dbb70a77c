use std::collections::HashMap;

use bb8_redis::{RedisConnectionManager, bb8, redis, redis::AsyncCommands};
use thiserror::Error;
use tracing::instrument;

use crate::models::link::{Link, LinkRecord};

pub type RedisPool = bb8::Pool<RedisConnectionManager>;

/// Tagged store outcomes. Conflict and NotFound are distinct kinds rather
/// than a sentinel empty value, so callers cannot confuse "the key was
/// taken" with "nothing was stored".
#[derive(Debug, Error)]
pub enum LinkStoreError {
    #[error("key already exists under this domain")]
    Conflict,

    #[error("no link with this key under this domain")]
    NotFound,

    #[error("corrupt link record")]
    Codec(#[from] serde_json::Error),

    #[error("redis command failed")]
    Redis(#[from] redis::RedisError),

    #[error("redis connection pool unavailable")]
    Pool(#[from] bb8::RunError<redis::RedisError>),
}

/// The hash commands the store is built on. One impl over a pooled redis
/// connection; tests drive the same create/rename branching through an
/// in-memory map.
trait LinkHash {
    async fn all(&mut self, hash: &str) -> Result<HashMap<String, String>, LinkStoreError>;
    async fn fetch(&mut self, hash: &str, key: &str) -> Result<Option<String>, LinkStoreError>;
    async fn exists(&mut self, hash: &str, key: &str) -> Result<bool, LinkStoreError>;
    async fn set(&mut self, hash: &str, key: &str, raw: String) -> Result<(), LinkStoreError>;
    async fn set_if_absent(
        &mut self,
        hash: &str,
        key: &str,
        raw: String,
    ) -> Result<bool, LinkStoreError>;
    async fn remove(&mut self, hash: &str, key: &str) -> Result<u64, LinkStoreError>;
}

impl LinkHash for bb8::PooledConnection<'_, RedisConnectionManager> {
    async fn all(&mut self, hash: &str) -> Result<HashMap<String, String>, LinkStoreError> {
        let entries: HashMap<String, String> = self.hgetall(hash).await?;
        Ok(entries)
    }

    async fn fetch(&mut self, hash: &str, key: &str) -> Result<Option<String>, LinkStoreError> {
        let raw: Option<String> = self.hget(hash, key).await?;
        Ok(raw)
    }

    async fn exists(&mut self, hash: &str, key: &str) -> Result<bool, LinkStoreError> {
        let exists: bool = self.hexists(hash, key).await?;
        Ok(exists)
    }

    async fn set(&mut self, hash: &str, key: &str, raw: String) -> Result<(), LinkStoreError> {
        let _: () = self.hset(hash, key, raw).await?;
        Ok(())
    }

    async fn set_if_absent(
        &mut self,
        hash: &str,
        key: &str,
        raw: String,
    ) -> Result<bool, LinkStoreError> {
        // HSETNX: the atomic claim that makes (domain, key) unique under
        // concurrent create/rename.
        let created: bool = self.hset_nx(hash, key, raw).await?;
        Ok(created)
    }

    async fn remove(&mut self, hash: &str, key: &str) -> Result<u64, LinkStoreError> {
        let removed: u64 = self.hdel(hash, key).await?;
        Ok(removed)
    }
}

fn domain_hash(domain: &str) -> String {
    format!("links:{}", domain)
}

fn decode(domain: &str, key: &str, raw: &str) -> Result<Link, LinkStoreError> {
    let record: LinkRecord = serde_json::from_str(raw)?;
    Ok(Link::from_record(domain, key, record))
}

async fn fetch_all<H: LinkHash>(conn: &mut H, domain: &str) -> Result<Vec<Link>, LinkStoreError> {
    let entries = conn.all(&domain_hash(domain)).await?;
    entries
        .iter()
        .map(|(key, raw)| decode(domain, key, raw))
        .collect()
}

async fn fetch_one<H: LinkHash>(
    conn: &mut H,
    domain: &str,
    key: &str,
) -> Result<Option<Link>, LinkStoreError> {
    let raw = conn.fetch(&domain_hash(domain), key).await?;
    raw.map(|raw| decode(domain, key, &raw)).transpose()
}

async fn add_link<H: LinkHash>(
    conn: &mut H,
    domain: &str,
    key: &str,
    record: LinkRecord,
) -> Result<Link, LinkStoreError> {
    let raw = serde_json::to_string(&record)?;
    if !conn.set_if_absent(&domain_hash(domain), key, raw).await? {
        return Err(LinkStoreError::Conflict);
    }
    Ok(Link::from_record(domain, key, record))
}

/// Edit a link, renaming it when `new_key` differs from `old_key`. The
/// rename claims the new field with a conditional set first, so a
/// concurrent writer targeting the same key loses with Conflict instead of
/// silently overwriting. A link edited to its own key is a plain overwrite,
/// never a conflict with itself.
async fn edit_link<H: LinkHash>(
    conn: &mut H,
    domain: &str,
    old_key: &str,
    new_key: &str,
    record: LinkRecord,
) -> Result<Link, LinkStoreError> {
    let hash = domain_hash(domain);

    if !conn.exists(&hash, old_key).await? {
        return Err(LinkStoreError::NotFound);
    }

    let raw = serde_json::to_string(&record)?;
    if old_key == new_key {
        conn.set(&hash, new_key, raw).await?;
    } else {
        if !conn.set_if_absent(&hash, new_key, raw).await? {
            return Err(LinkStoreError::Conflict);
        }
        conn.remove(&hash, old_key).await?;
    }

    Ok(Link::from_record(domain, new_key, record))
}

async fn delete_link<H: LinkHash>(
    conn: &mut H,
    domain: &str,
    key: &str,
) -> Result<u64, LinkStoreError> {
    conn.remove(&domain_hash(domain), key).await
}

/// Link persistence: one redis hash per domain (`links:{domain}`), field =
/// key, value = the JSON-encoded non-identity fields.
#[derive(Clone)]
pub struct LinkStore {
    pool: RedisPool,
}

impl LinkStore {
    pub fn new(pool: RedisPool) -> Self {
        Self { pool }
    }

    #[instrument(name = "Store: List links", skip(self))]
    pub async fn list(&self, domain: &str) -> Result<Vec<Link>, LinkStoreError> {
        let mut conn = self.pool.get().await?;
        fetch_all(&mut conn, domain).await
    }

    #[instrument(name = "Store: Get link", skip(self))]
    pub async fn get(&self, domain: &str, key: &str) -> Result<Option<Link>, LinkStoreError> {
        let mut conn = self.pool.get().await?;
        fetch_one(&mut conn, domain, key).await
    }

    #[instrument(name = "Store: Add link", skip(self, record))]
    pub async fn add(
        &self,
        domain: &str,
        key: &str,
        record: LinkRecord,
    ) -> Result<Link, LinkStoreError> {
        let mut conn = self.pool.get().await?;
        add_link(&mut conn, domain, key, record).await
    }

    #[instrument(name = "Store: Edit link", skip(self, record))]
    pub async fn edit(
        &self,
        domain: &str,
        old_key: &str,
        new_key: &str,
        record: LinkRecord,
    ) -> Result<Link, LinkStoreError> {
        let mut conn = self.pool.get().await?;
        edit_link(&mut conn, domain, old_key, new_key, record).await
    }

    /// Delete is idempotent: removing an absent key reports zero deletions
    /// rather than an error.
    #[instrument(name = "Store: Delete link", skip(self))]
    pub async fn delete(&self, domain: &str, key: &str) -> Result<u64, LinkStoreError> {
        let mut conn = self.pool.get().await?;
        delete_link(&mut conn, domain, key).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Hash-per-domain map with the same conditional-set semantics as the
    /// redis commands.
    #[derive(Default)]
    struct InMemoryHash {
        hashes: HashMap<String, HashMap<String, String>>,
    }

    impl LinkHash for InMemoryHash {
        async fn all(&mut self, hash: &str) -> Result<HashMap<String, String>, LinkStoreError> {
            Ok(self.hashes.get(hash).cloned().unwrap_or_default())
        }

        async fn fetch(
            &mut self,
            hash: &str,
            key: &str,
        ) -> Result<Option<String>, LinkStoreError> {
            Ok(self.hashes.get(hash).and_then(|h| h.get(key)).cloned())
        }

        async fn exists(&mut self, hash: &str, key: &str) -> Result<bool, LinkStoreError> {
            Ok(self.hashes.get(hash).is_some_and(|h| h.contains_key(key)))
        }

        async fn set(&mut self, hash: &str, key: &str, raw: String) -> Result<(), LinkStoreError> {
            self.hashes
                .entry(hash.to_string())
                .or_default()
                .insert(key.to_string(), raw);
            Ok(())
        }

        async fn set_if_absent(
            &mut self,
            hash: &str,
            key: &str,
            raw: String,
        ) -> Result<bool, LinkStoreError> {
            let fields = self.hashes.entry(hash.to_string()).or_default();
            if fields.contains_key(key) {
                return Ok(false);
            }
            fields.insert(key.to_string(), raw);
            Ok(true)
        }

        async fn remove(&mut self, hash: &str, key: &str) -> Result<u64, LinkStoreError> {
            let removed = self
                .hashes
                .get_mut(hash)
                .and_then(|h| h.remove(key))
                .is_some();
            Ok(removed as u64)
        }
    }

    fn record(url: &str) -> LinkRecord {
        LinkRecord {
            url: url.to_string(),
            title: None,
            description: None,
            image: None,
            timestamp: 1_700_000_000_000,
        }
    }

    #[tokio::test]
    async fn add_then_get_returns_the_stored_link() {
        let mut conn = InMemoryHash::default();
        add_link(&mut conn, "acme.sh", "abc", record("https://example.com"))
            .await
            .unwrap();

        let found = fetch_one(&mut conn, "acme.sh", "abc").await.unwrap().unwrap();
        assert_eq!(found.key, "abc");
        assert_eq!(found.url, "https://example.com");
    }

    #[tokio::test]
    async fn adding_a_taken_key_conflicts_and_leaves_the_record_unchanged() {
        let mut conn = InMemoryHash::default();
        add_link(&mut conn, "acme.sh", "abc", record("https://first.example"))
            .await
            .unwrap();

        let result = add_link(&mut conn, "acme.sh", "abc", record("https://second.example")).await;
        assert!(matches!(result, Err(LinkStoreError::Conflict)));

        let kept = fetch_one(&mut conn, "acme.sh", "abc").await.unwrap().unwrap();
        assert_eq!(kept.url, "https://first.example");
    }

    #[tokio::test]
    async fn the_same_key_is_free_under_another_domain() {
        let mut conn = InMemoryHash::default();
        add_link(&mut conn, "a.example", "abc", record("https://a.example/x"))
            .await
            .unwrap();
        add_link(&mut conn, "b.example", "abc", record("https://b.example/x"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn renaming_onto_another_links_key_conflicts_and_mutates_neither() {
        let mut conn = InMemoryHash::default();
        add_link(&mut conn, "acme.sh", "one", record("https://one.example"))
            .await
            .unwrap();
        add_link(&mut conn, "acme.sh", "two", record("https://two.example"))
            .await
            .unwrap();

        let result = edit_link(
            &mut conn,
            "acme.sh",
            "one",
            "two",
            record("https://clobber.example"),
        )
        .await;
        assert!(matches!(result, Err(LinkStoreError::Conflict)));

        let one = fetch_one(&mut conn, "acme.sh", "one").await.unwrap().unwrap();
        let two = fetch_one(&mut conn, "acme.sh", "two").await.unwrap().unwrap();
        assert_eq!(one.url, "https://one.example");
        assert_eq!(two.url, "https://two.example");
    }

    #[tokio::test]
    async fn editing_a_link_to_its_own_key_is_not_a_conflict() {
        let mut conn = InMemoryHash::default();
        add_link(&mut conn, "acme.sh", "abc", record("https://old.example"))
            .await
            .unwrap();

        let updated = edit_link(&mut conn, "acme.sh", "abc", "abc", record("https://new.example"))
            .await
            .unwrap();
        assert_eq!(updated.key, "abc");

        let found = fetch_one(&mut conn, "acme.sh", "abc").await.unwrap().unwrap();
        assert_eq!(found.url, "https://new.example");
    }

    #[tokio::test]
    async fn a_rename_moves_the_record_to_the_new_key() {
        let mut conn = InMemoryHash::default();
        add_link(&mut conn, "acme.sh", "old", record("https://example.com"))
            .await
            .unwrap();

        edit_link(&mut conn, "acme.sh", "old", "new", record("https://example.com"))
            .await
            .unwrap();

        assert!(fetch_one(&mut conn, "acme.sh", "old").await.unwrap().is_none());
        let moved = fetch_one(&mut conn, "acme.sh", "new").await.unwrap().unwrap();
        assert_eq!(moved.url, "https://example.com");
    }

    #[tokio::test]
    async fn editing_an_absent_key_is_not_found() {
        let mut conn = InMemoryHash::default();
        let result = edit_link(&mut conn, "acme.sh", "ghost", "ghost", record("https://x.example"))
            .await;
        assert!(matches!(result, Err(LinkStoreError::NotFound)));
    }

    #[tokio::test]
    async fn deleting_an_absent_key_reports_zero_removals() {
        let mut conn = InMemoryHash::default();
        assert_eq!(delete_link(&mut conn, "acme.sh", "ghost").await.unwrap(), 0);

        add_link(&mut conn, "acme.sh", "abc", record("https://example.com"))
            .await
            .unwrap();
        assert_eq!(delete_link(&mut conn, "acme.sh", "abc").await.unwrap(), 1);
        assert!(fetch_one(&mut conn, "acme.sh", "abc").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn listing_decodes_every_field_under_the_domain() {
        let mut conn = InMemoryHash::default();
        add_link(&mut conn, "acme.sh", "one", record("https://one.example"))
            .await
            .unwrap();
        add_link(&mut conn, "acme.sh", "two", record("https://two.example"))
            .await
            .unwrap();

        let mut keys: Vec<String> = fetch_all(&mut conn, "acme.sh")
            .await
            .unwrap()
            .into_iter()
            .map(|link| link.key)
            .collect();
        keys.sort();
        assert_eq!(keys, ["one", "two"]);
    }

    #[test]
    fn decode_attaches_the_identity_fields() {
        let raw = r#"{"url":"https://example.com","title":"Example","timestamp":1700000000000}"#;
        let link = decode("short.example", "abc", raw).unwrap();
        assert_eq!(link.domain, "short.example");
        assert_eq!(link.key, "abc");
        assert_eq!(link.url, "https://example.com");
        assert_eq!(link.title.as_deref(), Some("Example"));
        assert_eq!(link.description, None);
        assert_eq!(link.timestamp, 1_700_000_000_000);
    }

    #[test]
    fn decode_rejects_corrupt_records() {
        assert!(matches!(
            decode("short.example", "abc", "not json"),
            Err(LinkStoreError::Codec(_))
        ));
    }

    #[test]
    fn domains_get_disjoint_hashes() {
        assert_ne!(domain_hash("a.example"), domain_hash("b.example"));
        assert_eq!(domain_hash("a.example"), "links:a.example");
    }
}
