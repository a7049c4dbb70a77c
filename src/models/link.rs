use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// A short link: `key` resolves to `url` under a project's `domain`.
/// `(domain, key)` is the identity; the domain is assigned by the
/// authorization gate and never taken from a request body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub domain: String,
    pub key: String,
    pub url: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub image: Option<String>,
    /// Last-modified marker, milliseconds since the epoch.
    pub timestamp: i64,
}

/// The non-identity fields of a link as persisted in the store. Domain and
/// key live in the redis key and hash field, not in the value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkRecord {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    pub timestamp: i64,
}

/// Optional display metadata supplied at creation time.
#[derive(Debug, Clone, Default)]
pub struct LinkMetadata {
    pub title: Option<String>,
    pub description: Option<String>,
    pub image: Option<String>,
}

impl Link {
    pub fn from_record(domain: &str, key: &str, record: LinkRecord) -> Self {
        Self {
            domain: domain.to_string(),
            key: key.to_string(),
            url: record.url,
            title: record.title,
            description: record.description,
            image: record.image,
            timestamp: record.timestamp,
        }
    }
}

static KEY_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:[\p{L}\p{M}-]+|:index)$").expect("invalid key pattern"));

/// Whether `key` is an acceptable short-link slug: one or more Unicode
/// letters, combining marks, or hyphens, or the literal `:index` placeholder
/// for the domain root.
pub fn valid_key(key: &str) -> bool {
    KEY_PATTERN.is_match(key)
}
