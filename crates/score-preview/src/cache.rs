//! In-memory preview cache keyed by item identifier.
//!
//! One entry per identifier, no TTL. Entries leave the cache through
//! [`PreviewCache::invalidate`], [`PreviewCache::clear_all`] (explicit or
//! scheduled), or after a download when [`Retention::SingleUse`] is in force.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::types::{PreviewEntry, PreviewError};

/// What happens to a cache entry after a document has been built from it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Retention {
    /// Keep the entry until an explicit or scheduled clear.
    #[default]
    Reuse,
    /// Drop the entry once a document has been assembled from it.
    SingleUse,
}

impl Retention {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Reuse => "reuse",
            Self::SingleUse => "single-use",
        }
    }
}

impl fmt::Display for Retention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Retention {
    type Err = PreviewError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reuse" | "keep" => Ok(Self::Reuse),
            "single-use" | "single_use" | "once" => Ok(Self::SingleUse),
            other => Err(PreviewError::InvalidInput(format!(
                "unknown retention policy: {other}"
            ))),
        }
    }
}

/// Keyed store of discovered previews.
///
/// Entries are shared as `Arc` so a document can be streamed from an entry
/// while the cache is cleared underneath it.
#[derive(Debug, Default)]
pub struct PreviewCache {
    entries: RwLock<HashMap<String, Arc<PreviewEntry>>>,
}

impl PreviewCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, identifier: &str) -> Option<Arc<PreviewEntry>> {
        self.entries.read().await.get(identifier).cloned()
    }

    /// Store `entry` under `identifier`, replacing any previous entry.
    pub async fn put(&self, identifier: &str, entry: PreviewEntry) -> Arc<PreviewEntry> {
        let entry = Arc::new(entry);
        self.entries
            .write()
            .await
            .insert(identifier.to_string(), Arc::clone(&entry));
        entry
    }

    /// Remove one entry. Returns whether it was present.
    pub async fn invalidate(&self, identifier: &str) -> bool {
        self.entries.write().await.remove(identifier).is_some()
    }

    /// Remove and return one entry.
    pub async fn take(&self, identifier: &str) -> Option<Arc<PreviewEntry>> {
        self.entries.write().await.remove(identifier)
    }

    /// Remove every entry. Returns how many were removed.
    pub async fn clear_all(&self) -> usize {
        let mut entries = self.entries.write().await;
        let n = entries.len();
        entries.clear();
        n
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Cached identifiers, sorted.
    pub async fn identifiers(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.entries.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PreviewPage;

    fn entry(id: &str, title: &str) -> PreviewEntry {
        PreviewEntry {
            identifier: id.to_string(),
            title: title.to_string(),
            pages: vec![PreviewPage {
                source_url: format!("mem://{id}/0"),
                bytes: vec![0xFF, 0xD8],
            }],
        }
    }

    #[tokio::test]
    async fn test_put_get() {
        let cache = PreviewCache::new();
        assert!(cache.get("M1").await.is_none());
        cache.put("M1", entry("M1", "One")).await;
        let got = cache.get("M1").await.unwrap();
        assert_eq!(got.title, "One");
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_put_overwrites() {
        let cache = PreviewCache::new();
        cache.put("M1", entry("M1", "Old")).await;
        cache.put("M1", entry("M1", "New")).await;
        assert_eq!(cache.get("M1").await.unwrap().title, "New");
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_invalidate_one() {
        let cache = PreviewCache::new();
        cache.put("M1", entry("M1", "")).await;
        cache.put("M2", entry("M2", "")).await;
        assert!(cache.invalidate("M1").await);
        assert!(!cache.invalidate("M1").await);
        assert_eq!(cache.identifiers().await, vec!["M2".to_string()]);
    }

    #[tokio::test]
    async fn test_clear_all_counts() {
        let cache = PreviewCache::new();
        cache.put("M1", entry("M1", "")).await;
        cache.put("M2", entry("M2", "")).await;
        assert_eq!(cache.clear_all().await, 2);
        assert!(cache.is_empty().await);
        assert_eq!(cache.clear_all().await, 0);
    }

    #[tokio::test]
    async fn test_entry_outlives_clear() {
        let cache = PreviewCache::new();
        cache.put("M1", entry("M1", "Held")).await;
        let held = cache.get("M1").await.unwrap();
        cache.clear_all().await;
        assert_eq!(held.title, "Held");
    }

    #[tokio::test]
    async fn test_take_removes() {
        let cache = PreviewCache::new();
        cache.put("M1", entry("M1", "")).await;
        assert!(cache.take("M1").await.is_some());
        assert!(cache.get("M1").await.is_none());
    }

    #[test]
    fn test_retention_parse() {
        assert_eq!("reuse".parse::<Retention>().unwrap(), Retention::Reuse);
        assert_eq!(
            "Single-Use".parse::<Retention>().unwrap(),
            Retention::SingleUse
        );
        assert!("forever".parse::<Retention>().is_err());
        assert_eq!(Retention::default(), Retention::Reuse);
        assert_eq!(Retention::SingleUse.to_string(), "single-use");
    }
}
