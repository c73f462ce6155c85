//! Preview service: cache-first discovery plus document sourcing.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use score_preview::{
    retry_transient, DiscoveryConfig, HttpOrigin, Origin, PageOutcome, PreviewCache,
    PreviewEntry, PreviewError, PreviewResult, Retention, SequenceDiscoverer, MAX_CONCURRENCY,
};

use crate::config::ServerConfig;

/// Owns the cache, the discoverer and the retention policy.
pub struct PreviewService {
    cache: Arc<PreviewCache>,
    origin: Arc<dyn Origin>,
    discoverer: SequenceDiscoverer,
    retention: Retention,
}

impl PreviewService {
    pub fn new(
        origin: Arc<dyn Origin>,
        cache: Arc<PreviewCache>,
        discovery: DiscoveryConfig,
        retention: Retention,
    ) -> Self {
        Self {
            discoverer: SequenceDiscoverer::new(origin.clone(), discovery),
            cache,
            origin,
            retention,
        }
    }

    /// Build a service talking to the configured HTTP origin.
    pub fn from_config(config: &ServerConfig, cache: Arc<PreviewCache>) -> PreviewResult<Self> {
        let origin = HttpOrigin::new(&config.origin, config.fetch_timeout)?;
        Ok(Self::new(
            Arc::new(origin),
            cache,
            config.discovery,
            config.retention,
        ))
    }

    pub fn cache(&self) -> &Arc<PreviewCache> {
        &self.cache
    }

    pub fn retention(&self) -> Retention {
        self.retention
    }

    /// Cached entry for `identifier`, discovering and caching it on a miss.
    ///
    /// Concurrent misses for the same identifier each run discovery; the last
    /// one to finish wins the cache slot.
    pub async fn preview(&self, identifier: &str) -> PreviewResult<Arc<PreviewEntry>> {
        if let Some(entry) = self.cache.get(identifier).await {
            info!("Serving {identifier} from cache");
            return Ok(entry);
        }

        let entry = self.discoverer.discover(identifier).await?;
        Ok(self.cache.put(identifier, entry).await)
    }

    /// The cached entry a document for `identifier` would be built from.
    pub async fn document_for(&self, identifier: &str) -> Option<Arc<PreviewEntry>> {
        self.cache.get(identifier).await
    }

    /// Apply the retention policy after a document was built for `identifier`.
    pub async fn finish_document(&self, identifier: &str) {
        if self.retention == Retention::SingleUse && self.cache.invalidate(identifier).await {
            debug!("Dropped {identifier} from cache after download");
        }
    }

    /// Whether `url` points into the configured preview origin.
    pub fn is_origin_url(&self, url: &str) -> bool {
        let base = self.origin.base_url().trim_end_matches('/');
        url.strip_prefix(base)
            .is_some_and(|rest| rest.starts_with('/'))
    }

    /// Fetch each URL under the retry policy, in order. URLs that cannot be
    /// fetched are left out.
    ///
    /// Every URL must live under the preview origin; otherwise nothing is
    /// fetched and [`PreviewError::InvalidInput`] is returned.
    pub async fn document_from_urls(&self, urls: &[String]) -> PreviewResult<Vec<Vec<u8>>> {
        if let Some(foreign) = urls.iter().find(|url| !self.is_origin_url(url)) {
            return Err(PreviewError::InvalidInput(format!(
                "image URL is not on the preview origin: {foreign}"
            )));
        }

        let config = *self.discoverer.config();
        let width = config.concurrency.clamp(1, MAX_CONCURRENCY);

        let buffers = stream::iter(urls.iter().cloned())
            .map(|url| async move {
                let (outcome, attempts) =
                    retry_transient(&config.retry, || self.origin.fetch_url(&url)).await;
                match outcome {
                    PageOutcome::Found { bytes, .. } => Some(bytes),
                    PageOutcome::Missing => {
                        warn!("Skipping {url}: not found");
                        None
                    }
                    PageOutcome::Transient(cause) => {
                        warn!("Skipping {url} after {attempts} attempt(s): {cause}");
                        None
                    }
                }
            })
            .buffered(width)
            .filter_map(|bytes| async move { bytes })
            .collect()
            .await;

        Ok(buffers)
    }

    pub async fn invalidate(&self, identifier: &str) -> bool {
        self.cache.invalidate(identifier).await
    }

    pub async fn clear_all(&self) -> usize {
        let removed = self.cache.clear_all().await;
        info!("Cache cleared ({removed} entries)");
        removed
    }
}
