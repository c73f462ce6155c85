//! Sequence discovery: find the contiguous run of preview pages an item has.
//!
//! Pages are requested in fixed-width batches. Every page in a batch is
//! fetched concurrently; results are then scanned in index order and the
//! first page that is not found ends the run, even if later pages in the same
//! batch came back successfully.

use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, info};

use crate::origin::Origin;
use crate::retry::{retry_transient, RetryPolicy};
use crate::types::{
    DiscoveryAttempt, PageOutcome, PreviewEntry, PreviewError, PreviewPage, PreviewResult,
};

/// Default batch width.
pub const DEFAULT_CONCURRENCY: usize = 5;

/// Widest batch ever issued against the origin.
pub const MAX_CONCURRENCY: usize = 32;

/// Tuning for a discovery run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscoveryConfig {
    /// Pages fetched concurrently per batch, clamped to `1..=MAX_CONCURRENCY`.
    pub concurrency: usize,
    pub retry: RetryPolicy,
    /// Optional hard cap on the number of pages accepted.
    pub max_pages: Option<usize>,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            retry: RetryPolicy::default(),
            max_pages: None,
        }
    }
}

/// Drives an [`Origin`] to discover every preview page for an identifier.
#[derive(Clone)]
pub struct SequenceDiscoverer {
    origin: Arc<dyn Origin>,
    config: DiscoveryConfig,
}

impl SequenceDiscoverer {
    pub fn new(origin: Arc<dyn Origin>, config: DiscoveryConfig) -> Self {
        Self { origin, config }
    }

    pub fn config(&self) -> &DiscoveryConfig {
        &self.config
    }

    /// Discover title and pages for `identifier`.
    ///
    /// The title is fetched alongside the images and never affects the
    /// outcome. Returns [`PreviewError::NotFound`] when page 0 is missing.
    pub async fn discover(&self, identifier: &str) -> PreviewResult<PreviewEntry> {
        let (title, pages) = tokio::join!(
            self.origin.fetch_title(identifier),
            self.discover_pages(identifier)
        );

        if pages.is_empty() {
            return Err(PreviewError::NotFound(identifier.to_string()));
        }

        info!("Discovered {} page(s) for {identifier}", pages.len());
        Ok(PreviewEntry {
            identifier: identifier.to_string(),
            title,
            pages,
        })
    }

    /// The maximal run of pages `[0, N)` the origin serves.
    pub async fn discover_pages(&self, identifier: &str) -> Vec<PreviewPage> {
        let width = self.config.concurrency.clamp(1, MAX_CONCURRENCY);
        let mut pages = Vec::new();
        let mut start = 0usize;

        loop {
            let end = match self.config.max_pages {
                Some(limit) => start.saturating_add(width).min(limit),
                None => start.saturating_add(width),
            };
            if start >= end {
                break;
            }

            let fetches = (start..end).map(|index| self.fetch_page(identifier, index));
            let batch = join_all(fetches).await;

            let mut complete = true;
            for attempt in batch {
                match attempt.outcome {
                    PageOutcome::Found { bytes, url } => pages.push(PreviewPage {
                        source_url: url,
                        bytes,
                    }),
                    _ => {
                        debug!(
                            "Sequence for {identifier} ends at page {} ({} attempt(s))",
                            attempt.index, attempt.attempts
                        );
                        complete = false;
                        break;
                    }
                }
            }

            if !complete {
                break;
            }
            start = end;
        }

        pages
    }

    /// Fetch one page under the retry policy. A transient failure that
    /// survives every attempt is reported as missing.
    async fn fetch_page(&self, identifier: &str, index: usize) -> DiscoveryAttempt {
        let (outcome, attempts) = retry_transient(&self.config.retry, move || {
            self.origin.fetch_image(identifier, index)
        })
        .await;

        let outcome = match outcome {
            PageOutcome::Transient(cause) => {
                debug!(
                    "Page {index} of {identifier} gave up after {attempts} attempt(s): {cause}"
                );
                PageOutcome::Missing
            }
            other => other,
        };

        DiscoveryAttempt {
            index,
            attempts,
            outcome,
        }
    }
}
