//! Core data types for preview entries, fetch outcomes, and errors.

use serde::{Deserialize, Serialize};

/// One discovered preview image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewPage {
    pub source_url: String,
    pub bytes: Vec<u8>,
}

/// Everything discovered for one catalog item.
///
/// `pages` is contiguous from index 0; position in the vector is the page
/// number at the origin and the page order in generated documents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewEntry {
    pub identifier: String,
    pub title: String,
    pub pages: Vec<PreviewPage>,
}

impl PreviewEntry {
    /// Number of cached pages.
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Source URLs in page order.
    pub fn urls(&self) -> Vec<String> {
        self.pages.iter().map(|p| p.source_url.clone()).collect()
    }

    /// Map selected page indices to image buffers, skipping indices that
    /// have no cached page.
    pub fn select(&self, indices: &[usize]) -> Vec<&[u8]> {
        indices
            .iter()
            .filter_map(|&i| self.pages.get(i))
            .map(|p| p.bytes.as_slice())
            .collect()
    }
}

/// Result of asking the origin for one resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageOutcome {
    /// 2xx response with a body.
    Found { bytes: Vec<u8>, url: String },
    /// Any non-2xx response. Ends a discovery run.
    Missing,
    /// Network-level failure; the only outcome eligible for retry.
    Transient(String),
}

impl PageOutcome {
    pub fn is_found(&self) -> bool {
        matches!(self, PageOutcome::Found { .. })
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, PageOutcome::Transient(_))
    }
}

/// Per-page discovery bookkeeping. Lives only for the duration of a run.
#[derive(Debug, Clone)]
pub struct DiscoveryAttempt {
    pub index: usize,
    pub attempts: u32,
    pub outcome: PageOutcome,
}

/// Summary of one assembled document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssemblyReport {
    pub pages_written: usize,
    pub pages_skipped: usize,
}

/// Errors that can occur in the preview library.
#[derive(thiserror::Error, Debug)]
pub enum PreviewError {
    #[error("No preview pages found for {0}")]
    NotFound(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("PDF error: {0}")]
    Pdf(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Convenience result type.
pub type PreviewResult<T> = Result<T, PreviewError>;
