//! JSON response bodies.

use serde::{Deserialize, Serialize};

/// `GET /api/preview/{identifier}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewResponse {
    pub images: Vec<String>,
    pub title: String,
}

/// `POST /api/clear-cache`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClearedResponse {
    pub cleared: usize,
}

/// `DELETE /api/preview/{identifier}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemovedResponse {
    pub removed: bool,
}

/// `GET /health`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub cached_items: usize,
}
