//! ScorePreview HTTP server library.

pub mod config;
pub mod housekeeping;
pub mod service;
pub mod transport;
pub mod types;

pub use config::{ClearSchedule, ServerConfig};
pub use service::PreviewService;
pub use transport::{router, serve};
