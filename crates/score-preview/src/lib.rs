//! ScorePreview: discover preview pages for catalog items and assemble them into PDFs.

pub mod assembler;
pub mod cache;
pub mod discovery;
pub mod geometry;
pub mod origin;
pub mod pdf;
pub mod retry;
pub mod types;

pub use assembler::{prepare_image, DocumentAssembler};
pub use cache::{PreviewCache, Retention};
pub use discovery::{DiscoveryConfig, SequenceDiscoverer, DEFAULT_CONCURRENCY, MAX_CONCURRENCY};
pub use geometry::{crop_to_fill, PageSize, Placement};
pub use origin::{HttpOrigin, Origin, DEFAULT_ORIGIN};
pub use pdf::{EmbeddedImage, PdfStreamWriter};
pub use retry::{retry_transient, RetryPolicy, DEFAULT_RETRY_DELAY};
pub use types::*;
