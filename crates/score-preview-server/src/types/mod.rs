//! Request, response and error types for the HTTP API.

pub mod error;
pub mod request;
pub mod response;

pub use error::{ApiError, ApiResult};
pub use request::{validate_identifier, DocumentSource, MakePdfRequest, MAX_DOCUMENT_URLS};
pub use response::*;
