//! HTTP transport.

pub mod http;
pub mod stream;

pub use http::{router, serve};
