//! HTTP Integration
//!
//! プラットフォームへのHTTPトランスポートとリトライ

pub mod client;
pub mod retry;

pub use client::{HttpTimeouts, HttpTransport};
pub use retry::{RetryPolicy, RetryingTransport};
