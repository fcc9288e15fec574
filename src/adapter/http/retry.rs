//! Control Request Retry Logic
//!
//! コントロールリクエストの指数バックオフリトライ

use async_trait::async_trait;
use log::warn;
use std::collections::BTreeMap;
use std::time::Duration;

use crate::domain::errors::TransportError;
use crate::domain::repositories::transport::{
    ControlRequest, ControlResponse, FilePayload, PlatformTransport, StorageResponse,
};

pub const MAX_RETRIES: u32 = 5;
pub const INITIAL_RETRY_DELAY_MS: u64 = 1000; // 1 second
pub const MAX_RETRY_DELAY_MS: u64 = 32000; // 32 seconds max

/// Retry policy for control requests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: MAX_RETRIES,
            initial_delay_ms: INITIAL_RETRY_DELAY_MS,
            max_delay_ms: MAX_RETRY_DELAY_MS,
        }
    }
}

impl RetryPolicy {
    /// Policy that never retries
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Calculate retry delay with exponential backoff
    ///
    /// `retry_count` starts at 1 for the first retry.
    pub fn calculate_retry_delay(&self, retry_count: u32) -> u64 {
        let shift = retry_count.saturating_sub(1).min(31);
        std::cmp::min(
            self.initial_delay_ms.saturating_mul(1u64 << shift),
            self.max_delay_ms,
        )
    }
}

/// Transport decorator that retries retryable control request failures
///
/// Uploads to presigned URLs pass straight through and are never retried.
pub struct RetryingTransport<T> {
    inner: T,
    policy: RetryPolicy,
}

impl<T: PlatformTransport> RetryingTransport<T> {
    pub fn new(inner: T, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait]
impl<T: PlatformTransport> PlatformTransport for RetryingTransport<T> {
    async fn send_control_request(
        &self,
        request: &ControlRequest,
    ) -> Result<ControlResponse, TransportError> {
        let mut retry_count = 0;
        loop {
            match self.inner.send_control_request(request).await {
                Ok(response) => return Ok(response),
                Err(e) if e.is_retryable() && retry_count < self.policy.max_retries => {
                    retry_count += 1;
                    let delay = self.policy.calculate_retry_delay(retry_count);
                    warn!(
                        "{} {} failed ({}), retrying in {}ms (attempt {}/{})",
                        request.method,
                        request.path,
                        e,
                        delay,
                        retry_count,
                        self.policy.max_retries
                    );
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn send_upload_request(
        &self,
        url: &str,
        form_fields: &BTreeMap<String, String>,
        file: FilePayload,
    ) -> Result<StorageResponse, TransportError> {
        self.inner.send_upload_request(url, form_fields, file).await
    }
}
