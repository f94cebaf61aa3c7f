//! Transports perform the actual byte fetch for a resolved target.

use async_trait::async_trait;
use bridge_traits::http::{HttpClient, HttpRequest, RetryPolicy};
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::descriptor::{Target, TargetArgs};
use crate::error::{RequestError, Result};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

/// Fetches the bytes behind a target.
///
/// Implementations may block or wait inside `fetch`; the dispatcher always
/// runs it on a spawned task.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn fetch(&self, target: &Target, args: &TargetArgs) -> Result<Bytes>;

    /// Short name for logs.
    fn name(&self) -> &'static str;
}

/// Fetches over the network through the host's `HttpClient`.
pub struct LiveTransport {
    http_client: Arc<dyn HttpClient>,
    retry_policy: RetryPolicy,
}

impl LiveTransport {
    pub fn new(http_client: Arc<dyn HttpClient>) -> Self {
        Self {
            http_client,
            retry_policy: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }
}

#[async_trait]
impl Transport for LiveTransport {
    async fn fetch(&self, target: &Target, args: &TargetArgs) -> Result<Bytes> {
        let mut request = HttpRequest::get(target.url()).timeout(REQUEST_TIMEOUT);
        if matches!(args, TargetArgs::Listing { .. }) {
            request = request.accept("application/json");
        }

        debug!(resource = %target, "Fetching over network");
        let response = self
            .http_client
            .execute_with_retry(request, self.retry_policy.clone())
            .await?;

        if response.is_not_found() {
            return Err(RequestError::NotFound(target.redacted()));
        }

        if !response.is_success() {
            warn!(resource = %target, status = response.status, "Fetch returned error status");
            return Err(RequestError::HttpStatus {
                status: response.status,
                target: target.redacted(),
            });
        }

        Ok(response.body)
    }

    fn name(&self) -> &'static str {
        "live"
    }
}
