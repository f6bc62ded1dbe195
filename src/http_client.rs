use reqwest::Client;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;

use crate::endpoint::{EndpointDescriptor, RequestContext};
use crate::error::{NetworkError, Result};
use crate::interceptor::{Interceptor, RetryDecision};

/// Transport settings for [`RequestExecutor`]
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    pub max_connections: usize,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    /// Hard cap on physical sends per logical request
    pub max_attempts: u32,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_connections: 20,
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            max_attempts: 3,
        }
    }
}

/// Drives one request through adapt, send and retry across the interceptor
/// chain, and decodes the result
pub struct RequestExecutor {
    /// Shared HTTP client with connection pooling
    client: Client,

    /// Interceptors in chain order
    interceptors: Vec<Arc<dyn Interceptor>>,

    max_attempts: u32,
}

impl RequestExecutor {
    /// Create an executor with its own pooled client
    pub fn new(config: &ExecutorConfig, interceptors: Vec<Arc<dyn Interceptor>>) -> Result<Self> {
        let client = Client::builder()
            .pool_max_idle_per_host(config.max_connections)
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| NetworkError::Unknown(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self::with_client(client, config.max_attempts, interceptors))
    }

    /// Create an executor around an existing client
    pub fn with_client(client: Client, max_attempts: u32, interceptors: Vec<Arc<dyn Interceptor>>) -> Self {
        Self {
            client,
            interceptors,
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn interceptors(&self) -> &[Arc<dyn Interceptor>] {
        &self.interceptors
    }

    /// Execute `target` and decode a JSON response body into `T`.
    /// An empty 2xx body decodes as JSON `null`.
    pub async fn request<T: DeserializeOwned>(&self, target: EndpointDescriptor) -> Result<T> {
        let bytes = self.request_bytes(target).await?;
        decode(&bytes)
    }

    /// Execute `target` and return the raw 2xx body
    pub async fn request_bytes(&self, target: EndpointDescriptor) -> Result<Vec<u8>> {
        // Build failures surface before any network I/O
        let mut context = RequestContext::from_target(target)?;

        for interceptor in &self.interceptors {
            context = interceptor.adapt(context).await?;
        }

        let mut attempt_count = 1;
        loop {
            let error = match self.send_once(&context, attempt_count).await {
                Ok(body) => return Ok(body),
                Err(e) => e,
            };

            if attempt_count >= self.max_attempts {
                tracing::warn!(
                    request_id = %context.request_id,
                    attempts = attempt_count,
                    "Giving up after maximum attempts"
                );
                return Err(error);
            }

            match self.vote(&context, &error, attempt_count).await {
                RetryDecision::Retry(request) => {
                    context = context.with_request(request);
                    attempt_count += 1;
                }
                RetryDecision::DoNotRetry => return Err(error),
            }
        }
    }

    /// Offer the failure to each interceptor in order; the first retry wins
    async fn vote(&self, context: &RequestContext, error: &NetworkError, attempt_count: u32) -> RetryDecision {
        // Contract mismatches are not transient
        if matches!(error, NetworkError::Decoding(_)) {
            return RetryDecision::DoNotRetry;
        }

        for interceptor in &self.interceptors {
            if let RetryDecision::Retry(request) = interceptor.retry(context, error, attempt_count).await {
                tracing::debug!(
                    request_id = %context.request_id,
                    interceptor = interceptor.name(),
                    attempt = attempt_count,
                    "Interceptor requested retry"
                );
                return RetryDecision::Retry(request);
            }
        }

        RetryDecision::DoNotRetry
    }

    /// One physical send with its lifecycle notifications
    async fn send_once(&self, context: &RequestContext, attempt_count: u32) -> Result<Vec<u8>> {
        let request = context
            .clone_request()
            .ok_or_else(|| NetworkError::Encoding("Request body is not cloneable".to_string()))?;

        for interceptor in &self.interceptors {
            interceptor.did_create_task(context, attempt_count);
        }

        let result = self.exchange(context, request).await;

        let outcome = result.as_ref().map(|(status, _)| *status);
        for interceptor in &self.interceptors {
            interceptor.did_complete(context, outcome);
        }

        result.map(|(_, body)| body)
    }

    async fn exchange(&self, context: &RequestContext, request: reqwest::Request) -> Result<(u16, Vec<u8>)> {
        let response = self
            .client
            .execute(request)
            .await
            .map_err(|e| NetworkError::from_transport(&e))?;

        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| NetworkError::InvalidResponse(e.to_string()))?;

        for interceptor in &self.interceptors {
            interceptor.did_receive_data(context, &body);
        }

        if (200..300).contains(&status) {
            Ok((status, body.to_vec()))
        } else {
            let text = String::from_utf8_lossy(&body).into_owned();
            Err(NetworkError::from_status(status, text))
        }
    }
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    let bytes: &[u8] = if bytes.iter().all(u8::is_ascii_whitespace) {
        b"null"
    } else {
        bytes
    };
    serde_json::from_slice(bytes).map_err(|e| NetworkError::Decoding(e.to_string()))
}
