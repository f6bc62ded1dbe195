use async_trait::async_trait;

use super::Interceptor;
use crate::endpoint::RequestContext;
use crate::error::NetworkError;

/// Logs every physical send of every request
#[derive(Debug, Default)]
pub struct LoggingInterceptor;

impl LoggingInterceptor {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Interceptor for LoggingInterceptor {
    fn name(&self) -> &'static str {
        "logging"
    }

    fn did_create_task(&self, context: &RequestContext, attempt_count: u32) {
        tracing::debug!(
            request_id = %context.request_id,
            feature = %context.target.feature,
            method = %context.request.method(),
            url = %context.request.url(),
            attempt = attempt_count,
            "Sending HTTP request"
        );
    }

    fn did_receive_data(&self, context: &RequestContext, data: &[u8]) {
        tracing::trace!(
            request_id = %context.request_id,
            bytes = data.len(),
            "Received response body"
        );
    }

    fn did_complete(&self, context: &RequestContext, outcome: Result<u16, &NetworkError>) {
        match outcome {
            Ok(status) => tracing::debug!(
                request_id = %context.request_id,
                feature = %context.target.feature,
                status = status,
                "Request successful"
            ),
            Err(e) => tracing::warn!(
                request_id = %context.request_id,
                feature = %context.target.feature,
                status = e.status(),
                error = %e,
                "HTTP request failed"
            ),
        }
    }
}
