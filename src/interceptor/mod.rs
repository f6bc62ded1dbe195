// Request interceptors
// Cross-cutting observers that can rewrite a request before it is sent and
// vote on retrying it after it fails

mod auth;
mod logging;
mod metrics;

use async_trait::async_trait;
use reqwest::Request;

use crate::endpoint::RequestContext;
use crate::error::{NetworkError, Result};

pub use auth::AuthInterceptor;
pub use logging::LoggingInterceptor;
pub use metrics::{FeatureSnapshot, MetricsInterceptor};

/// Outcome of a retry vote
#[derive(Debug)]
pub enum RetryDecision {
    DoNotRetry,
    /// Resend using this rewritten request
    Retry(Request),
}

impl RetryDecision {
    pub fn is_retry(&self) -> bool {
        matches!(self, RetryDecision::Retry(_))
    }
}

/// One link of the interceptor chain.
///
/// Every method has a pass-through default so an interceptor only implements
/// the hooks it cares about. `adapt` must be safe to run again on an already
/// adapted context.
#[async_trait]
pub trait Interceptor: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &'static str;

    /// Rewrite the request before it is first sent
    async fn adapt(&self, context: RequestContext) -> Result<RequestContext> {
        Ok(context)
    }

    /// Decide whether a failed send should be repeated. `attempt_count` is 1
    /// for the original send and grows by one per resend.
    async fn retry(
        &self,
        _context: &RequestContext,
        _error: &NetworkError,
        _attempt_count: u32,
    ) -> RetryDecision {
        RetryDecision::DoNotRetry
    }

    /// A physical send is about to start
    fn did_create_task(&self, _context: &RequestContext, _attempt_count: u32) {}

    /// Response bytes arrived (observe only)
    fn did_receive_data(&self, _context: &RequestContext, _data: &[u8]) {}

    /// A physical send finished, with the HTTP status on success
    fn did_complete(&self, _context: &RequestContext, _outcome: std::result::Result<u16, &NetworkError>) {}
}
