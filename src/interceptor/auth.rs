use async_trait::async_trait;
use reqwest::header::{HeaderValue, AUTHORIZATION};
use reqwest::Request;
use std::sync::Arc;

use super::{Interceptor, RetryDecision};
use crate::auth::{RefreshClient, TokenManager, REFRESH_FEATURE};
use crate::endpoint::{EndpointDescriptor, RequestContext};
use crate::error::{NetworkError, Result};

/// Only the original send may trigger a refresh
const REFRESH_ATTEMPT: u32 = 1;

/// Where a request stands with respect to authentication
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AuthState {
    NotAuthenticated,
    Authenticated,
    RefreshPending,
    Failed,
}

impl AuthState {
    fn as_str(self) -> &'static str {
        match self {
            AuthState::NotAuthenticated => "not_authenticated",
            AuthState::Authenticated => "authenticated",
            AuthState::RefreshPending => "refresh_pending",
            AuthState::Failed => "failed",
        }
    }
}

fn set_bearer(request: &mut Request, token: &str) -> Result<()> {
    let value = HeaderValue::from_str(&format!("Bearer {}", token))
        .map_err(|e| NetworkError::Encoding(format!("authorization header: {}", e)))?;
    // insert replaces, so re-adapting never stacks headers
    request.headers_mut().insert(AUTHORIZATION, value);
    Ok(())
}

/// Bearer-token injection plus one refresh-and-retry on a 401
pub struct AuthInterceptor {
    tokens: Arc<TokenManager>,
    refresh: RefreshClient,
    refresh_path: String,
}

impl AuthInterceptor {
    pub fn new(tokens: Arc<TokenManager>, refresh: RefreshClient, refresh_path: impl Into<String>) -> Self {
        Self {
            tokens,
            refresh,
            refresh_path: refresh_path.into(),
        }
    }

    /// Matched by feature tag or by the configured path
    fn is_refresh_endpoint(&self, target: &EndpointDescriptor) -> bool {
        target.feature == REFRESH_FEATURE
            || target.path.trim_end_matches('/') == self.refresh_path.trim_end_matches('/')
    }
}

#[async_trait]
impl Interceptor for AuthInterceptor {
    fn name(&self) -> &'static str {
        "auth"
    }

    async fn adapt(&self, mut context: RequestContext) -> Result<RequestContext> {
        if !context.target.requires_auth {
            return Ok(context);
        }

        match self.tokens.access_token().await {
            Some(token) => {
                set_bearer(&mut context.request, &token)?;
                tracing::trace!(
                    request_id = %context.request_id,
                    state = AuthState::Authenticated.as_str(),
                    "Attached bearer token"
                );
            }
            None => {
                tracing::debug!(
                    request_id = %context.request_id,
                    state = AuthState::NotAuthenticated.as_str(),
                    "No access token cached, sending without credentials"
                );
            }
        }

        Ok(context)
    }

    async fn retry(
        &self,
        context: &RequestContext,
        error: &NetworkError,
        attempt_count: u32,
    ) -> RetryDecision {
        if !error.is_authorization()
            || attempt_count != REFRESH_ATTEMPT
            || self.is_refresh_endpoint(&context.target)
        {
            return RetryDecision::DoNotRetry;
        }

        tracing::info!(
            request_id = %context.request_id,
            feature = %context.target.feature,
            state = AuthState::RefreshPending.as_str(),
            "Received 401, refreshing token"
        );

        let bundle = match self.refresh.refresh().await {
            Ok(bundle) => bundle,
            Err(e) => {
                tracing::warn!(
                    request_id = %context.request_id,
                    state = AuthState::Failed.as_str(),
                    error = %e,
                    "Token refresh failed, giving up on request"
                );
                return RetryDecision::DoNotRetry;
            }
        };

        let access_token = bundle.access_token.clone();
        self.tokens.save(bundle).await;

        let Some(mut request) = context.clone_request() else {
            tracing::warn!(
                request_id = %context.request_id,
                "Request body cannot be replayed, not retrying"
            );
            return RetryDecision::DoNotRetry;
        };

        if let Err(e) = set_bearer(&mut request, &access_token) {
            tracing::warn!(request_id = %context.request_id, error = %e, "Refreshed token is not a valid header");
            return RetryDecision::DoNotRetry;
        }

        tracing::info!(
            request_id = %context.request_id,
            state = AuthState::Authenticated.as_str(),
            "Token refreshed, retrying request"
        );
        RetryDecision::Retry(request)
    }
}
