// Token refresh operation
// A substitutable client with a live implementation and single-flight coalescing

use chrono::Utc;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::sync::Arc;
use tokio::sync::Mutex;

use super::credentials::CredentialStore;
use super::manager::TokenManager;
use super::types::{CredentialBundle, RefreshRequest, RefreshResponse};
use crate::endpoint::{EndpointDescriptor, HttpMethod};
use crate::error::{NetworkError, RefreshError};
use crate::http_client::RequestExecutor;

/// Feature tag of the refresh call
pub const REFRESH_FEATURE: &str = "auth.refresh";

pub type RefreshFuture = BoxFuture<'static, Result<CredentialBundle, RefreshError>>;

type RefreshFn = dyn Fn() -> RefreshFuture + Send + Sync;

/// Obtains a new credential bundle.
///
/// Holds the operation as a closure so tests can substitute any behaviour with
/// [`RefreshClient::new`] while production wiring uses [`RefreshClient::live`].
#[derive(Clone)]
pub struct RefreshClient {
    refresh: Arc<RefreshFn>,
}

impl std::fmt::Debug for RefreshClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshClient").finish_non_exhaustive()
    }
}

impl RefreshClient {
    pub fn new<F>(refresh: F) -> Self
    where
        F: Fn() -> RefreshFuture + Send + Sync + 'static,
    {
        Self {
            refresh: Arc::new(refresh),
        }
    }

    /// Call the refresh endpoint with the cached refresh token.
    ///
    /// `executor` must not carry an auth interceptor. When `store` is given the
    /// new bundle is written through to it.
    pub fn live(
        executor: Arc<RequestExecutor>,
        tokens: Arc<TokenManager>,
        base_url: impl Into<String>,
        refresh_path: impl Into<String>,
        store: Option<Arc<dyn CredentialStore>>,
    ) -> Self {
        let base_url = base_url.into();
        let refresh_path = refresh_path.into();

        Self::new(move || {
            let executor = executor.clone();
            let tokens = tokens.clone();
            let base_url = base_url.clone();
            let refresh_path = refresh_path.clone();
            let store = store.clone();

            async move {
                refresh_session(&executor, &tokens, &base_url, &refresh_path, store.as_deref()).await
            }
            .boxed()
        })
    }

    /// Run the operation
    pub fn refresh(&self) -> RefreshFuture {
        (self.refresh)()
    }

    /// Wrap this client so that concurrent callers share one in-flight refresh.
    /// Once that refresh settles the next call starts a new one.
    pub fn coalescing(self) -> Self {
        let in_flight: Arc<Mutex<InFlight>> = Arc::new(Mutex::new(InFlight::default()));

        Self::new(move || {
            let inner = self.clone();
            let in_flight = in_flight.clone();
            async move { join_or_start(&inner, &in_flight).await }.boxed()
        })
    }
}

#[derive(Default)]
struct InFlight {
    generation: u64,
    current: Option<(u64, Shared<RefreshFuture>)>,
}

async fn join_or_start(
    inner: &RefreshClient,
    in_flight: &Mutex<InFlight>,
) -> Result<CredentialBundle, RefreshError> {
    let (generation, shared) = {
        let mut slot = in_flight.lock().await;
        // A settled future can be left behind when all its callers were dropped
        let running = slot
            .current
            .clone()
            .filter(|(_, shared)| shared.peek().is_none());
        if let Some((generation, shared)) = running {
            tracing::debug!("Joining in-flight token refresh");
            (generation, shared)
        } else {
            slot.generation += 1;
            let generation = slot.generation;
            let shared = inner.refresh().shared();
            slot.current = Some((generation, shared.clone()));
            (generation, shared)
        }
    };

    let result = shared.await;

    let mut slot = in_flight.lock().await;
    if matches!(&slot.current, Some((g, _)) if *g == generation) {
        slot.current = None;
    }

    result
}

/// The refresh endpoint for `refresh_token`; exempt from auth
pub fn refresh_endpoint(
    base_url: &str,
    refresh_path: &str,
    refresh_token: &str,
) -> Result<EndpointDescriptor, NetworkError> {
    EndpointDescriptor::new(base_url, HttpMethod::Post, refresh_path)
        .requires_auth(false)
        .feature(REFRESH_FEATURE)
        .json_body(&RefreshRequest {
            refresh_token: refresh_token.to_string(),
        })
}

async fn refresh_session(
    executor: &RequestExecutor,
    tokens: &TokenManager,
    base_url: &str,
    refresh_path: &str,
    store: Option<&dyn CredentialStore>,
) -> Result<CredentialBundle, RefreshError> {
    let refresh_token = tokens
        .refresh_token()
        .await
        .ok_or(RefreshError::MissingRefreshToken)?;

    tracing::info!("Refreshing access token...");

    let target = refresh_endpoint(base_url, refresh_path, &refresh_token)?;
    let response: RefreshResponse = executor.request(target).await?;

    if response.access_token.is_empty() {
        return Err(NetworkError::Decoding("refresh response does not contain accessToken".to_string()).into());
    }

    let bundle = response.into_bundle(refresh_token, Utc::now())?;
    tracing::info!(
        "Token refreshed, expires: {}",
        bundle.expires_at.to_rfc3339()
    );

    if let Some(store) = store {
        // Memory stays authoritative for this process even if the write fails
        if let Err(e) = store.save(&bundle) {
            tracing::error!(status = e.status(), error = %e, "Failed to persist refreshed credentials");
        }
    }

    Ok(bundle)
}
