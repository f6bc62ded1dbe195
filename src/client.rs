// API client wiring
// Builds the interceptor chain around a session and exposes the executor

use serde::de::DeserializeOwned;
use std::sync::Arc;

use crate::auth::{RefreshClient, Session};
use crate::endpoint::{EndpointDescriptor, HttpMethod};
use crate::error::Result;
use crate::http_client::{ExecutorConfig, RequestExecutor};
use crate::interceptor::{AuthInterceptor, Interceptor, LoggingInterceptor, MetricsInterceptor};

#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub base_url: String,
    pub refresh_path: String,
    pub executor: ExecutorConfig,
}

/// Authenticated API client.
///
/// Chain order is logging, metrics, auth. Refreshes go through a separate
/// executor without the auth interceptor and are coalesced across requests.
pub struct ApiClient {
    base_url: String,
    executor: RequestExecutor,
    session: Session,
    metrics: Arc<MetricsInterceptor>,
}

impl ApiClient {
    /// Wire the live refresh operation
    pub fn new(settings: &ClientSettings, session: Session) -> Result<Self> {
        let logging: Arc<dyn Interceptor> = Arc::new(LoggingInterceptor::new());

        let refresh_executor = Arc::new(RequestExecutor::new(&settings.executor, vec![logging.clone()])?);
        let refresh = RefreshClient::live(
            refresh_executor,
            session.tokens().clone(),
            settings.base_url.clone(),
            settings.refresh_path.clone(),
            Some(session.store().clone()),
        )
        .coalescing();

        Self::with_refresh(settings, session, refresh)
    }

    /// Wire a caller-supplied refresh operation
    pub fn with_refresh(settings: &ClientSettings, session: Session, refresh: RefreshClient) -> Result<Self> {
        let metrics = Arc::new(MetricsInterceptor::new());
        let auth = AuthInterceptor::new(session.tokens().clone(), refresh, settings.refresh_path.clone());

        let interceptors: Vec<Arc<dyn Interceptor>> = vec![
            Arc::new(LoggingInterceptor::new()),
            metrics.clone(),
            Arc::new(auth),
        ];

        Ok(Self {
            base_url: settings.base_url.clone(),
            executor: RequestExecutor::new(&settings.executor, interceptors)?,
            session,
            metrics,
        })
    }

    /// Descriptor for `path` on this client's base URL
    pub fn endpoint(&self, method: HttpMethod, path: impl Into<String>) -> EndpointDescriptor {
        EndpointDescriptor::new(self.base_url.clone(), method, path)
    }

    pub async fn request<T: DeserializeOwned>(&self, target: EndpointDescriptor) -> Result<T> {
        self.executor.request(target).await
    }

    pub fn executor(&self) -> &RequestExecutor {
        &self.executor
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn metrics(&self) -> &MetricsInterceptor {
        &self.metrics
    }
}
