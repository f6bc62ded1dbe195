use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::types::CredentialBundle;

/// Token manager
/// Single process-wide owner of the current credential bundle.
///
/// Every read and write goes through one `RwLock`, so writers never interleave
/// and readers only ever observe a fully written bundle. The manager does not
/// persist anything; callers decide when to write through to a
/// [`CredentialStore`](super::CredentialStore).
#[derive(Debug, Default)]
pub struct TokenManager {
    current: RwLock<Option<CredentialBundle>>,
}

impl TokenManager {
    /// Create an empty token manager
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a token manager already holding `bundle`
    pub fn with_bundle(bundle: CredentialBundle) -> Self {
        Self {
            current: RwLock::new(Some(bundle)),
        }
    }

    /// Current in-memory bundle; never touches storage
    pub async fn current_token(&self) -> Option<CredentialBundle> {
        self.current.read().await.clone()
    }

    pub async fn access_token(&self) -> Option<String> {
        self.current
            .read()
            .await
            .as_ref()
            .map(|b| b.access_token.clone())
    }

    pub async fn refresh_token(&self) -> Option<String> {
        self.current
            .read()
            .await
            .as_ref()
            .map(|b| b.refresh_token.clone())
    }

    /// True if nothing is cached or the cached bundle expires at or before now
    pub async fn is_expired(&self) -> bool {
        match self.current.read().await.as_ref() {
            None => true,
            Some(bundle) => bundle.is_expired_at(Utc::now()),
        }
    }

    /// Replace the in-memory bundle wholesale
    pub async fn save(&self, bundle: CredentialBundle) {
        let mut current = self.current.write().await;
        tracing::debug!(expires_at = %bundle.expires_at.to_rfc3339(), "Caching credential bundle");
        *current = Some(bundle);
    }

    pub async fn clear(&self) {
        let mut current = self.current.write().await;
        *current = None;
        tracing::debug!("Cleared cached credential bundle");
    }

    /// Run `loader` (normally a closure over the credential store), cache and
    /// return its result. The write lock is held for the duration of the load.
    /// A failing loader leaves the cached value untouched.
    pub async fn load_from_storage<F, E>(&self, loader: F) -> Result<Option<CredentialBundle>, E>
    where
        F: FnOnce() -> Result<Option<CredentialBundle>, E>,
    {
        let mut current = self.current.write().await;
        let loaded = loader()?;

        match &loaded {
            Some(bundle) => tracing::info!(
                expires_at = %bundle.expires_at.to_rfc3339(),
                "Loaded credential bundle from storage"
            ),
            None => tracing::info!("No stored credential bundle"),
        }

        *current = loaded.clone();
        Ok(loaded)
    }

    /// Replace access token and expiry, keeping the refresh token.
    /// No-op when nothing is cached.
    pub async fn update_access_token(
        &self,
        new_access_token: impl Into<String>,
        new_expires_at: DateTime<Utc>,
    ) {
        let mut current = self.current.write().await;
        match current.as_mut() {
            Some(bundle) => {
                bundle.access_token = new_access_token.into();
                bundle.expires_at = new_expires_at;
            }
            None => tracing::debug!("No cached bundle, ignoring access token update"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::sync::Arc;

    fn bundle(access: &str, refresh: &str, expires_at: DateTime<Utc>) -> CredentialBundle {
        CredentialBundle::new(access, refresh, expires_at)
    }

    #[tokio::test]
    async fn test_update_preserves_refresh_token() {
        let manager = TokenManager::new();
        let t = Utc::now() + Duration::hours(1);
        let some_date = Utc::now() + Duration::hours(2);

        manager.save(bundle("A", "R", t)).await;
        manager.update_access_token("X", some_date).await;

        assert_eq!(manager.current_token().await, Some(bundle("X", "R", some_date)));
    }

    #[tokio::test]
    async fn test_update_without_bundle_is_noop() {
        let manager = TokenManager::new();
        manager.update_access_token("X", Utc::now()).await;
        assert_eq!(manager.current_token().await, None);
    }

    #[tokio::test]
    async fn test_clear_is_total() {
        let manager = TokenManager::with_bundle(bundle("A", "R", Utc::now() + Duration::hours(1)));
        assert!(!manager.is_expired().await);

        manager.clear().await;

        assert_eq!(manager.current_token().await, None);
        assert_eq!(manager.access_token().await, None);
        assert_eq!(manager.refresh_token().await, None);
        assert!(manager.is_expired().await);
    }

    #[tokio::test]
    async fn test_token_expired_check() {
        let manager = TokenManager::with_bundle(bundle("A", "R", Utc::now() - Duration::seconds(60)));
        assert!(manager.is_expired().await);

        manager
            .save(bundle("B", "R", Utc::now() + Duration::seconds(600)))
            .await;
        assert!(!manager.is_expired().await);
        assert_eq!(manager.access_token().await.as_deref(), Some("B"));
        assert_eq!(manager.refresh_token().await.as_deref(), Some("R"));
    }

    #[tokio::test]
    async fn test_load_from_storage_caches_result() {
        let manager = TokenManager::new();
        let stored = bundle("A", "R", Utc::now() + Duration::hours(1));

        let loaded = manager
            .load_from_storage(|| Ok::<_, String>(Some(stored.clone())))
            .await
            .unwrap();

        assert_eq!(loaded, Some(stored.clone()));
        assert_eq!(manager.current_token().await, Some(stored));
    }

    #[tokio::test]
    async fn test_load_from_storage_error_keeps_cache() {
        let cached = bundle("A", "R", Utc::now() + Duration::hours(1));
        let manager = TokenManager::with_bundle(cached.clone());

        let result = manager
            .load_from_storage(|| Err::<Option<CredentialBundle>, _>("disk gone"))
            .await;

        assert_eq!(result, Err("disk gone"));
        assert_eq!(manager.current_token().await, Some(cached));
    }

    #[tokio::test]
    async fn test_concurrent_writers_never_tear_bundle() {
        let manager = Arc::new(TokenManager::with_bundle(bundle(
            "init",
            "init",
            Utc::now() + Duration::hours(1),
        )));

        let mut handles = Vec::new();
        for i in 0..32 {
            let manager = manager.clone();
            handles.push(tokio::spawn(async move {
                let token = format!("token-{}", i);
                if i % 2 == 0 {
                    manager
                        .save(bundle(&token, &token, Utc::now() + Duration::hours(1)))
                        .await;
                } else {
                    manager.update_access_token(token, Utc::now()).await;
                }
                manager.current_token().await
            }));
        }

        for handle in handles {
            let seen = handle.await.unwrap().expect("bundle present");
            assert!(!seen.access_token.is_empty());
            assert!(!seen.refresh_token.is_empty());
        }
    }
}
