// Session flows
// The callers of the credential store: startup restore, sign-in, sign-out

use std::sync::Arc;

use super::credentials::CredentialStore;
use super::manager::TokenManager;
use super::types::CredentialBundle;
use crate::error::StoreError;

/// Keeps the token manager and the credential store in step for the
/// session-level flows. Store failures are always returned to the caller.
#[derive(Clone)]
pub struct Session {
    tokens: Arc<TokenManager>,
    store: Arc<dyn CredentialStore>,
}

impl Session {
    pub fn new(tokens: Arc<TokenManager>, store: Arc<dyn CredentialStore>) -> Self {
        Self { tokens, store }
    }

    pub fn tokens(&self) -> &Arc<TokenManager> {
        &self.tokens
    }

    pub fn store(&self) -> &Arc<dyn CredentialStore> {
        &self.store
    }

    /// Load the persisted bundle into memory; run once at startup
    pub async fn restore(&self) -> Result<Option<CredentialBundle>, StoreError> {
        let store = self.store.clone();
        self.tokens.load_from_storage(move || store.load()).await
    }

    /// Persist `bundle`, then make it current. Nothing is cached if the
    /// write fails.
    pub async fn sign_in(&self, bundle: CredentialBundle) -> Result<(), StoreError> {
        self.store.save(&bundle)?;
        self.tokens.save(bundle).await;
        tracing::info!("Signed in");
        Ok(())
    }

    /// Drop the session from memory and from the store
    pub async fn sign_out(&self) -> Result<(), StoreError> {
        self.tokens.clear().await;
        self.store.delete()?;
        tracing::info!("Signed out");
        Ok(())
    }

    /// Write the current in-memory bundle to the store, if there is one
    pub async fn persist_current(&self) -> Result<bool, StoreError> {
        match self.tokens.current_token().await {
            Some(bundle) => {
                self.store.save(&bundle)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::MemoryCredentialStore;
    use chrono::{Duration, Utc};

    fn bundle(access: &str) -> CredentialBundle {
        CredentialBundle::new(access, "R", Utc::now() + Duration::hours(1))
    }

    fn session(store: Arc<MemoryCredentialStore>) -> Session {
        Session::new(Arc::new(TokenManager::new()), store)
    }

    #[tokio::test]
    async fn test_restore_loads_into_memory() {
        let stored = bundle("A");
        let session = session(Arc::new(MemoryCredentialStore::with_bundle(stored.clone())));

        assert_eq!(session.restore().await.unwrap(), Some(stored));
        assert_eq!(session.tokens().access_token().await.as_deref(), Some("A"));
    }

    #[tokio::test]
    async fn test_restore_failure_is_surfaced() {
        let store = Arc::new(MemoryCredentialStore::new());
        store.set_failing(true);
        let session = session(store);

        assert!(matches!(session.restore().await, Err(StoreError::LoadFailed { .. })));
        assert_eq!(session.tokens().current_token().await, None);
    }

    #[tokio::test]
    async fn test_sign_in_persists_then_caches() {
        let store = Arc::new(MemoryCredentialStore::new());
        let session = session(store.clone());

        session.sign_in(bundle("A")).await.unwrap();

        assert_eq!(store.load().unwrap().map(|b| b.access_token), Some("A".to_string()));
        assert_eq!(session.tokens().access_token().await.as_deref(), Some("A"));
    }

    #[tokio::test]
    async fn test_sign_in_failure_caches_nothing() {
        let store = Arc::new(MemoryCredentialStore::new());
        store.set_failing(true);
        let session = session(store);

        assert!(matches!(
            session.sign_in(bundle("A")).await,
            Err(StoreError::SaveFailed { .. })
        ));
        assert_eq!(session.tokens().current_token().await, None);
    }

    #[tokio::test]
    async fn test_sign_out_clears_both() {
        let store = Arc::new(MemoryCredentialStore::new());
        let session = session(store.clone());
        session.sign_in(bundle("A")).await.unwrap();

        session.sign_out().await.unwrap();

        assert_eq!(store.load().unwrap(), None);
        assert!(session.tokens().is_expired().await);
    }

    #[tokio::test]
    async fn test_sign_out_store_failure_still_clears_memory() {
        let store = Arc::new(MemoryCredentialStore::new());
        let session = session(store.clone());
        session.sign_in(bundle("A")).await.unwrap();
        store.set_failing(true);

        assert!(matches!(session.sign_out().await, Err(StoreError::DeleteFailed { .. })));
        assert_eq!(session.tokens().current_token().await, None);
    }

    #[tokio::test]
    async fn test_persist_current() {
        let store = Arc::new(MemoryCredentialStore::new());
        let session = session(store.clone());

        assert!(!session.persist_current().await.unwrap());

        session.tokens().save(bundle("B")).await;
        assert!(session.persist_current().await.unwrap());
        assert_eq!(store.load().unwrap().map(|b| b.access_token), Some("B".to_string()));
    }
}
