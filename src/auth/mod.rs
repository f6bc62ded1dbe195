// Authentication module
// Credential bundle, token manager, credential storage, refresh and session flows

mod credentials;
mod encryption;
mod manager;
mod refresh;
mod session;
mod types;

pub use credentials::{CredentialStore, MemoryCredentialStore, SqliteCredentialStore};
pub use encryption::{validate_key, CipherError, KEY_SIZE};
pub use manager::TokenManager;
pub use refresh::{refresh_endpoint, RefreshClient, RefreshFuture, REFRESH_FEATURE};
pub use session::Session;
pub use types::{CredentialBundle, RefreshRequest, RefreshResponse};
