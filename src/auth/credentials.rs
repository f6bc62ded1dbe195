// Durable credential storage
// One encrypted credential bundle in SQLite, plus an in-memory store for tests

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use super::encryption;
use super::types::CredentialBundle;
use crate::error::StoreError;

/// Status reported when a failure did not come from SQLite itself
const NON_STORAGE_STATUS: i32 = -1;

/// Row key of the single bundle slot
const SESSION_SLOT: &str = "session";

/// Save/load/delete contract for the persisted credential bundle.
/// Implementations must be callable from any thread.
pub trait CredentialStore: Send + Sync {
    fn save(&self, bundle: &CredentialBundle) -> Result<(), StoreError>;
    fn load(&self) -> Result<Option<CredentialBundle>, StoreError>;
    fn delete(&self) -> Result<(), StoreError>;
}

fn sqlite_status(err: &rusqlite::Error) -> i32 {
    err.sqlite_error()
        .map(|e| e.extended_code)
        .unwrap_or(NON_STORAGE_STATUS)
}

/// Encrypted credential store backed by SQLite.
///
/// The bundle is serialised and sealed as one blob, so a row either holds a
/// complete bundle or does not exist.
pub struct SqliteCredentialStore {
    conn: Mutex<Connection>,
    key: Vec<u8>,
}

impl SqliteCredentialStore {
    /// Open (or create) the store at `path` with a base64 master key
    pub fn open<P: AsRef<Path>>(path: P, key_base64: &str) -> Result<Self, StoreError> {
        let path = path.as_ref();
        tracing::info!("Opening credential store: {}", path.display());

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::LoadFailed {
                status: e.raw_os_error().unwrap_or(NON_STORAGE_STATUS),
                message: format!("Failed to create {}: {}", parent.display(), e),
            })?;
        }

        let conn = Connection::open(path).map_err(|e| StoreError::LoadFailed {
            status: sqlite_status(&e),
            message: format!("Failed to open database {}: {}", path.display(), e),
        })?;

        Self::with_connection(conn, key_base64)
    }

    /// Store backed by a private in-memory database
    pub fn open_in_memory(key_base64: &str) -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(|e| StoreError::LoadFailed {
            status: sqlite_status(&e),
            message: e.to_string(),
        })?;
        Self::with_connection(conn, key_base64)
    }

    fn with_connection(conn: Connection, key_base64: &str) -> Result<Self, StoreError> {
        let key = encryption::validate_key(key_base64).map_err(|e| StoreError::InvalidData {
            status: NON_STORAGE_STATUS,
            message: e.to_string(),
        })?;

        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS credential_bundle (
                slot TEXT PRIMARY KEY,
                ciphertext TEXT NOT NULL,
                nonce TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
            [],
        )
        .map_err(|e| StoreError::LoadFailed {
            status: sqlite_status(&e),
            message: format!("Failed to create credential table: {}", e),
        })?;

        Ok(Self {
            conn: Mutex::new(conn),
            key,
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, String> {
        self.conn
            .lock()
            .map_err(|_| "credential store lock poisoned".to_string())
    }
}

impl CredentialStore for SqliteCredentialStore {
    fn save(&self, bundle: &CredentialBundle) -> Result<(), StoreError> {
        let plaintext = serde_json::to_vec(bundle).map_err(|e| StoreError::SaveFailed {
            status: NON_STORAGE_STATUS,
            message: format!("Failed to serialise bundle: {}", e),
        })?;

        let (ciphertext, nonce) =
            encryption::seal(&plaintext, &self.key).map_err(|e| StoreError::SaveFailed {
                status: NON_STORAGE_STATUS,
                message: e.to_string(),
            })?;

        let conn = self.lock().map_err(|message| StoreError::SaveFailed {
            status: NON_STORAGE_STATUS,
            message,
        })?;

        conn.execute(
            r#"
            INSERT INTO credential_bundle (slot, ciphertext, nonce, updated_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(slot) DO UPDATE SET
                ciphertext = excluded.ciphertext,
                nonce = excluded.nonce,
                updated_at = excluded.updated_at
            "#,
            params![SESSION_SLOT, ciphertext, nonce, Utc::now().to_rfc3339()],
        )
        .map_err(|e| StoreError::SaveFailed {
            status: sqlite_status(&e),
            message: e.to_string(),
        })?;

        tracing::debug!("Persisted credential bundle");
        Ok(())
    }

    fn load(&self) -> Result<Option<CredentialBundle>, StoreError> {
        let conn = self.lock().map_err(|message| StoreError::LoadFailed {
            status: NON_STORAGE_STATUS,
            message,
        })?;

        let row: Option<(String, String)> = conn
            .query_row(
                "SELECT ciphertext, nonce FROM credential_bundle WHERE slot = ?1",
                [SESSION_SLOT],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .map_err(|e| StoreError::LoadFailed {
                status: sqlite_status(&e),
                message: e.to_string(),
            })?;

        let Some((ciphertext, nonce)) = row else {
            return Ok(None);
        };

        let plaintext =
            encryption::open(&ciphertext, &nonce, &self.key).map_err(|e| StoreError::InvalidData {
                status: NON_STORAGE_STATUS,
                message: e.to_string(),
            })?;

        serde_json::from_slice(&plaintext)
            .map(Some)
            .map_err(|e| StoreError::InvalidData {
                status: NON_STORAGE_STATUS,
                message: format!("Failed to parse stored bundle: {}", e),
            })
    }

    fn delete(&self) -> Result<(), StoreError> {
        let conn = self.lock().map_err(|message| StoreError::DeleteFailed {
            status: NON_STORAGE_STATUS,
            message,
        })?;

        conn.execute(
            "DELETE FROM credential_bundle WHERE slot = ?1",
            [SESSION_SLOT],
        )
        .map_err(|e| StoreError::DeleteFailed {
            status: sqlite_status(&e),
            message: e.to_string(),
        })?;

        tracing::debug!("Deleted stored credential bundle");
        Ok(())
    }
}

/// Non-durable store. `set_failing(true)` makes every call fail with a typed
/// error, which is how the error paths of callers are exercised.
#[derive(Default)]
pub struct MemoryCredentialStore {
    bundle: Mutex<Option<CredentialBundle>>,
    failing: AtomicBool,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bundle(bundle: CredentialBundle) -> Self {
        Self {
            bundle: Mutex::new(Some(bundle)),
            failing: AtomicBool::new(false),
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn is_failing(&self) -> bool {
        self.failing.load(Ordering::SeqCst)
    }

    fn slot(&self) -> Result<std::sync::MutexGuard<'_, Option<CredentialBundle>>, String> {
        if self.is_failing() {
            return Err("store unavailable".to_string());
        }
        self.bundle
            .lock()
            .map_err(|_| "credential store lock poisoned".to_string())
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn save(&self, bundle: &CredentialBundle) -> Result<(), StoreError> {
        let mut slot = self.slot().map_err(|message| StoreError::SaveFailed {
            status: NON_STORAGE_STATUS,
            message,
        })?;
        *slot = Some(bundle.clone());
        Ok(())
    }

    fn load(&self) -> Result<Option<CredentialBundle>, StoreError> {
        let slot = self.slot().map_err(|message| StoreError::LoadFailed {
            status: NON_STORAGE_STATUS,
            message,
        })?;
        Ok(slot.clone())
    }

    fn delete(&self) -> Result<(), StoreError> {
        let mut slot = self.slot().map_err(|message| StoreError::DeleteFailed {
            status: NON_STORAGE_STATUS,
            message,
        })?;
        *slot = None;
        Ok(())
    }
}
