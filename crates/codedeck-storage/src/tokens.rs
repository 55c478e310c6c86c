//! The token store: typed access to the persisted token triple.

use crate::{StorageBackend, StorageKeys, StorageResult};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

/// The token bundle issued by the identity provider.
///
/// `expires_at_ms` is epoch milliseconds; the provider's epoch-seconds
/// value is converted before a record ever reaches this crate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecord {
    /// Bearer token attached to API requests.
    pub access_token: String,
    /// Token used to obtain a new access token.
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Access token expiry, epoch milliseconds.
    #[serde(default)]
    pub expires_at_ms: Option<i64>,
}

impl TokenRecord {
    /// Whether the record is expired at the given instant.
    ///
    /// A record with no expiry is treated as expired (fail closed), and the
    /// boundary instant itself counts as expired.
    pub fn is_expired_at(&self, now_ms: i64) -> bool {
        match self.expires_at_ms {
            Some(expires_at) => now_ms >= expires_at,
            None => true,
        }
    }

    /// Whether the record is expired right now.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(chrono::Utc::now().timestamp_millis())
    }
}

/// Durable holder for the current token record.
///
/// All token mutations in the client go through this store; the session
/// layer holds a read-through view, never an independent copy. The mutex
/// makes `save` atomic from a reader's perspective even though the backend
/// persists three separate keys.
pub struct TokenStore {
    backend: Box<dyn StorageBackend>,
    lock: Mutex<()>,
}

impl TokenStore {
    /// Create a token store over the given backend.
    pub fn new(backend: Box<dyn StorageBackend>) -> Self {
        Self {
            backend,
            lock: Mutex::new(()),
        }
    }

    /// Persist a record, overwriting all three fields.
    pub fn save(&self, record: &TokenRecord) -> StorageResult<()> {
        let _guard = self.lock.lock().unwrap();
        self.backend
            .set(StorageKeys::ACCESS_TOKEN, &record.access_token)?;
        match &record.refresh_token {
            Some(refresh) => self.backend.set(StorageKeys::REFRESH_TOKEN, refresh)?,
            None => {
                self.backend.delete(StorageKeys::REFRESH_TOKEN)?;
            }
        }
        match record.expires_at_ms {
            Some(expires_at) => self
                .backend
                .set(StorageKeys::EXPIRES_AT, &expires_at.to_string())?,
            None => {
                self.backend.delete(StorageKeys::EXPIRES_AT)?;
            }
        }
        Ok(())
    }

    /// Load the stored record. `None` when no access token is stored.
    pub fn load(&self) -> StorageResult<Option<TokenRecord>> {
        let _guard = self.lock.lock().unwrap();
        let access_token = match self.backend.get(StorageKeys::ACCESS_TOKEN)? {
            Some(token) => token,
            None => return Ok(None),
        };
        let refresh_token = self.backend.get(StorageKeys::REFRESH_TOKEN)?;
        let expires_at_ms = self
            .backend
            .get(StorageKeys::EXPIRES_AT)?
            .and_then(|raw| raw.parse::<i64>().ok());

        Ok(Some(TokenRecord {
            access_token,
            refresh_token,
            expires_at_ms,
        }))
    }

    /// Remove every stored field. A no-op when nothing is stored.
    pub fn clear(&self) -> StorageResult<()> {
        let _guard = self.lock.lock().unwrap();
        self.backend.delete(StorageKeys::ACCESS_TOKEN)?;
        self.backend.delete(StorageKeys::REFRESH_TOKEN)?;
        self.backend.delete(StorageKeys::EXPIRES_AT)?;
        Ok(())
    }

    /// Whether the stored record is missing or expired right now.
    ///
    /// Fail closed: no record and no expiry both count as expired.
    pub fn is_expired(&self) -> StorageResult<bool> {
        match self.load()? {
            Some(record) => Ok(record.is_expired()),
            None => Ok(true),
        }
    }
}
