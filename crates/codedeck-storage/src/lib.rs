//! Durable token storage for the CodeDeck client.
//!
//! This crate provides the Token Store: a keyed persistence shim for the
//! access token, refresh token, and expiry timestamp, surviving restarts
//! the way the dashboard's localStorage entries survive page reloads.
//! No validation happens here; expiry policy lives with the callers.

mod file;
mod keys;
mod memory;
mod tokens;
mod traits;

pub use file::FileStorage;
pub use keys::StorageKeys;
pub use memory::MemoryStorage;
pub use tokens::{TokenRecord, TokenStore};
pub use traits::StorageBackend;

use codedeck_core::Paths;
use thiserror::Error;

/// Error type for storage operations.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Backend-specific storage error
    #[error("Storage backend error: {0}")]
    Backend(String),

    /// Encoding/decoding error
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Open the default file-backed token store under the client's base directory.
pub fn open_default(paths: &Paths) -> StorageResult<TokenStore> {
    let storage = FileStorage::new(paths.tokens_file())?;
    Ok(TokenStore::new(Box::new(storage)))
}
