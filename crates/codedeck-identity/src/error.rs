//! Authentication error types.

use thiserror::Error;

/// Authentication error type.
#[derive(Error, Debug)]
pub enum AuthError {
    /// Provider rejected the authorization code
    #[error("Code exchange failed: {0}")]
    ExchangeFailed(String),

    /// Provider rejected the access token
    #[error("Unauthorized")]
    Unauthorized,

    /// Provider returned an unexpected non-success status
    #[error("Provider error: {0}")]
    Provider(String),

    /// Callback carried an error or was malformed
    #[error("Callback error: {0}")]
    Callback(String),

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(#[from] codedeck_storage::StorageError),

    /// HTTP request error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parse error
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Waiting for the callback timed out
    #[error("Timed out waiting for the authentication callback")]
    Timeout,
}

/// Result type alias using AuthError.
pub type AuthResult<T> = Result<T, AuthError>;
