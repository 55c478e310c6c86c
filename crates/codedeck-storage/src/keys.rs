//! Storage key constants.

/// Storage keys used by the token store.
///
/// These mirror the three values the dashboard persists across reloads.
pub struct StorageKeys;

impl StorageKeys {
    /// OAuth access token
    pub const ACCESS_TOKEN: &'static str = "access_token";

    /// OAuth refresh token
    pub const REFRESH_TOKEN: &'static str = "refresh_token";

    /// Access token expiry, epoch milliseconds as a decimal string
    pub const EXPIRES_AT: &'static str = "expires_at";
}
