//! Client for the external identity provider.

use crate::state::StateClaim;
use crate::user::UserInfo;
use crate::{AuthError, AuthResult, User};
use codedeck_core::Navigator;
use codedeck_storage::{TokenRecord, TokenStore};
use futures_util::future::{BoxFuture, Shared};
use futures_util::FutureExt;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};
use url::Url;

type SharedRefresh = Shared<BoxFuture<'static, Option<TokenRecord>>>;

/// Token endpoint request for the authorization-code exchange.
#[derive(Debug, Serialize)]
struct ExchangeRequest {
    code: String,
    redirect_uri: String,
}

/// Refresh endpoint request.
#[derive(Debug, Serialize)]
struct RefreshRequest {
    refresh_token: String,
}

/// Token payload returned by the token and refresh endpoints.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    /// Expiry as epoch seconds; converted to milliseconds here, at the
    /// provider boundary, and nowhere else.
    #[serde(default)]
    expires_at: Option<i64>,
}

impl TokenResponse {
    fn into_record(self, previous_refresh: Option<String>) -> TokenRecord {
        TokenRecord {
            access_token: self.access_token,
            // A refresh response may omit the refresh token; keep the one
            // we already hold so later refreshes still work.
            refresh_token: self.refresh_token.or(previous_refresh),
            expires_at_ms: self.expires_at.map(|secs| secs * 1000),
        }
    }
}

struct ClientInner {
    http: reqwest::Client,
    identity_url: String,
    callback_url: String,
    app_origin: String,
    store: Arc<TokenStore>,
    /// Nonces issued for authorization URLs, each accepted at most once.
    pending_states: Mutex<HashSet<String>>,
    /// The single in-flight refresh. Concurrent callers await the same
    /// future instead of each hitting the refresh endpoint.
    refresh_slot: Mutex<Option<SharedRefresh>>,
}

/// Client for every provider interaction: authorization URLs, code
/// exchange, profile fetch, token refresh, and logout.
#[derive(Clone)]
pub struct IdentityClient {
    inner: Arc<ClientInner>,
}

impl IdentityClient {
    /// Create a new identity client.
    ///
    /// # Arguments
    /// * `identity_url` - Provider base URL (e.g. `https://auth.codedeck.dev`)
    /// * `callback_url` - This application's `/auth/callback` URL
    /// * `app_origin` - Return URI for the provider's logout redirect
    /// * `store` - The durable token store
    pub fn new(
        identity_url: impl Into<String>,
        callback_url: impl Into<String>,
        app_origin: impl Into<String>,
        store: Arc<TokenStore>,
    ) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                http: reqwest::Client::new(),
                identity_url: identity_url.into(),
                callback_url: callback_url.into(),
                app_origin: app_origin.into(),
                store,
                pending_states: Mutex::new(HashSet::new()),
                refresh_slot: Mutex::new(None),
            }),
        }
    }

    /// The token store this client persists through.
    pub fn store(&self) -> &Arc<TokenStore> {
        &self.inner.store
    }

    fn authorize_url(&self, mode: &str, next: &str) -> AuthResult<Url> {
        let claim = StateClaim::new(next);
        self.inner
            .pending_states
            .lock()
            .unwrap()
            .insert(claim.nonce.clone());

        let mut url = Url::parse(&self.inner.identity_url)?;
        url.query_pairs_mut()
            .append_pair("redirect_uri", &self.inner.callback_url)
            .append_pair("state", &claim.encode())
            .append_pair("mode", mode);
        Ok(url)
    }

    /// Build the provider login URL. The `state` parameter carries a fresh
    /// nonce plus the post-login destination; it is never reused.
    pub fn login_url(&self, next: &str) -> AuthResult<Url> {
        self.authorize_url("login", next)
    }

    /// Build the provider signup URL.
    pub fn signup_url(&self, next: &str) -> AuthResult<Url> {
        self.authorize_url("signup", next)
    }

    /// Validate a callback `state` value and return the post-login
    /// destination it carries. Each issued state is accepted exactly once.
    pub fn consume_state(&self, raw: &str) -> Option<String> {
        let claim = StateClaim::decode(raw)?;
        let known = self.inner.pending_states.lock().unwrap().remove(&claim.nonce);
        if !known {
            warn!("callback carried an unknown or replayed state nonce");
            return None;
        }
        Some(claim.next)
    }

    /// Exchange an authorization code for tokens and the user profile.
    ///
    /// On success the token record is persisted before the profile fetch,
    /// so a crash between the two leaves a resumable session rather than a
    /// lost one.
    pub async fn exchange_code(&self, code: &str) -> AuthResult<(User, TokenRecord)> {
        let url = format!("{}/token", self.inner.identity_url);
        debug!(url = %url, "exchanging authorization code");

        let response = self
            .inner
            .http
            .post(&url)
            .json(&ExchangeRequest {
                code: code.to_string(),
                redirect_uri: self.inner.callback_url.clone(),
            })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, body = %body, "code exchange rejected");
            return Err(AuthError::ExchangeFailed(format!("HTTP {}", status)));
        }

        let tokens: TokenResponse = response.json().await?;
        let record = tokens.into_record(None);
        self.inner.store.save(&record)?;

        let user = self
            .fetch_current_user(Some(&record.access_token))
            .await
            .ok_or_else(|| {
                AuthError::ExchangeFailed("profile fetch after exchange failed".to_string())
            })?;

        info!(user_id = %user.id, "authorization code exchanged");
        Ok((user, record))
    }

    /// Fetch the current user's profile.
    ///
    /// Uses the given access token, or the stored one when absent. A 401
    /// triggers exactly one refresh and one retry; every other failure
    /// yields `None`; this call never surfaces an error to the caller.
    pub async fn fetch_current_user(&self, token: Option<&str>) -> Option<User> {
        let access = match token {
            Some(token) => token.to_string(),
            None => self.inner.store.load().ok().flatten()?.access_token,
        };

        match self.fetch_user_once(&access).await {
            Ok(user) => Some(user),
            Err(AuthError::Unauthorized) => {
                debug!("userinfo returned 401, refreshing once");
                let refreshed = self.refresh().await?;
                match self.fetch_user_once(&refreshed.access_token).await {
                    Ok(user) => Some(user),
                    Err(err) => {
                        warn!(error = %err, "userinfo retry after refresh failed");
                        None
                    }
                }
            }
            Err(err) => {
                warn!(error = %err, "userinfo fetch failed");
                None
            }
        }
    }

    async fn fetch_user_once(&self, access_token: &str) -> AuthResult<User> {
        let url = format!("{}/me", self.inner.identity_url);
        let response = self
            .inner
            .http
            .get(&url)
            .bearer_auth(access_token)
            .send()
            .await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            return Err(AuthError::Unauthorized);
        }
        if !response.status().is_success() {
            return Err(AuthError::Provider(format!(
                "userinfo returned HTTP {}",
                response.status()
            )));
        }

        let info: UserInfo = response.json().await?;
        Ok(info.into())
    }

    /// Refresh the access token.
    ///
    /// All concurrent callers share one in-flight request: the first caller
    /// creates the future, the rest await the same one, and the slot clears
    /// itself on completion regardless of outcome. With no stored refresh
    /// token this returns `None` without touching the network; a provider
    /// rejection also returns `None` and leaves the stored tokens as they
    /// are. Only an explicit logout clears them.
    pub async fn refresh(&self) -> Option<TokenRecord> {
        let fut = {
            let mut slot = self.inner.refresh_slot.lock().unwrap();
            match slot.as_ref() {
                Some(fut) => fut.clone(),
                None => {
                    let inner = self.inner.clone();
                    let fut: SharedRefresh = async move {
                        let result = inner.refresh_once().await;
                        inner.refresh_slot.lock().unwrap().take();
                        result
                    }
                    .boxed()
                    .shared();
                    *slot = Some(fut.clone());
                    fut
                }
            }
        };
        fut.await
    }

    /// Whether the stored access token is missing or past its expiry.
    /// Fail closed: storage errors and absent expiries count as expired.
    pub fn is_expired(&self) -> bool {
        self.inner.store.is_expired().unwrap_or(true)
    }

    /// Clear stored tokens and send the user agent to the provider's
    /// logout endpoint with a return URI back to this application.
    pub fn logout(&self, navigator: &dyn Navigator) -> AuthResult<()> {
        self.inner.store.clear()?;

        let mut url = Url::parse(&format!("{}/logout", self.inner.identity_url))?;
        url.query_pairs_mut()
            .append_pair("redirect_uri", &self.inner.app_origin);
        navigator.navigate(url.as_str());

        info!("logged out");
        Ok(())
    }
}

impl ClientInner {
    async fn refresh_once(&self) -> Option<TokenRecord> {
        let current = match self.store.load() {
            Ok(record) => record,
            Err(err) => {
                warn!(error = %err, "could not read token store for refresh");
                return None;
            }
        };
        let refresh_token = current.and_then(|record| record.refresh_token)?;

        let url = format!("{}/refresh", self.identity_url);
        debug!(url = %url, "refreshing access token");

        let response = match self
            .http
            .post(&url)
            .json(&RefreshRequest {
                refresh_token: refresh_token.clone(),
            })
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) => {
                warn!(error = %err, "token refresh request failed");
                return None;
            }
        };

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, body = %body, "provider rejected token refresh");
            return None;
        }

        let tokens: TokenResponse = match response.json().await {
            Ok(tokens) => tokens,
            Err(err) => {
                warn!(error = %err, "malformed refresh response");
                return None;
            }
        };

        let record = tokens.into_record(Some(refresh_token));
        if let Err(err) = self.store.save(&record) {
            warn!(error = %err, "could not persist refreshed tokens");
            return None;
        }

        info!("access token refreshed");
        Some(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codedeck_storage::MemoryStorage;

    fn client() -> IdentityClient {
        let store = Arc::new(TokenStore::new(Box::new(MemoryStorage::new())));
        IdentityClient::new(
            "https://auth.test",
            "http://localhost:9847/auth/callback",
            "http://localhost:9847",
            store,
        )
    }

    #[test]
    fn test_login_url_shape() {
        let client = client();
        let url = client.login_url("/dashboard").unwrap();

        assert!(url.as_str().starts_with("https://auth.test/?"));
        let pairs: std::collections::HashMap<_, _> = url.query_pairs().collect();
        assert_eq!(
            pairs.get("redirect_uri").map(|v| v.as_ref()),
            Some("http://localhost:9847/auth/callback")
        );
        assert_eq!(pairs.get("mode").map(|v| v.as_ref()), Some("login"));
        assert!(pairs.contains_key("state"));
    }

    #[test]
    fn test_signup_url_mode() {
        let client = client();
        let url = client.signup_url("/dashboard").unwrap();
        let pairs: std::collections::HashMap<_, _> = url.query_pairs().collect();
        assert_eq!(pairs.get("mode").map(|v| v.as_ref()), Some("signup"));
    }

    #[test]
    fn test_state_is_fresh_per_call() {
        let client = client();
        let first = client.login_url("/dashboard").unwrap();
        let second = client.login_url("/dashboard").unwrap();

        let state = |url: &Url| {
            url.query_pairs()
                .find(|(k, _)| k == "state")
                .map(|(_, v)| v.into_owned())
                .unwrap()
        };
        assert_ne!(state(&first), state(&second));
    }

    #[test]
    fn test_state_consumed_exactly_once() {
        let client = client();
        let url = client.login_url("/snippets").unwrap();
        let state = url
            .query_pairs()
            .find(|(k, _)| k == "state")
            .map(|(_, v)| v.into_owned())
            .unwrap();

        assert_eq!(client.consume_state(&state), Some("/snippets".to_string()));
        // Replay is rejected.
        assert_eq!(client.consume_state(&state), None);
    }

    #[test]
    fn test_unknown_state_rejected() {
        let client = client();
        let foreign = StateClaim::new("/dashboard").encode();
        assert_eq!(client.consume_state(&foreign), None);
        assert_eq!(client.consume_state("garbage"), None);
    }

    #[test]
    fn test_is_expired_with_empty_store() {
        let client = client();
        assert!(client.is_expired());
    }

    #[test]
    fn test_token_response_conversion_seconds_to_millis() {
        let tokens = TokenResponse {
            access_token: "tok".to_string(),
            refresh_token: Some("ref".to_string()),
            expires_at: Some(1_700_000_000),
        };
        let record = tokens.into_record(None);
        assert_eq!(record.expires_at_ms, Some(1_700_000_000_000));
    }

    #[test]
    fn test_token_response_keeps_previous_refresh_token() {
        let tokens = TokenResponse {
            access_token: "tok".to_string(),
            refresh_token: None,
            expires_at: None,
        };
        let record = tokens.into_record(Some("old-refresh".to_string()));
        assert_eq!(record.refresh_token, Some("old-refresh".to_string()));
    }
}
