//! Authenticated request pipeline for the CodeDeck backend.
//!
//! Every request goes out with the freshest access token the session can
//! produce. A `401 Unauthorized` response triggers exactly one refresh and
//! one resend with the new token; a second `401` is returned to the caller
//! and the navigator is pointed at the login surface.

use std::sync::Arc;

use reqwest::{Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use codedeck_core::Navigator;
use codedeck_session::SessionManager;

use crate::error::{ApiError, ApiResult};

const LOGIN_PATH: &str = "/login";

#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    session: Arc<SessionManager>,
    navigator: Arc<dyn Navigator>,
}

impl ApiClient {
    pub fn new(
        base_url: impl Into<String>,
        session: Arc<SessionManager>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        let base_url = base_url.into();
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            session,
            navigator,
        }
    }

    /// Send a request, retrying once with a refreshed token on `401`.
    ///
    /// Returns the raw response so callers can handle non-JSON bodies;
    /// the typed helpers below decode success bodies and map failures to
    /// [`ApiError`].
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> ApiResult<Response> {
        let mut token = self.session.fresh_access_token().await;
        let mut retried = false;
        loop {
            let response = self.send_once(&method, path, body, token.as_deref()).await?;
            if response.status() != StatusCode::UNAUTHORIZED {
                return Ok(response);
            }
            if retried {
                warn!(%method, path, "request unauthorized after refresh");
                self.redirect_to_login();
                return Ok(response);
            }
            match self.session.identity().refresh().await {
                Some(record) => {
                    debug!(%method, path, "retrying request with refreshed token");
                    token = Some(record.access_token);
                    retried = true;
                }
                None => {
                    self.redirect_to_login();
                    return Ok(response);
                }
            }
        }
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> ApiResult<T> {
        let response = self.request(Method::GET, path, None).await?;
        Self::decode(response).await
    }

    pub async fn post_json<T: DeserializeOwned>(&self, path: &str, body: &Value) -> ApiResult<T> {
        let response = self.request(Method::POST, path, Some(body)).await?;
        Self::decode(response).await
    }

    pub async fn put_json<T: DeserializeOwned>(&self, path: &str, body: &Value) -> ApiResult<T> {
        let response = self.request(Method::PUT, path, Some(body)).await?;
        Self::decode(response).await
    }

    pub async fn delete(&self, path: &str) -> ApiResult<()> {
        let response = self.request(Method::DELETE, path, None).await?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        Err(Self::status_error(status, response).await)
    }

    async fn send_once(
        &self,
        method: &Method,
        path: &str,
        body: Option<&Value>,
        token: Option<&str>,
    ) -> ApiResult<Response> {
        let url = format!("{}{}", self.base_url, path);
        let mut builder = self.http.request(method.clone(), &url);
        if let Some(token) = token {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = body {
            builder = builder.json(body);
        }
        Ok(builder.send().await?)
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> ApiResult<T> {
        let status = response.status();
        if !status.is_success() {
            return Err(Self::status_error(status, response).await);
        }
        Ok(response.json().await?)
    }

    async fn status_error(status: StatusCode, response: Response) -> ApiError {
        if status == StatusCode::UNAUTHORIZED {
            return ApiError::Unauthorized;
        }
        let body = response.text().await.unwrap_or_default();
        ApiError::Status {
            status: status.as_u16(),
            body,
        }
    }

    fn redirect_to_login(&self) {
        self.navigator.navigate(LOGIN_PATH);
    }
}
