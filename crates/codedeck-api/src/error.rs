use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    /// The backend rejected the request even after a token refresh.
    #[error("unauthorized")]
    Unauthorized,

    #[error("backend returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type ApiResult<T> = Result<T, ApiError>;
