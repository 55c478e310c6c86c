mod client;
mod endpoints;
mod error;

pub use client::ApiClient;
pub use endpoints::{Page, Profile, Project, Snippet};
pub use error::{ApiError, ApiResult};
