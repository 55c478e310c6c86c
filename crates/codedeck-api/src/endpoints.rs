//! Typed wrappers over the backend resource endpoints.

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::client::ApiClient;
use crate::error::ApiResult;

/// Profile as the backend reports it, which may lag the identity
/// provider's view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub user_id: String,
    pub created_at: String,
    pub updated_at: String,
    #[serde(default)]
    pub is_public: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snippet {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub code: String,
    pub language: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub user_id: String,
    #[serde(default)]
    pub is_public: bool,
    pub created_at: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub skip: u64,
    pub limit: u64,
}

impl ApiClient {
    pub async fn get_profile(&self) -> ApiResult<Profile> {
        self.get_json("/api/v1/auth/me").await
    }

    pub async fn list_projects(&self, skip: u64, limit: u64) -> ApiResult<Page<Project>> {
        self.get_json(&format!("/api/v1/projects?skip={skip}&limit={limit}"))
            .await
    }

    pub async fn get_project(&self, id: u64) -> ApiResult<Project> {
        self.get_json(&format!("/api/v1/projects/{id}")).await
    }

    pub async fn create_project(&self, name: &str, description: &str) -> ApiResult<Project> {
        self.post_json(
            "/api/v1/projects",
            &json!({ "name": name, "description": description }),
        )
        .await
    }

    pub async fn delete_project(&self, id: u64) -> ApiResult<()> {
        self.delete(&format!("/api/v1/projects/{id}")).await
    }

    pub async fn list_snippets(&self, skip: u64, limit: u64) -> ApiResult<Page<Snippet>> {
        self.get_json(&format!("/api/v1/snippets?skip={skip}&limit={limit}"))
            .await
    }

    pub async fn create_snippet(
        &self,
        title: &str,
        language: &str,
        code: &str,
    ) -> ApiResult<Snippet> {
        self.post_json(
            "/api/v1/snippets",
            &json!({ "title": title, "language": language, "code": code }),
        )
        .await
    }

    pub async fn delete_snippet(&self, id: u64) -> ApiResult<()> {
        self.delete(&format!("/api/v1/snippets/{id}")).await
    }
}
