//! User profile types sourced from the identity provider.

use serde::{Deserialize, Serialize};

/// Role reported by the identity provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[default]
    User,
    Admin,
}

/// The authenticated user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Opaque provider-issued identifier.
    pub id: String,
    /// Account email.
    pub email: String,
    /// Display name. The profile-edit flow may overwrite this client-side;
    /// nothing writes it back to the provider.
    pub display_name: String,
    /// Avatar image URL, when the provider has one.
    pub avatar_url: Option<String>,
    /// Access role.
    pub role: Role,
}

/// Profile payload as the provider's userinfo endpoint returns it.
#[derive(Debug, Deserialize)]
pub(crate) struct UserInfo {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub role: Role,
}

impl From<UserInfo> for User {
    fn from(info: UserInfo) -> Self {
        // No display name from the provider: fall back to the email local
        // part, as the dashboard always has.
        let display_name = match info.name {
            Some(name) if !name.is_empty() => name,
            _ => info
                .email
                .split('@')
                .next()
                .unwrap_or_default()
                .to_string(),
        };
        Self {
            id: info.id,
            email: info.email,
            display_name,
            avatar_url: info.avatar_url,
            role: info.role,
        }
    }
}
