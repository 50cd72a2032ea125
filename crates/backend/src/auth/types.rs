//! Auth-related types and configuration.

use serde::{Deserialize, Serialize};

/// JWT Claims structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user email)
    pub sub: String,
    pub name: Option<String>,
    /// Issued at timestamp
    pub iat: i64,
    /// Expiration timestamp
    pub exp: i64,
}

/// Validated user from JWT
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub email: String,
    pub name: Option<String>,
}

#[derive(Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    /// Empty means every signed-in address is accepted
    pub allowed_emails: Vec<String>,
    pub token_duration_days: i64,
    pub cookie_name: String,
}

impl AuthConfig {
    /// Load auth configuration from environment variables.
    ///
    /// - `JWT_SECRET`: secret key for signing JWTs (required)
    /// - `ALLOWED_EMAILS`: optional comma-separated allowlist
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, String> {
        let jwt_secret = lookup("JWT_SECRET")
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| "JWT_SECRET must be set".to_string())?;

        let allowed_emails = lookup("ALLOWED_EMAILS")
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect();

        Ok(Self {
            jwt_secret,
            allowed_emails,
            token_duration_days: 7,
            cookie_name: "auth_token".to_string(),
        })
    }

    pub fn is_email_allowed(&self, email: &str) -> bool {
        self.allowed_emails.is_empty() || self.allowed_emails.contains(&email.to_lowercase())
    }
}
