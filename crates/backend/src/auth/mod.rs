//! Session authentication for the API.
//!
//! Requests carry an HS256 JWT in the `auth_token` cookie or an
//! `Authorization: Bearer` header. [`require_auth`] validates it and hands the
//! resolved [`AuthUser`] to handlers as a request extension.

pub mod jwt;
mod middleware;
pub mod types;

pub use middleware::require_auth;
pub use types::{AuthConfig, AuthUser};
