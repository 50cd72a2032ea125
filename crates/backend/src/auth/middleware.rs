//! Authentication middleware for the `/api` routes.

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::error::ApiError;
use crate::AppState;

use super::jwt;
use super::types::{AuthConfig, AuthUser, Claims};

/// Validate the session token and insert the [`AuthUser`] extension.
///
/// Used with `axum::middleware::from_fn_with_state`. Tokens past the refresh
/// age get a fresh cookie on the response.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let config = &state.auth_config;

    let claims = match authenticate(request.headers(), config) {
        Ok(claims) => claims,
        Err(e) => return e.into_response(),
    };

    request.extensions_mut().insert(AuthUser {
        email: claims.sub.clone(),
        name: claims.name.clone(),
    });

    let response = next.run(request).await;

    if jwt::should_refresh(&claims) {
        if let Ok(new_token) = jwt::create_token(config, &claims.sub, claims.name.clone()) {
            let cookie =
                build_auth_cookie(&config.cookie_name, &new_token, config.token_duration_days);
            let (mut parts, body) = response.into_parts();
            if let Ok(cookie_value) = cookie.parse() {
                parts.headers.insert(header::SET_COOKIE, cookie_value);
            }
            return Response::from_parts(parts, body);
        }
    }

    response
}

fn authenticate(headers: &HeaderMap, config: &AuthConfig) -> Result<Claims, ApiError> {
    let token = extract_token_from_cookie(headers, &config.cookie_name)
        .or_else(|| extract_token_from_header(headers))
        .ok_or_else(|| ApiError::Unauthorized("Missing authentication".to_string()))?;

    let claims = jwt::validate_token(config, &token)
        .map_err(|_| ApiError::Unauthorized("Invalid or expired token".to_string()))?;

    if !config.is_email_allowed(&claims.sub) {
        return Err(ApiError::Forbidden("Email not authorized".to_string()));
    }

    Ok(claims)
}

fn extract_token_from_cookie(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    let cookie_header = headers.get(header::COOKIE)?.to_str().ok()?;

    cookie::Cookie::split_parse(cookie_header)
        .filter_map(Result::ok)
        .find(|c| c.name() == cookie_name)
        .map(|c| c.value().to_string())
}

fn extract_token_from_header(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(|s| s.trim().to_string())
}

pub fn build_auth_cookie(name: &str, value: &str, days: i64) -> String {
    let max_age = days * 24 * 60 * 60;
    let secure = if std::env::var("RUST_ENV").unwrap_or_default() == "production" {
        "; Secure"
    } else {
        ""
    };
    format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}{}",
        name, value, max_age, secure
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn config(allowed: &[&str]) -> AuthConfig {
        AuthConfig {
            jwt_secret: "middleware-test-secret".to_string(),
            allowed_emails: allowed.iter().map(|s| s.to_string()).collect(),
            token_duration_days: 7,
            cookie_name: "auth_token".to_string(),
        }
    }

    #[test]
    fn test_token_from_cookie_or_bearer() {
        let config = config(&[]);
        let token = jwt::create_token(&config, "host@example.com", None).unwrap();

        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_str(&format!("theme=dark; auth_token={token}")).unwrap(),
        );
        assert_eq!(authenticate(&headers, &config).unwrap().sub, "host@example.com");

        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
        );
        assert_eq!(authenticate(&headers, &config).unwrap().sub, "host@example.com");
    }

    #[test]
    fn test_missing_or_disallowed() {
        let open = config(&[]);
        assert!(matches!(
            authenticate(&HeaderMap::new(), &open),
            Err(ApiError::Unauthorized(_))
        ));

        let closed = config(&["someone@example.com"]);
        let token = jwt::create_token(&closed, "host@example.com", None).unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
        );
        assert!(matches!(
            authenticate(&headers, &closed),
            Err(ApiError::Forbidden(_))
        ));
    }

    #[test]
    fn test_cookie_format() {
        let cookie = build_auth_cookie("auth_token", "abc", 1);
        assert!(cookie.starts_with("auth_token=abc; Path=/; HttpOnly"));
        assert!(cookie.contains("Max-Age=86400"));
    }
}
