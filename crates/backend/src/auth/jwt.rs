//! HS256 session tokens carried by the API's cookie or bearer header.
//!
//! Sign-in happens elsewhere; this module only mints tokens for a known
//! address and checks the ones presented to `/api`.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};

use super::types::{AuthConfig, Claims};

/// Tokens older than this are re-issued on the next authenticated request.
const REFRESH_AFTER_SECS: i64 = 24 * 60 * 60;

fn validation() -> Validation {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_required_spec_claims(&["sub", "exp"]);
    validation
}

fn claims_at(config: &AuthConfig, email: &str, name: Option<String>, now: DateTime<Utc>) -> Claims {
    Claims {
        sub: email.to_string(),
        name,
        iat: now.timestamp(),
        exp: (now + Duration::days(config.token_duration_days)).timestamp(),
    }
}

/// Sign a session for `email`, valid for `token_duration_days`.
pub fn create_token(
    config: &AuthConfig,
    email: &str,
    name: Option<String>,
) -> Result<String, jsonwebtoken::errors::Error> {
    encode(
        &Header::new(Algorithm::HS256),
        &claims_at(config, email, name, Utc::now()),
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
}

/// Claims of a token signed with our secret that has not expired.
pub fn validate_token(
    config: &AuthConfig,
    token: &str,
) -> Result<Claims, jsonwebtoken::errors::Error> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
        &validation(),
    )
    .map(|data| data.claims)
}

pub fn should_refresh(claims: &Claims) -> bool {
    Utc::now().timestamp() - claims.iat > REFRESH_AFTER_SECS
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session_config() -> AuthConfig {
        AuthConfig {
            jwt_secret: "meeting-session-secret".to_string(),
            allowed_emails: vec![],
            token_duration_days: 7,
            cookie_name: "auth_token".to_string(),
        }
    }

    #[test]
    fn test_issued_session_round_trips_claims() {
        let config = session_config();
        let token = create_token(&config, "host@example.com", Some("Host".to_string()))
            .expect("should create token");

        let claims = validate_token(&config, &token).expect("should validate token");
        assert_eq!(claims.sub, "host@example.com");
        assert_eq!(claims.name.as_deref(), Some("Host"));
        assert_eq!(claims.exp - claims.iat, 7 * 24 * 60 * 60);
        assert!(!should_refresh(&claims));
    }

    #[test]
    fn test_foreign_or_garbled_tokens_rejected() {
        let config = session_config();
        let token = create_token(&config, "host@example.com", None).expect("should create token");

        let other = AuthConfig {
            jwt_secret: "another-deployment".to_string(),
            ..session_config()
        };
        assert!(validate_token(&other, &token).is_err());
        assert!(validate_token(&config, "not-a-jwt").is_err());
    }

    #[test]
    fn test_expired_session_rejected() {
        let config = session_config();
        let issued = Utc::now() - Duration::days(30);
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims_at(&config, "host@example.com", None, issued),
            &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
        )
        .expect("should encode");

        assert!(validate_token(&config, &token).is_err());
    }

    #[test]
    fn test_day_old_sessions_are_refreshed() {
        let config = session_config();
        let claims = claims_at(
            &config,
            "host@example.com",
            None,
            Utc::now() - Duration::hours(25),
        );
        assert!(should_refresh(&claims));
    }
}
