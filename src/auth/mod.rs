use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::config;

/// Claims carried by access tokens from the hosted auth provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,
    pub exp: i64,
    pub iat: i64,
}

impl Claims {
    pub fn new(user_id: Uuid, email: Option<String>) -> Self {
        let now = Utc::now();
        let security = &config::config().security;
        let exp = (now + Duration::hours(security.jwt_expiry_hours as i64)).timestamp();

        Self {
            sub: user_id,
            email,
            role: Some("authenticated".to_string()),
            aud: security.jwt_audience.clone(),
            exp,
            iat: now.timestamp(),
        }
    }
}

#[derive(Debug, Error)]
pub enum JwtError {
    #[error("JWT secret not configured")]
    InvalidSecret,

    #[error("JWT generation error: {0}")]
    TokenGeneration(String),

    #[error("Invalid JWT token: {0}")]
    InvalidToken(String),
}

pub fn generate_jwt(claims: &Claims) -> Result<String, JwtError> {
    generate_jwt_with_secret(claims, &config::config().security.jwt_secret)
}

pub fn generate_jwt_with_secret(claims: &Claims, secret: &str) -> Result<String, JwtError> {
    if secret.is_empty() {
        return Err(JwtError::InvalidSecret);
    }

    let encoding_key = EncodingKey::from_secret(secret.as_bytes());
    encode(&Header::default(), claims, &encoding_key).map_err(|e| JwtError::TokenGeneration(e.to_string()))
}

/// Validate a token against the configured secret and audience
pub fn validate_jwt(token: &str) -> Result<Claims, JwtError> {
    let security = &config::config().security;
    validate_jwt_with(token, &security.jwt_secret, security.jwt_audience.as_deref())
}

pub fn validate_jwt_with(token: &str, secret: &str, audience: Option<&str>) -> Result<Claims, JwtError> {
    if secret.is_empty() {
        return Err(JwtError::InvalidSecret);
    }

    let decoding_key = DecodingKey::from_secret(secret.as_bytes());
    let mut validation = Validation::default();
    match audience {
        Some(aud) => validation.set_audience(&[aud]),
        None => validation.validate_aud = false,
    }

    decode::<Claims>(token, &decoding_key, &validation)
        .map(|data| data.claims)
        .map_err(|e| JwtError::InvalidToken(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims_for(user_id: Uuid, exp_offset_hours: i64, aud: Option<&str>) -> Claims {
        let now = Utc::now();
        Claims {
            sub: user_id,
            email: Some("sam@example.com".to_string()),
            role: Some("authenticated".to_string()),
            aud: aud.map(str::to_string),
            exp: (now + Duration::hours(exp_offset_hours)).timestamp(),
            iat: now.timestamp(),
        }
    }

    #[test]
    fn token_round_trips_subject() {
        let user_id = Uuid::new_v4();
        let token = generate_jwt_with_secret(&claims_for(user_id, 1, None), "secret").unwrap();
        let claims = validate_jwt_with(&token, "secret", None).unwrap();
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.email.as_deref(), Some("sam@example.com"));
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = generate_jwt_with_secret(&claims_for(Uuid::new_v4(), 1, None), "secret").unwrap();
        assert!(matches!(
            validate_jwt_with(&token, "other", None),
            Err(JwtError::InvalidToken(_))
        ));
    }

    #[test]
    fn expired_token_is_rejected() {
        let token = generate_jwt_with_secret(&claims_for(Uuid::new_v4(), -2, None), "secret").unwrap();
        assert!(validate_jwt_with(&token, "secret", None).is_err());
    }

    #[test]
    fn audience_is_enforced_when_configured() {
        let token = generate_jwt_with_secret(&claims_for(Uuid::new_v4(), 1, Some("anon")), "secret").unwrap();
        assert!(validate_jwt_with(&token, "secret", Some("authenticated")).is_err());

        let token = generate_jwt_with_secret(&claims_for(Uuid::new_v4(), 1, Some("authenticated")), "secret").unwrap();
        assert!(validate_jwt_with(&token, "secret", Some("authenticated")).is_ok());
    }

    #[test]
    fn empty_secret_is_refused() {
        assert!(matches!(
            generate_jwt_with_secret(&claims_for(Uuid::new_v4(), 1, None), ""),
            Err(JwtError::InvalidSecret)
        ));
    }
}
