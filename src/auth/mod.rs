use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::config;

/// Database role carried in tokens so the managed database's RLS applies
pub const AUTHENTICATED_ROLE: &str = "authenticated";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub role: String,
    pub exp: i64,
    pub iat: i64,
}

impl Claims {
    pub fn new(user_id: Uuid, email: Option<String>) -> Self {
        let now = Utc::now();
        let expiry_hours = config::config().security.jwt_expiry_hours;
        let exp = (now + Duration::hours(expiry_hours as i64)).timestamp();

        Self {
            sub: user_id,
            email,
            role: AUTHENTICATED_ROLE.to_string(),
            exp,
            iat: now.timestamp(),
        }
    }
}

#[derive(Debug, Error)]
pub enum JwtError {
    #[error("JWT generation error: {0}")]
    TokenGeneration(String),

    #[error("Invalid JWT token: {0}")]
    InvalidToken(String),

    #[error("JWT secret not configured")]
    InvalidSecret,
}

fn secret() -> Result<&'static str, JwtError> {
    let secret = config::config().security.jwt_secret.as_str();
    if secret.is_empty() {
        return Err(JwtError::InvalidSecret);
    }
    Ok(secret)
}

pub fn generate_jwt(claims: &Claims) -> Result<String, JwtError> {
    let encoding_key = EncodingKey::from_secret(secret()?.as_bytes());
    encode(&Header::default(), claims, &encoding_key)
        .map_err(|e| JwtError::TokenGeneration(e.to_string()))
}

/// Validate signature and expiry and return the claims
pub fn validate_jwt(token: &str) -> Result<Claims, JwtError> {
    let decoding_key = DecodingKey::from_secret(secret()?.as_bytes());
    let mut validation = Validation::default();
    // Tokens minted by the managed database carry an `aud` we don't check
    validation.validate_aud = false;

    decode::<Claims>(token, &decoding_key, &validation)
        .map(|data| data.claims)
        .map_err(|e| JwtError::InvalidToken(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_claims() {
        let id = Uuid::new_v4();
        let token = generate_jwt(&Claims::new(id, Some("tech@example.com".into()))).unwrap();
        let claims = validate_jwt(&token).unwrap();
        assert_eq!(claims.sub, id);
        assert_eq!(claims.role, AUTHENTICATED_ROLE);
        assert_eq!(claims.email.as_deref(), Some("tech@example.com"));
    }

    #[test]
    fn rejects_expired_and_garbage_tokens() {
        let mut claims = Claims::new(Uuid::new_v4(), None);
        claims.exp = Utc::now().timestamp() - 3600;
        let token = generate_jwt(&claims).unwrap();
        assert!(matches!(validate_jwt(&token), Err(JwtError::InvalidToken(_))));
        assert!(validate_jwt("not.a.jwt").is_err());
    }
}
