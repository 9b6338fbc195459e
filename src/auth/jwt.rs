use std::time::{SystemTime, UNIX_EPOCH};

use crate::models::{Claims, TokenType};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::Error};

fn now() -> usize {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as usize)
        .unwrap_or_default()
}

/// Identity carried by an access token. Tokens are issued by the identity
/// service; this helper exists for service accounts and tests sharing the
/// same secret.
pub struct TokenSubject {
    pub user_id: u64,
    pub username: String,
    pub role: u8,
    pub company_id: u64,
    pub employee_id: Option<u64>,
}

pub fn generate_access_token(subject: TokenSubject, secret: &str, ttl: usize) -> Result<String, Error> {
    let claims = Claims {
        user_id: subject.user_id,
        sub: subject.username,
        role: subject.role,
        company_id: subject.company_id,
        exp: now() + ttl,
        token_type: TokenType::Access,
        employee_id: subject.employee_id,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

pub fn verify_token(token: &str, secret: &str) -> Result<Claims, String> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| e.to_string())
}
