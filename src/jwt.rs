//! Access token codec
//!
//! HS256 JWTs carried in the `access_token` HttpOnly cookie.

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::entity::emp_account;

/// Access token claims
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Account ID
    pub sub: i64,
    /// Tenant ID
    pub tid: i64,
    /// Username
    pub usr: String,
    pub role: String,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    pub fn for_account(account: &emp_account::Model, now: i64, ttl_secs: i64) -> Self {
        Self {
            sub: account.id,
            tid: account.tenant_id,
            usr: account.username.clone(),
            role: account.role.clone(),
            iat: now,
            exp: now + ttl_secs,
        }
    }
}

/// Sign claims
pub fn sign(claims: &Claims, secret: &str) -> Result<String, jsonwebtoken::errors::Error> {
    encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

/// Verify signature and expiry
pub fn verify(token: &str, secret: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    // Accept a raw Authorization header value too
    let token = token.strip_prefix("Bearer ").unwrap_or(token);

    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;

    decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)
        .map(|data| data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims(exp_offset: i64) -> Claims {
        let now = chrono::Utc::now().timestamp();
        Claims {
            sub: 3,
            tid: 1,
            usr: "alice".to_string(),
            role: "buyer".to_string(),
            iat: now,
            exp: now + exp_offset,
        }
    }

    #[test]
    fn test_sign_and_verify() {
        let c = claims(600);
        let token = sign(&c, "secret").unwrap();
        assert_eq!(verify(&token, "secret").unwrap(), c);
        assert_eq!(verify(&format!("Bearer {}", token), "secret").unwrap(), c);
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = sign(&claims(600), "secret").unwrap();
        assert!(verify(&token, "other").is_err());
    }

    #[test]
    fn test_expired_rejected() {
        let token = sign(&claims(-60), "secret").unwrap();
        assert!(verify(&token, "secret").is_err());
    }
}
