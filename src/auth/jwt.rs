use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::aggregates::User;
use crate::error::AppError;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    pub is_admin: bool,
    pub is_super_admin: bool,
    pub iat: usize,
    pub exp: usize,
}

impl Claims {
    pub fn for_user(user: &User, ttl_days: i64) -> Self {
        let now = Utc::now();
        Self {
            sub: user.id,
            email: user.email.clone(),
            is_admin: user.is_admin || user.is_super_admin,
            is_super_admin: user.is_super_admin,
            iat: now.timestamp() as usize,
            exp: (now + Duration::days(ttl_days)).timestamp() as usize,
        }
    }

    pub fn user_id(&self) -> Uuid { self.sub }
}

pub fn issue_token(claims: &Claims, secret: &str) -> Result<String, AppError> {
    encode(&Header::default(), claims, &EncodingKey::from_secret(secret.as_bytes()))
        .map_err(|e| AppError::Internal(format!("failed to encode JWT: {e}")))
}

pub fn validate_token(token: &str, secret: &str) -> Result<Claims, AppError> {
    decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &Validation::default())
        .map(|data| data.claims)
        .map_err(|_| AppError::unauthorized("Invalid token"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::user::fixtures::user;

    #[test]
    fn test_round_trip() {
        let mut u = user("admin@test.com");
        u.is_admin = true;
        let claims = Claims::for_user(&u, 30);
        let token = issue_token(&claims, "secret").unwrap();
        let decoded = validate_token(&token, "secret").unwrap();
        assert_eq!(decoded, claims);
        assert!(decoded.is_admin);
        assert!(decoded.exp > decoded.iat);
    }

    #[test]
    fn test_wrong_secret_and_expired() {
        let u = user("a@test.com");
        let token = issue_token(&Claims::for_user(&u, 1), "secret").unwrap();
        assert!(matches!(validate_token(&token, "other"), Err(AppError::Unauthorized(_))));

        let expired = issue_token(&Claims::for_user(&u, -2), "secret").unwrap();
        assert!(validate_token(&expired, "secret").is_err());
    }

    #[test]
    fn test_super_admin_implies_admin() {
        let mut u = user("root@test.com");
        u.is_super_admin = true;
        assert!(Claims::for_user(&u, 1).is_admin);
    }
}
