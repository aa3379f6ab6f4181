use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::{distributions::Alphanumeric, Rng};
use validator::ValidationError;

use crate::error::AppError;

const SPECIALS: &str = "!@#$%^&*";

pub fn hash_password(plain: &str) -> Result<String, AppError> {
    let salt_bytes: [u8; 16] = rand::thread_rng().gen();
    let salt = SaltString::encode_b64(&salt_bytes).map_err(|e| AppError::Internal(e.to_string()))?;
    Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(e.to_string()))
}

/// False for malformed hashes and for accounts without a local password.
pub fn verify_password(plain: &str, hash: &str) -> bool {
    if hash.is_empty() { return false; }
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default().verify_password(plain.as_bytes(), &parsed).is_ok(),
        Err(_) => false,
    }
}

/// 8 to 15 characters with lower, upper, digit and one of `!@#$%^&*`.
pub fn validate_password_policy(password: &str) -> Result<(), ValidationError> {
    let len = password.chars().count();
    let ok = (8..=15).contains(&len)
        && password.chars().any(|c| c.is_ascii_lowercase())
        && password.chars().any(|c| c.is_ascii_uppercase())
        && password.chars().any(|c| c.is_ascii_digit())
        && password.chars().any(|c| SPECIALS.contains(c));
    if ok {
        Ok(())
    } else {
        let mut err = ValidationError::new("password_policy");
        err.message = Some(
            "Password must be 8-15 characters and include upper and lower case letters, a number and one of !@#$%^&*".into(),
        );
        Err(err)
    }
}

pub fn verification_token() -> String {
    rand::thread_rng().sample_iter(&Alphanumeric).take(48).map(char::from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("Secr3t!pw").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("Secr3t!pw", &hash));
        assert!(!verify_password("wrong", &hash));
        assert!(!verify_password("Secr3t!pw", ""));
        assert!(!verify_password("Secr3t!pw", "not-a-hash"));
    }

    #[test]
    fn test_password_policy() {
        assert!(validate_password_policy("Abcdef1!").is_ok());
        assert!(validate_password_policy("abcdef1!").is_err());
        assert!(validate_password_policy("ABCDEF1!").is_err());
        assert!(validate_password_policy("Abcdefg!").is_err());
        assert!(validate_password_policy("Abcdefg1").is_err());
        assert!(validate_password_policy("Ab1!").is_err());
        assert!(validate_password_policy("Abcdefghijkl1!xy").is_err());
    }

    #[test]
    fn test_verification_token() {
        let a = verification_token();
        assert_eq!(a.len(), 48);
        assert_ne!(a, verification_token());
    }
}
