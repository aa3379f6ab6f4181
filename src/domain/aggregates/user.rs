//! User Aggregate

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub phone: Option<String>,
    pub country: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub img_url: Option<String>,
    pub is_admin: bool,
    pub is_super_admin: bool,
    pub is_banned: bool,
    pub is_verified: bool,
    #[serde(skip_serializing)]
    pub verification_token: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Accounts created through Google have no local password.
    pub fn has_password(&self) -> bool { !self.password_hash.is_empty() }

    pub fn ensure_can_sign_in(&self) -> Result<(), UserError> {
        if self.is_banned { return Err(UserError::Banned); }
        if !self.is_verified { return Err(UserError::NotVerified); }
        Ok(())
    }

    pub fn verify(&mut self) {
        self.is_verified = true;
        self.verification_token = None;
        self.touch();
    }

    pub fn toggle_ban(&mut self) -> Result<(), UserError> {
        if self.is_super_admin { return Err(UserError::SuperAdminProtected); }
        self.is_banned = !self.is_banned;
        self.touch();
        Ok(())
    }

    pub fn toggle_admin(&mut self) -> Result<(), UserError> {
        if self.is_super_admin { return Err(UserError::SuperAdminProtected); }
        self.is_admin = !self.is_admin;
        self.touch();
        Ok(())
    }

    fn touch(&mut self) { self.updated_at = Utc::now(); }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UserError {
    #[error("User is banned")]
    Banned,
    #[error("Account not verified, check your email")]
    NotVerified,
    #[error("Super admin accounts cannot be modified")]
    SuperAdminProtected,
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn user(email: &str) -> User {
        let now = Utc::now();
        User {
            id: Uuid::now_v7(),
            name: "Juan Perez".into(),
            email: email.into(),
            password_hash: String::new(),
            phone: None,
            country: Some("Argentina".into()),
            address: None,
            city: Some("Rosario".into()),
            img_url: None,
            is_admin: false,
            is_super_admin: false,
            is_banned: false,
            is_verified: true,
            verification_token: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::user;
    use super::*;

    #[test]
    fn test_sign_in_rules() {
        let mut u = user("a@b.com");
        assert!(u.ensure_can_sign_in().is_ok());
        u.is_verified = false;
        assert_eq!(u.ensure_can_sign_in(), Err(UserError::NotVerified));
        u.is_banned = true;
        assert_eq!(u.ensure_can_sign_in(), Err(UserError::Banned));
    }

    #[test]
    fn test_verify_clears_token() {
        let mut u = user("a@b.com");
        u.is_verified = false;
        u.verification_token = Some("tok".into());
        u.verify();
        assert!(u.is_verified);
        assert!(u.verification_token.is_none());
    }

    #[test]
    fn test_super_admin_is_protected() {
        let mut u = user("root@b.com");
        u.toggle_admin().unwrap();
        assert!(u.is_admin);
        u.toggle_ban().unwrap();
        assert!(u.is_banned);
        u.is_super_admin = true;
        assert_eq!(u.toggle_ban(), Err(UserError::SuperAdminProtected));
        assert_eq!(u.toggle_admin(), Err(UserError::SuperAdminProtected));
    }

    #[test]
    fn test_serialization_hides_secrets() {
        let mut u = user("a@b.com");
        u.password_hash = "$argon2id$...".into();
        u.verification_token = Some("tok".into());
        let json = serde_json::to_value(&u).unwrap();
        assert!(json.get("passwordHash").is_none());
        assert!(json.get("verificationToken").is_none());
        assert_eq!(json["email"], "a@b.com");
    }
}
