//! Registration, sign-in, e-mail verification and Google login.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::auth::google::GoogleProfile;
use crate::auth::jwt::{issue_token, Claims};
use crate::auth::password::{hash_password, validate_password_policy, verification_token, verify_password};
use crate::domain::aggregates::{User, UserError};
use crate::domain::events::{DomainEvent, UserEvent};
use crate::domain::value_objects::Email;
use crate::error::{AppError, AppResult};
use crate::media::ImageUpload;
use crate::notifications::templates;
use crate::repository::users;
use crate::state::AppState;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewAccount {
    #[validate(email(message = "email must be an email"))]
    pub email: String,
    #[validate(length(min = 3, message = "name must be at least 3 characters"))]
    pub name: String,
    #[validate(custom = "validate_password_policy")]
    pub password: String,
    #[validate(must_match = "password")]
    pub confirm_password: String,
    #[validate(length(min = 5, max = 80))]
    pub address: String,
    #[validate(length(min = 1, message = "phone should not be empty"))]
    pub phone: String,
    #[validate(length(min = 5, max = 20))]
    pub country: String,
    #[validate(length(min = 5, max = 20))]
    pub city: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct Credentials {
    #[validate(email(message = "email must be an email"))]
    pub email: String,
    #[validate(length(min = 1, message = "password should not be empty"))]
    pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub img_url: Option<String>,
    pub is_admin: bool,
    pub is_super_admin: bool,
}

#[derive(Debug, Serialize)]
pub struct Session {
    pub access_token: String,
    pub user: SessionUser,
}

fn session_for(state: &AppState, user: &User) -> AppResult<Session> {
    let claims = Claims::for_user(user, state.config.jwt_ttl_days);
    Ok(Session {
        access_token: issue_token(&claims, &state.config.jwt_secret)?,
        user: SessionUser {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            img_url: user.img_url.clone(),
            is_admin: user.is_admin,
            is_super_admin: user.is_super_admin,
        },
    })
}

fn normalize_email(raw: &str) -> AppResult<Email> {
    Email::parse(raw).map_err(|e| AppError::bad_request(e.to_string()))
}

#[tracing::instrument(skip(state, account, avatar), fields(email = %account.email))]
pub async fn register(state: &AppState, account: NewAccount, avatar: Option<ImageUpload>) -> AppResult<User> {
    account.validate()?;
    let email = normalize_email(&account.email)?;
    if users::find_by_email(&state.db, email.as_str()).await?.is_some() {
        return Err(AppError::bad_request("User already registered"));
    }

    let img_url = match avatar {
        Some(image) => {
            image.validate()?;
            Some(state.images.upload(image).await?)
        }
        None => None,
    };

    let now = Utc::now();
    let user = User {
        id: Uuid::now_v7(),
        name: account.name.trim().to_string(),
        email: email.as_str().to_string(),
        password_hash: hash_password(&account.password)?,
        phone: Some(account.phone),
        country: Some(account.country),
        address: Some(account.address),
        city: Some(account.city),
        img_url,
        is_admin: false,
        is_super_admin: false,
        is_banned: false,
        is_verified: false,
        verification_token: Some(verification_token()),
        created_at: now,
        updated_at: now,
    };
    let user = users::insert(&state.db, &user).await?;
    tracing::info!(user_id = %user.id, "user registered");

    if let Some(token) = &user.verification_token {
        let url = format!("{}/auth/verify/{}", state.config.app_base_url, token);
        if let Err(e) = state.mailer.send(templates::verification_mail(&user.email, &user.name, &url)).await {
            tracing::warn!(user_id = %user.id, error = %e, "verification mail not sent");
        }
    }
    state
        .events
        .publish(vec![DomainEvent::User(UserEvent::Registered { user_id: user.id, email: user.email.clone() })])
        .await;
    Ok(user)
}

#[tracing::instrument(skip(state, credentials), fields(email = %credentials.email))]
pub async fn sign_in(state: &AppState, credentials: Credentials) -> AppResult<Session> {
    credentials.validate()?;
    let bad_credentials = || AppError::bad_request("Bad Credentials");
    let email = normalize_email(&credentials.email).map_err(|_| bad_credentials())?;
    let user = users::find_by_email(&state.db, email.as_str()).await?.ok_or_else(bad_credentials)?;
    user.ensure_can_sign_in()?;
    if !user.has_password() || !verify_password(&credentials.password, &user.password_hash) {
        return Err(bad_credentials());
    }
    session_for(state, &user)
}

pub async fn verify_account(state: &AppState, token: &str) -> AppResult<()> {
    let mut user = users::find_by_verification_token(&state.db, token)
        .await?
        .ok_or_else(|| AppError::bad_request("Invalid or expired token"))?;
    user.verify();
    users::save(&state.db, &user).await?;
    tracing::info!(user_id = %user.id, "account verified");
    Ok(())
}

/// Signs in, or signs up, the owner of a Google profile.
///
/// Accounts created here are verified and have no local password.
#[tracing::instrument(skip(state, profile), fields(email = %profile.email))]
pub async fn google_login(state: &AppState, profile: GoogleProfile) -> AppResult<Session> {
    let email = normalize_email(&profile.email)?;
    let user = match users::find_by_email(&state.db, email.as_str()).await? {
        Some(mut existing) => {
            if existing.is_banned {
                return Err(UserError::Banned.into());
            }
            if existing.img_url.is_none() && profile.picture.is_some() {
                existing.img_url = profile.picture.clone();
                existing = users::save(&state.db, &existing).await?;
            }
            existing
        }
        None => {
            let now = Utc::now();
            let user = User {
                id: Uuid::now_v7(),
                name: profile.display_name(),
                email: email.as_str().to_string(),
                password_hash: String::new(),
                phone: None,
                country: None,
                address: None,
                city: None,
                img_url: profile.picture.clone(),
                is_admin: false,
                is_super_admin: false,
                is_banned: false,
                is_verified: true,
                verification_token: None,
                created_at: now,
                updated_at: now,
            };
            let user = users::insert(&state.db, &user).await?;
            tracing::info!(user_id = %user.id, "user registered through Google");
            state
                .events
                .publish(vec![DomainEvent::User(UserEvent::Registered { user_id: user.id, email: user.email.clone() })])
                .await;
            user
        }
    };
    session_for(state, &user)
}

/// Where the browser lands after a Google login: the front end reads the
/// session from the `data` query parameter.
pub fn frontend_redirect(frontend_url: &str, session: &Session) -> AppResult<String> {
    let payload = serde_json::to_string(session).map_err(|e| AppError::Internal(e.to_string()))?;
    Ok(format!("{frontend_url}/home?data={}", urlencoding::encode(&payload)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account() -> NewAccount {
        NewAccount {
            email: "ana@example.com".into(),
            name: "Ana Perez".into(),
            password: "Secr3t!pw".into(),
            confirm_password: "Secr3t!pw".into(),
            address: "Av. Colon 1234".into(),
            phone: "3512345678".into(),
            country: "Argentina".into(),
            city: "Cordoba".into(),
        }
    }

    #[test]
    fn test_new_account_validation() {
        assert!(account().validate().is_ok());

        let mut mismatch = account();
        mismatch.confirm_password = "Other1!pw".into();
        let errors = mismatch.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("confirm_password"));

        let mut weak = account();
        weak.password = "password".into();
        weak.confirm_password = "password".into();
        assert!(weak.validate().unwrap_err().field_errors().contains_key("password"));

        let mut bad_email = account();
        bad_email.email = "not-an-email".into();
        assert!(bad_email.validate().unwrap_err().field_errors().contains_key("email"));
    }

    #[test]
    fn test_frontend_redirect_encodes_session() {
        let session = Session {
            access_token: "tok".into(),
            user: SessionUser {
                id: Uuid::nil(),
                name: "Ana".into(),
                email: "ana@example.com".into(),
                img_url: None,
                is_admin: false,
                is_super_admin: false,
            },
        };
        let url = frontend_redirect("http://localhost:3001", &session).unwrap();
        assert!(url.starts_with("http://localhost:3001/home?data=%7B%22access_token%22%3A%22tok%22"));
        assert!(!url.contains(' '));
    }
}
