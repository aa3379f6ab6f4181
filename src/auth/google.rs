//! Google sign-in (OAuth 2.0 authorization-code flow).

use serde::Deserialize;

use crate::config::GoogleConfig;
use crate::error::AppError;

const AUTHORIZE_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v3/userinfo";

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct GoogleProfile {
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub picture: Option<String>,
}

impl GoogleProfile {
    pub fn display_name(&self) -> String {
        match self.name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
            Some(name) => name.to_string(),
            None => self.email.split('@').next().unwrap_or_default().to_string(),
        }
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

pub fn authorize_url(config: &GoogleConfig, state: &str) -> String {
    format!(
        "{AUTHORIZE_URL}?client_id={}&redirect_uri={}&response_type=code&scope={}&state={}&prompt=select_account",
        urlencoding::encode(&config.client_id),
        urlencoding::encode(&config.redirect_url),
        urlencoding::encode("openid email profile"),
        urlencoding::encode(state),
    )
}

/// Trades the callback code for an access token and reads the profile with it.
pub async fn fetch_profile(http: &reqwest::Client, config: &GoogleConfig, code: &str) -> Result<GoogleProfile, AppError> {
    let upstream = |e: reqwest::Error| AppError::Upstream(format!("Google OAuth failed: {e}"));
    let token: TokenResponse = http
        .post(TOKEN_URL)
        .form(&[
            ("code", code),
            ("client_id", config.client_id.as_str()),
            ("client_secret", config.client_secret.as_str()),
            ("redirect_uri", config.redirect_url.as_str()),
            ("grant_type", "authorization_code"),
        ])
        .send()
        .await
        .and_then(|r| r.error_for_status())
        .map_err(upstream)?
        .json()
        .await
        .map_err(upstream)?;

    http.get(USERINFO_URL)
        .bearer_auth(token.access_token)
        .send()
        .await
        .and_then(|r| r.error_for_status())
        .map_err(upstream)?
        .json()
        .await
        .map_err(upstream)
}
