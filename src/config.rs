//! Process configuration, read once from the environment at startup.

use thiserror::Error;

#[derive(Clone, Debug)]
pub struct MercadoPagoConfig {
    pub access_token: String,
}

#[derive(Clone, Debug)]
pub struct SmtpConfig {
    pub host: String,
    pub user: String,
    pub password: String,
    pub from: String,
    /// Copy of every approved-order mail goes here.
    pub store_mail: String,
}

#[derive(Clone, Debug)]
pub struct CloudinaryConfig {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
}

#[derive(Clone, Debug)]
pub struct GoogleConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_url: String,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub database_max_connections: u32,
    pub port: u16,
    pub jwt_secret: String,
    pub jwt_ttl_days: i64,
    pub app_base_url: String,
    pub frontend_url: String,
    pub currency: String,
    pub force_payment_success: bool,
    pub mercadopago: Option<MercadoPagoConfig>,
    pub smtp: Option<SmtpConfig>,
    pub cloudinary: Option<CloudinaryConfig>,
    pub google: Option<GoogleConfig>,
    pub nats_url: Option<String>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    #[error("invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup; blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let required = |key: &'static str| get(key).ok_or(ConfigError::Missing(key));

        let mercadopago = get("MP_ACCESS_TOKEN").map(|access_token| MercadoPagoConfig { access_token });

        let smtp = match (get("SMTP_HOST"), get("SMTP_USER"), get("SMTP_PASSWORD")) {
            (Some(host), Some(user), Some(password)) => {
                let from = get("MAIL_FROM").unwrap_or_else(|| format!("RepuStore <{user}>"));
                let store_mail = get("STORE_MAIL").unwrap_or_else(|| user.clone());
                Some(SmtpConfig { host, user, password, from, store_mail })
            }
            _ => None,
        };

        let cloudinary = match (get("CLOUD_NAME"), get("CLOUDINARY_API_KEY"), get("CLOUDINARY_API_SECRET")) {
            (Some(cloud_name), Some(api_key), Some(api_secret)) => Some(CloudinaryConfig { cloud_name, api_key, api_secret }),
            _ => None,
        };

        let google = match (get("GOOGLE_CLIENT_ID"), get("GOOGLE_CLIENT_SECRET"), get("GOOGLE_REDIRECT_URL")) {
            (Some(client_id), Some(client_secret), Some(redirect_url)) => Some(GoogleConfig { client_id, client_secret, redirect_url }),
            _ => None,
        };

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            database_max_connections: parse_or(&get, "DATABASE_MAX_CONNECTIONS", 10)?,
            port: parse_or(&get, "PORT", 3000)?,
            jwt_secret: required("JWT_SECRET")?,
            jwt_ttl_days: parse_or(&get, "JWT_TTL_DAYS", 30)?,
            app_base_url: get("APP_BASE_URL").unwrap_or_else(|| "http://localhost:3000".into()).trim_end_matches('/').to_string(),
            frontend_url: get("FRONTEND_URL").unwrap_or_else(|| "http://localhost:3001".into()).trim_end_matches('/').to_string(),
            currency: get("CURRENCY").unwrap_or_else(|| "ARS".into()).to_uppercase(),
            force_payment_success: parse_bool(&get, "FORCE_PAYMENT_SUCCESS")?,
            mercadopago,
            smtp,
            cloudinary,
            google,
            nats_url: get("NATS_URL"),
        })
    }
}

fn parse_or<T, G>(get: &G, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        None => Ok(default),
        Some(value) => value.parse().map_err(|_| ConfigError::Invalid { key, value }),
    }
}

fn parse_bool<G>(get: &G, key: &'static str) -> Result<bool, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    match get(key).as_deref().map(str::to_ascii_lowercase).as_deref() {
        None | Some("false") | Some("0") | Some("no") => Ok(false),
        Some("true") | Some("1") | Some("yes") => Ok(true),
        Some(other) => Err(ConfigError::Invalid { key, value: other.to_string() }),
    }
}
