use std::net::SocketAddr;

use anyhow::Context;
use axum::http::HeaderValue;
use env_helpers::{get_env, get_env_default};
use secrecy::SecretString;
use url::Url;

use crate::application::use_cases::{approval::DEFAULT_GRANT_ATTEMPTS, trial::DEFAULT_TRIAL_DAYS};

pub struct AppConfig {
    pub database_url: String,
    pub bind_addr: SocketAddr,
    /// Verifies session tokens issued by the auth service.
    pub jwt_secret: SecretString,
    /// Base for links in notifications and emails.
    pub app_origin: Url,
    pub cors_origin: HeaderValue,
    pub resend_api_key: SecretString,
    pub email_from: String,
    pub trial_days: i64,
    /// Attempts at the entitlement grant after an approval commits.
    pub grant_retry_attempts: u32,
    pub log_file: String,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url: String = get_env("DATABASE_URL");
        let bind_addr: SocketAddr =
            get_env_default("BIND_ADDR", SocketAddr::from(([127, 0, 0, 1], 3001)));
        let jwt_secret = SecretString::new(get_env::<String>("JWT_SECRET").into());
        let app_origin: Url = get_env("APP_ORIGIN");
        let cors_origin: HeaderValue =
            get_env_default("CORS_ORIGIN", String::from("http://localhost:3000"))
                .parse()
                .context("CORS_ORIGIN must be a valid header value")?;
        let resend_api_key = SecretString::new(get_env::<String>("RESEND_API_KEY").into());
        let email_from: String = get_env("EMAIL_FROM");
        let trial_days: i64 = get_env_default("TRIAL_DAYS", DEFAULT_TRIAL_DAYS);
        let grant_retry_attempts: u32 =
            get_env_default("GRANT_RETRY_ATTEMPTS", DEFAULT_GRANT_ATTEMPTS);
        let log_file: String = get_env_default("LOG_FILE", "app.log".to_string());

        if trial_days <= 0 {
            anyhow::bail!("TRIAL_DAYS must be positive, got {trial_days}");
        }

        Ok(Self {
            database_url,
            bind_addr,
            jwt_secret,
            app_origin,
            cors_origin,
            resend_api_key,
            email_from,
            trial_days,
            grant_retry_attempts: grant_retry_attempts.max(1),
            log_file,
        })
    }
}
