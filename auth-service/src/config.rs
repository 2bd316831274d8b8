use anyhow::{anyhow, Context, Result};
use std::env;

/// SMTP relay settings for invite emails. Absent entirely when no relay is
/// configured; the service then runs with a no-op notifier.
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub sender: String,
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub token_secret: String,
    pub token_ttl_seconds: i64,
    pub invite_ttl_hours: i64,
    /// Base URL of the frontend; invite links are built from it.
    pub public_base_url: String,
    pub smtp: Option<SmtpConfig>,
}

pub fn load_auth_config() -> Result<AuthConfig> {
    let token_secret = env::var("AUTH_TOKEN_SECRET")
        .ok()
        .and_then(|value| normalize_optional(&value))
        .ok_or_else(|| anyhow!("AUTH_TOKEN_SECRET must be set to a non-empty value"))?;

    let token_ttl_seconds = int_from_env("AUTH_TOKEN_TTL_SECONDS")?.unwrap_or(3600);
    if token_ttl_seconds <= 0 {
        return Err(anyhow!("AUTH_TOKEN_TTL_SECONDS must be positive"));
    }

    let invite_ttl_hours = int_from_env("AUTH_INVITE_TTL_HOURS")?.unwrap_or(48);
    if invite_ttl_hours <= 0 {
        return Err(anyhow!("AUTH_INVITE_TTL_HOURS must be positive"));
    }

    let public_base_url = env::var("AUTH_PUBLIC_BASE_URL")
        .ok()
        .and_then(|value| normalize_optional(&value))
        .unwrap_or_else(|| "http://localhost:3000".to_string())
        .trim_end_matches('/')
        .to_string();

    Ok(AuthConfig {
        token_secret,
        token_ttl_seconds,
        invite_ttl_hours,
        public_base_url,
        smtp: load_smtp_config()?,
    })
}

fn load_smtp_config() -> Result<Option<SmtpConfig>> {
    let host = match env::var("SMTP_HOST").ok().and_then(|v| normalize_optional(&v)) {
        Some(host) => host,
        None => return Ok(None),
    };

    let port = match env::var("SMTP_PORT") {
        Ok(value) => value
            .trim()
            .parse::<u16>()
            .context("Failed to parse SMTP_PORT")?,
        Err(_) => 587,
    };

    let username = env::var("SMTP_USERNAME")
        .ok()
        .and_then(|v| normalize_optional(&v))
        .ok_or_else(|| anyhow!("SMTP_USERNAME must be set when SMTP_HOST is configured"))?;
    let password = env::var("SMTP_PASSWORD")
        .ok()
        .and_then(|v| normalize_optional(&v))
        .ok_or_else(|| anyhow!("SMTP_PASSWORD must be set when SMTP_HOST is configured"))?;

    let sender = env::var("SMTP_SENDER")
        .ok()
        .and_then(|v| normalize_optional(&v))
        .unwrap_or_else(|| username.clone());

    Ok(Some(SmtpConfig {
        host,
        port,
        username,
        password,
        sender,
    }))
}

fn int_from_env(key: &str) -> Result<Option<i64>> {
    match env::var(key) {
        Ok(value) => {
            let parsed = value
                .trim()
                .parse::<i64>()
                .with_context(|| format!("Failed to parse {key}"))?;
            Ok(Some(parsed))
        }
        Err(_) => Ok(None),
    }
}

fn normalize_optional(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
