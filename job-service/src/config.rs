use anyhow::{anyhow, Context, Result};
use std::env;
use std::path::PathBuf;

/// Uploads above this size are rejected at the body-limit layer.
const DEFAULT_MAX_UPLOAD_BYTES: usize = 30 << 20;

#[derive(Debug, Clone)]
pub struct JobConfig {
    /// Shared with the auth service; this service only verifies tokens.
    pub token_secret: String,
    /// Base URL of the frontend; job links are derived from it.
    pub public_base_url: String,
    /// Directory backing the local object store.
    pub storage_root: PathBuf,
    pub max_upload_bytes: usize,
}

pub fn load_job_config() -> Result<JobConfig> {
    let token_secret = env::var("AUTH_TOKEN_SECRET")
        .ok()
        .and_then(|value| normalize_optional(&value))
        .ok_or_else(|| anyhow!("AUTH_TOKEN_SECRET must be set to a non-empty value"))?;

    let public_base_url = env::var("JOB_PUBLIC_BASE_URL")
        .ok()
        .and_then(|value| normalize_optional(&value))
        .unwrap_or_else(|| "http://localhost:3000".to_string())
        .trim_end_matches('/')
        .to_string();

    let storage_root = env::var("JOB_STORAGE_ROOT")
        .ok()
        .and_then(|value| normalize_optional(&value))
        .unwrap_or_else(|| "uploads".to_string());

    let max_upload_bytes = match env::var("JOB_MAX_UPLOAD_BYTES") {
        Ok(value) => value
            .trim()
            .parse::<usize>()
            .context("Failed to parse JOB_MAX_UPLOAD_BYTES")?,
        Err(_) => DEFAULT_MAX_UPLOAD_BYTES,
    };

    Ok(JobConfig {
        token_secret,
        public_base_url,
        storage_root: PathBuf::from(storage_root),
        max_upload_bytes,
    })
}

fn normalize_optional(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
