use anyhow::{anyhow, Result};
use chrono::{DateTime, Duration, Utc};
use common_auth::WireClaims;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use uuid::Uuid;

pub struct TokenConfig {
    pub secret: String,
    pub ttl_seconds: i64,
}

/// Mints stateless session tokens. Verification lives in `common-auth` so
/// other services can check tokens without being able to mint them only by
/// convention; the secret is the real boundary.
pub struct TokenSigner {
    config: TokenConfig,
    encoding_key: EncodingKey,
}

pub struct IssuedToken {
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
    pub expires_in: i64,
    pub token_type: &'static str,
}

impl TokenSigner {
    pub fn new(config: TokenConfig) -> Self {
        let encoding_key = EncodingKey::from_secret(config.secret.as_bytes());
        Self {
            config,
            encoding_key,
        }
    }

    pub fn issue(
        &self,
        user_id: Uuid,
        email: &str,
        role_id: Uuid,
        organization_id: Uuid,
    ) -> Result<IssuedToken> {
        let now = Utc::now();
        let expires_at = now + Duration::seconds(self.config.ttl_seconds);

        let claims = WireClaims {
            sub: user_id.to_string(),
            email: email.to_string(),
            role: role_id.to_string(),
            org: organization_id.to_string(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };

        let access_token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|err| anyhow!("Failed to sign session token: {err}"))?;

        Ok(IssuedToken {
            access_token,
            expires_at,
            expires_in: self.config.ttl_seconds,
            token_type: "Bearer",
        })
    }
}
