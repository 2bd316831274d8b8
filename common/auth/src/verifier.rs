use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use tracing::debug;

use crate::claims::{SessionClaims, WireClaims};
use crate::config::JwtConfig;
use crate::error::{AuthError, AuthResult};

/// Validates session tokens minted by the auth service. Signature and
/// expiry are checked in one decode call.
#[derive(Clone)]
pub struct TokenVerifier {
    config: JwtConfig,
    decoding_key: DecodingKey,
}

impl TokenVerifier {
    pub fn new(config: JwtConfig) -> Self {
        let decoding_key = DecodingKey::from_secret(config.secret.as_bytes());
        Self {
            config,
            decoding_key,
        }
    }

    pub fn config(&self) -> &JwtConfig {
        &self.config
    }

    pub fn verify(&self, token: &str) -> AuthResult<SessionClaims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = self.config.leeway_seconds.into();

        let token_data =
            decode::<WireClaims>(token, &self.decoding_key, &validation).map_err(|err| {
                debug!(%err, "session token rejected");
                AuthError::Verification
            })?;

        SessionClaims::try_from(token_data.claims)
    }
}
