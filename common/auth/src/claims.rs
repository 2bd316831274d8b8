use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AuthError, AuthResult};

/// Application-facing representation of verified session-token claims.
#[derive(Debug, Clone)]
pub struct SessionClaims {
    pub user_id: Uuid,
    pub email: String,
    pub role_id: Uuid,
    pub organization_id: Uuid,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Claims as they travel inside the signed token. The issuer builds this
/// directly; the verifier converts it into [`SessionClaims`].
#[derive(Debug, Serialize, Deserialize)]
pub struct WireClaims {
    pub sub: String,
    pub email: String,
    pub role: String,
    pub org: String,
    pub iat: i64,
    pub exp: i64,
}

impl TryFrom<WireClaims> for SessionClaims {
    type Error = AuthError;

    // Structural problems collapse into the same rejection as a bad
    // signature; callers must not be able to tell which check failed.
    fn try_from(value: WireClaims) -> AuthResult<Self> {
        let user_id = Uuid::parse_str(&value.sub).map_err(|_| AuthError::Verification)?;
        let role_id = Uuid::parse_str(&value.role).map_err(|_| AuthError::Verification)?;
        let organization_id = Uuid::parse_str(&value.org).map_err(|_| AuthError::Verification)?;

        let issued_at = Utc
            .timestamp_opt(value.iat, 0)
            .single()
            .ok_or(AuthError::Verification)?;
        let expires_at = Utc
            .timestamp_opt(value.exp, 0)
            .single()
            .ok_or(AuthError::Verification)?;

        Ok(Self {
            user_id,
            email: value.email,
            role_id,
            organization_id,
            issued_at,
            expires_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wire(sub: &str, role: &str, org: &str) -> WireClaims {
        WireClaims {
            sub: sub.to_string(),
            email: "user@example.com".to_string(),
            role: role.to_string(),
            org: org.to_string(),
            iat: 1_700_000_000,
            exp: 1_700_003_600,
        }
    }

    #[test]
    fn converts_valid_wire_claims() {
        let user = Uuid::new_v4();
        let role = Uuid::new_v4();
        let org = Uuid::new_v4();
        let claims =
            SessionClaims::try_from(wire(&user.to_string(), &role.to_string(), &org.to_string()))
                .expect("claims");
        assert_eq!(claims.user_id, user);
        assert_eq!(claims.role_id, role);
        assert_eq!(claims.organization_id, org);
        assert_eq!(claims.expires_at.timestamp(), 1_700_003_600);
    }

    #[test]
    fn rejects_non_uuid_subject() {
        let role = Uuid::new_v4().to_string();
        let org = Uuid::new_v4().to_string();
        let err = SessionClaims::try_from(wire("not-a-uuid", &role, &org)).unwrap_err();
        assert!(matches!(err, AuthError::Verification));
    }
}
