use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use chrono::{Duration, Utc};
use common_auth::AuthContext;
use common_http_errors::{ApiError, ApiResult};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};
use uuid::Uuid;

use crate::credentials::{generate_invite_token, hash_password, verify_password};
use crate::notifications::InviteNotifier;
use crate::permissions::capabilities_for_role;
use crate::store::StoreError;
use crate::AppState;

const MIN_PASSWORD_LEN: usize = 6;

#[derive(Deserialize)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
    pub organization_name: String,
}

#[derive(Debug, Serialize)]
pub struct SignupResponse {
    pub message: &'static str,
    pub user_id: Uuid,
    pub organization_id: Uuid,
    pub role_id: Uuid,
}

/// Creates an organization, its all-capability admin role, and the founding
/// user. The existence checks up front give friendly conflict messages; the
/// store's unique constraints close the race.
pub async fn signup(
    State(state): State<AppState>,
    Json(req): Json<SignupRequest>,
) -> ApiResult<(StatusCode, Json<SignupResponse>)> {
    let email = validate_email(&req.email)?;
    validate_password(&req.password)?;
    let organization_name = req.organization_name.trim();
    if organization_name.is_empty() {
        return Err(ApiError::validation("Organization name is required"));
    }

    if state
        .store
        .find_user_by_email(&email)
        .await
        .map_err(internal_db)?
        .is_some()
    {
        state.metrics.signup_attempt("email_taken");
        return Err(email_taken());
    }

    if state
        .store
        .organization_name_exists(organization_name)
        .await
        .map_err(internal_db)?
    {
        state.metrics.signup_attempt("organization_exists");
        return Err(organization_exists());
    }

    let password_hash = hash_password(&req.password).map_err(|err| {
        error!(%err, "Failed to hash password");
        ApiError::internal("Failed to hash password")
    })?;

    let provisioned = state
        .store
        .provision_organization(organization_name, &email, &password_hash)
        .await
        .map_err(|err| match err {
            StoreError::EmailTaken => email_taken(),
            StoreError::OrganizationExists => organization_exists(),
            other => {
                error!(error = ?other, "Signup persistence failed");
                ApiError::internal("Failed to create account")
            }
        })?;

    state.metrics.signup_attempt("success");
    Ok((
        StatusCode::CREATED,
        Json(SignupResponse {
            message: "Signup successful",
            user_id: provisioned.user_id,
            organization_id: provisioned.organization_id,
            role_id: provisioned.role_id,
        }),
    ))
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
    pub user_id: Uuid,
    pub role_id: Uuid,
    pub organization_id: Uuid,
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    let LoginRequest { email, password } = req;

    // Unknown email and wrong password return the identical error; the
    // response must not reveal which one it was.
    let user = match state
        .store
        .find_user_by_email(email.trim())
        .await
        .map_err(internal_db)?
    {
        Some(user) => user,
        None => {
            state.metrics.login_attempt("failure");
            return Err(invalid_credentials());
        }
    };

    if !verify_password(&password, &user.password_hash) {
        state.metrics.login_attempt("failure");
        return Err(invalid_credentials());
    }

    let issued = state
        .signer
        .issue(user.id, &user.email, user.role_id, user.organization_id)
        .map_err(|err| {
            error!(user_id = %user.id, error = ?err, "Failed to issue session token");
            ApiError::internal("Unable to issue session token")
        })?;

    state.metrics.login_attempt("success");
    Ok(Json(LoginResponse {
        access_token: issued.access_token,
        token_type: issued.token_type,
        expires_in: issued.expires_in,
        user_id: user.id,
        role_id: user.role_id,
        organization_id: user.organization_id,
    }))
}

#[derive(Deserialize)]
pub struct InviteRequest {
    pub email: String,
    pub role_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct InviteResponse {
    pub message: &'static str,
    pub invite_token: String,
}

/// Invites a new member into the caller's organization. Requires the `iam`
/// capability on the caller's resolved role.
pub async fn invite(
    State(state): State<AppState>,
    ctx: AuthContext,
    Json(req): Json<InviteRequest>,
) -> ApiResult<Json<InviteResponse>> {
    let email = validate_email(&req.email)?;

    let caps = capabilities_for_role(&state.store, ctx.role_id())
        .await
        .map_err(internal_db)?;
    if !caps.iam {
        state.metrics.invite_event("forbidden");
        return Err(ApiError::forbidden("forbidden"));
    }

    if state
        .store
        .find_user_by_email(&email)
        .await
        .map_err(internal_db)?
        .is_some()
    {
        return Err(email_taken());
    }

    // The invited role must exist inside the caller's organization; roles
    // from other tenants are reported as missing.
    let role = state
        .store
        .find_role(req.role_id)
        .await
        .map_err(internal_db)?
        .ok_or_else(|| ApiError::not_found("role_not_found"))?;
    if role.organization_id != ctx.organization_id() {
        return Err(ApiError::not_found("role_not_found"));
    }

    let token = generate_invite_token();
    let expires_at = Utc::now() + Duration::hours(state.config.invite_ttl_hours);

    let invite = state
        .store
        .create_invite(&email, ctx.organization_id(), req.role_id, &token, expires_at)
        .await
        .map_err(|err| {
            error!(error = ?err, "Failed to create invite");
            ApiError::internal("Failed to create invite")
        })?;

    // The invite row is already committed; a failed send is reported but
    // nothing is rolled back.
    if let Err(err) = state.notifier.send_invite(&email, &invite.token).await {
        warn!(to = %email, error = ?err, "Failed to send invite email");
        state.metrics.invite_event("notification_failed");
        return Err(ApiError::notification("Failed to send invite email"));
    }

    state.metrics.invite_event("created");
    Ok(Json(InviteResponse {
        message: "Invite created successfully",
        invite_token: invite.token,
    }))
}

#[derive(Deserialize)]
pub struct ValidateInviteParams {
    pub token: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ValidateInviteResponse {
    pub valid: bool,
    pub email: String,
    pub organization_id: Uuid,
    pub role_id: Uuid,
}

pub async fn validate_invite(
    State(state): State<AppState>,
    Query(params): Query<ValidateInviteParams>,
) -> ApiResult<Json<ValidateInviteResponse>> {
    let token = params.token.as_deref().map(str::trim).unwrap_or_default();
    if token.is_empty() {
        return Err(ApiError::validation("Invite token is required"));
    }

    let invite = state
        .store
        .find_invite_by_token(token)
        .await
        .map_err(internal_db)?
        .ok_or_else(|| ApiError::not_found("invite_not_found"))?;

    // The lookup matches lapsed-but-unaccepted invites; expiry is its own
    // check with its own error.
    if Utc::now() > invite.expires_at {
        return Err(ApiError::expired("invite_expired"));
    }

    Ok(Json(ValidateInviteResponse {
        valid: true,
        email: invite.email,
        organization_id: invite.organization_id,
        role_id: invite.role_id,
    }))
}

#[derive(Deserialize)]
pub struct AcceptInviteRequest {
    pub token: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AcceptInviteResponse {
    pub message: &'static str,
    pub user_id: Uuid,
    pub organization_id: Uuid,
}

pub async fn accept_invite(
    State(state): State<AppState>,
    Json(req): Json<AcceptInviteRequest>,
) -> ApiResult<(StatusCode, Json<AcceptInviteResponse>)> {
    let token = req.token.trim();
    if token.is_empty() {
        return Err(ApiError::validation("Invite token is required"));
    }
    validate_password(&req.password)?;

    let invite = state
        .store
        .find_invite_by_token(token)
        .await
        .map_err(internal_db)?
        .ok_or_else(|| ApiError::not_found("invite_not_found"))?;

    if Utc::now() > invite.expires_at {
        return Err(ApiError::expired("invite_expired"));
    }

    if state
        .store
        .find_user_by_email(&invite.email)
        .await
        .map_err(internal_db)?
        .is_some()
    {
        return Err(email_taken());
    }

    let password_hash = hash_password(&req.password).map_err(|err| {
        error!(%err, "Failed to hash password");
        ApiError::internal("Failed to hash password")
    })?;

    let user_id = state
        .store
        .consume_invite(&invite, &password_hash)
        .await
        .map_err(|err| match err {
            // A concurrent accept won the flag update; to this caller the
            // invite no longer exists.
            StoreError::InviteUnavailable => ApiError::not_found("invite_not_found"),
            StoreError::EmailTaken => email_taken(),
            other => {
                error!(error = ?other, "Accept-invite persistence failed");
                ApiError::internal("Failed to create account from invite")
            }
        })?;

    Ok((
        StatusCode::CREATED,
        Json(AcceptInviteResponse {
            message: "Account created successfully via invite",
            user_id,
            organization_id: invite.organization_id,
        }),
    ))
}

#[derive(Deserialize)]
pub struct RefreshTokenRequest {
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
pub struct RefreshTokenResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
}

/// Re-issues the presented token's claims with a fresh expiry. Stateless:
/// there is no rotation or revocation list.
pub async fn refresh_token(
    State(state): State<AppState>,
    Json(req): Json<RefreshTokenRequest>,
) -> ApiResult<Json<RefreshTokenResponse>> {
    let claims = state
        .verifier
        .verify(req.refresh_token.trim())
        .map_err(|_| ApiError::unauthorized("invalid_token"))?;

    let issued = state
        .signer
        .issue(
            claims.user_id,
            &claims.email,
            claims.role_id,
            claims.organization_id,
        )
        .map_err(|err| {
            error!(user_id = %claims.user_id, error = ?err, "Failed to re-issue session token");
            ApiError::internal("Unable to issue session token")
        })?;

    Ok(Json(RefreshTokenResponse {
        access_token: issued.access_token,
        token_type: issued.token_type,
        expires_in: issued.expires_in,
    }))
}

fn validate_email(email: &str) -> Result<String, ApiError> {
    let email = email.trim();
    let well_formed = match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.starts_with('.'),
        None => false,
    };
    if !well_formed {
        return Err(ApiError::validation("A valid email address is required"));
    }
    Ok(email.to_string())
}

fn validate_password(password: &str) -> Result<(), ApiError> {
    if password.len() < MIN_PASSWORD_LEN {
        return Err(ApiError::validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

fn invalid_credentials() -> ApiError {
    ApiError::unauthorized("invalid_credentials")
}

fn email_taken() -> ApiError {
    ApiError::conflict("email_taken", "Email already registered")
}

fn organization_exists() -> ApiError {
    ApiError::conflict(
        "organization_exists",
        "Organization already exists. Ask an admin for an invite.",
    )
}

fn internal_db(err: sqlx::Error) -> ApiError {
    error!(error = ?err, "Database query failed");
    ApiError::internal("Database error")
}
