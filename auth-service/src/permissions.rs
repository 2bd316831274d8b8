use axum::{
    extract::{Path, State},
    Json,
};
use common_auth::AuthContext;
use common_http_errors::{ApiError, ApiResult};
use serde::Serialize;
use tracing::error;
use uuid::Uuid;

use crate::store::{AuthStore, RoleRecord};
use crate::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Home,
    CreateJob,
    ViewJob,
    Iam,
}

impl Capability {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "home" => Some(Self::Home),
            "create_job" => Some(Self::CreateJob),
            "view_job" => Some(Self::ViewJob),
            "iam" => Some(Self::Iam),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Home => "home",
            Self::CreateJob => "create_job",
            Self::ViewJob => "view_job",
            Self::Iam => "iam",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct CapabilitySet {
    pub home: bool,
    pub create_job: bool,
    pub view_job: bool,
    pub iam: bool,
}

impl CapabilitySet {
    pub fn allows(&self, capability: Capability) -> bool {
        match capability {
            Capability::Home => self.home,
            Capability::CreateJob => self.create_job,
            Capability::ViewJob => self.view_job,
            Capability::Iam => self.iam,
        }
    }
}

impl From<&RoleRecord> for CapabilitySet {
    fn from(role: &RoleRecord) -> Self {
        Self {
            home: role.home,
            create_job: role.create_job,
            view_job: role.view_job,
            iam: role.iam,
        }
    }
}

/// Capability resolution for internal authorization checks. A dangling or
/// unassigned role resolves to the empty set: deny by default.
pub(crate) async fn capabilities_for_role(
    store: &AuthStore,
    role_id: Uuid,
) -> Result<CapabilitySet, sqlx::Error> {
    Ok(store
        .find_role(role_id)
        .await?
        .map(|role| CapabilitySet::from(&role))
        .unwrap_or_default())
}

#[derive(Debug, Serialize)]
pub struct PermissionsResponse {
    pub role_id: Uuid,
    pub permissions: CapabilitySet,
}

#[derive(Debug, Serialize)]
pub struct CapabilityCheckResponse {
    pub role_id: Uuid,
    pub capability: String,
    pub allowed: bool,
}

pub async fn role_permissions(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(role_id): Path<Uuid>,
) -> ApiResult<Json<PermissionsResponse>> {
    let role = load_scoped_role(&state, &ctx, role_id).await?;
    Ok(Json(PermissionsResponse {
        role_id,
        permissions: CapabilitySet::from(&role),
    }))
}

pub async fn check_role_permission(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path((role_id, capability)): Path<(Uuid, String)>,
) -> ApiResult<Json<CapabilityCheckResponse>> {
    let role = load_scoped_role(&state, &ctx, role_id).await?;

    // Unknown capability names deny rather than error.
    let allowed = match Capability::parse(&capability) {
        Some(cap) => CapabilitySet::from(&role).allows(cap),
        None => false,
    };

    Ok(Json(CapabilityCheckResponse {
        role_id,
        capability,
        allowed,
    }))
}

/// Roles are only visible inside their own organization; a role belonging
/// to another tenant is reported as missing, not forbidden.
async fn load_scoped_role(
    state: &AppState,
    ctx: &AuthContext,
    role_id: Uuid,
) -> Result<RoleRecord, ApiError> {
    let role = state
        .store
        .find_role(role_id)
        .await
        .map_err(|err| {
            error!(error = ?err, "Failed to load role");
            ApiError::internal("Database error")
        })?
        .ok_or_else(|| ApiError::not_found("role_not_found"))?;

    if role.organization_id != ctx.organization_id() {
        return Err(ApiError::not_found("role_not_found"));
    }

    Ok(role)
}
