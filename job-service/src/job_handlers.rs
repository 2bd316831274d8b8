use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use common_auth::AuthContext;
use common_http_errors::{ApiError, ApiResult};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use tracing::error;
use uuid::Uuid;

use crate::AppState;

#[derive(Deserialize)]
pub struct CreateJobRequest {
    pub title: String,
    pub organization_id: Uuid,
    pub description: String,
    pub location: Vec<String>,
    pub experience_level: String,
    pub skills_required: Vec<String>,
    pub employment_type: Vec<String>,
    pub salary_range: Vec<String>,
    pub is_active: bool,
}

#[derive(Debug, Serialize, FromRow)]
pub struct JobRow {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub created_by: Uuid,
    pub title: String,
    pub description: String,
    pub location: Vec<String>,
    pub experience_level: String,
    pub skills_required: Vec<String>,
    pub employment_type: Vec<String>,
    pub salary_range: Vec<String>,
    pub is_active: bool,
    pub application_count: i32,
    pub public_link: Option<String>,
    pub short_link: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct CreateJobResponse {
    pub message: &'static str,
    pub job: JobRow,
}

#[derive(Debug, Serialize)]
pub struct JobResponse {
    pub job: JobRow,
}

/// Creates a posting in the caller's organization. The creator is taken
/// from the verified claims, never from the body. Both links are derived
/// from the stored id and committed together with the row.
pub async fn create_job(
    State(state): State<AppState>,
    ctx: AuthContext,
    Json(req): Json<CreateJobRequest>,
) -> ApiResult<(StatusCode, Json<CreateJobResponse>)> {
    if req.title.trim().is_empty() {
        return Err(ApiError::validation("Job title is required"));
    }
    if req.description.trim().is_empty() {
        return Err(ApiError::validation("Job description is required"));
    }
    if req.organization_id != ctx.organization_id() {
        return Err(ApiError::forbidden("forbidden"));
    }

    let org_exists: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM organizations WHERE id = $1")
        .bind(req.organization_id)
        .fetch_optional(&state.db)
        .await
        .map_err(internal_db)?;
    if org_exists.is_none() {
        return Err(ApiError::not_found("organization_not_found"));
    }

    let job_id = Uuid::new_v4();
    let base = &state.config.public_base_url;
    let public_link = format!("{base}/job/{}/{job_id}", req.organization_id);
    let short_link = format!("{base}/job/{job_id}");

    let job = sqlx::query_as::<_, JobRow>(
        "INSERT INTO jobs (id, organization_id, created_by, title, description, location,
                           experience_level, skills_required, employment_type, salary_range,
                           is_active, public_link, short_link)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
         RETURNING id, organization_id, created_by, title, description, location,
                   experience_level, skills_required, employment_type, salary_range,
                   is_active, application_count, public_link, short_link, created_at",
    )
    .bind(job_id)
    .bind(req.organization_id)
    .bind(ctx.user_id())
    .bind(req.title.trim())
    .bind(req.description.trim())
    .bind(&req.location)
    .bind(&req.experience_level)
    .bind(&req.skills_required)
    .bind(&req.employment_type)
    .bind(&req.salary_range)
    .bind(req.is_active)
    .bind(&public_link)
    .bind(&short_link)
    .fetch_one(&state.db)
    .await
    .map_err(internal_db)?;

    state.metrics.job_created();
    Ok((
        StatusCode::CREATED,
        Json(CreateJobResponse {
            message: "Job created successfully",
            job,
        }),
    ))
}

pub async fn get_job(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(job_id): Path<Uuid>,
) -> ApiResult<Json<JobResponse>> {
    let job = sqlx::query_as::<_, JobRow>(
        "SELECT id, organization_id, created_by, title, description, location,
                experience_level, skills_required, employment_type, salary_range,
                is_active, application_count, public_link, short_link, created_at
         FROM jobs WHERE id = $1",
    )
    .bind(job_id)
    .fetch_optional(&state.db)
    .await
    .map_err(internal_db)?
    .ok_or_else(|| ApiError::not_found("job_not_found"))?;

    // Postings are tenant-scoped; other organizations' jobs look missing.
    if job.organization_id != ctx.organization_id() {
        return Err(ApiError::not_found("job_not_found"));
    }

    Ok(Json(JobResponse { job }))
}

pub async fn list_jobs(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(organization_id): Path<Uuid>,
) -> ApiResult<Json<Vec<JobRow>>> {
    if organization_id != ctx.organization_id() {
        return Err(ApiError::forbidden("forbidden"));
    }

    let jobs = sqlx::query_as::<_, JobRow>(
        "SELECT id, organization_id, created_by, title, description, location,
                experience_level, skills_required, employment_type, salary_range,
                is_active, application_count, public_link, short_link, created_at
         FROM jobs WHERE organization_id = $1
         ORDER BY created_at DESC",
    )
    .bind(organization_id)
    .fetch_all(&state.db)
    .await
    .map_err(internal_db)?;

    Ok(Json(jobs))
}

fn internal_db(err: sqlx::Error) -> ApiError {
    error!(error = ?err, "Database query failed");
    ApiError::internal("Database error")
}
