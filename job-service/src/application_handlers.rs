use std::io::{Cursor, Read};

use axum::{
    extract::{Multipart, State},
    Json,
};
use common_auth::AuthContext;
use common_http_errors::{ApiError, ApiResult};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{error, warn};
use uuid::Uuid;
use zip::ZipArchive;

use crate::storage::{merge_metadata, object_key, ObjectStorage};
use crate::AppState;

const ZIP_RESUME_EXTENSIONS: &[&str] = &[".pdf", ".docx"];

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub message: &'static str,
}

struct CandidateUpload {
    organization_id: Uuid,
    job_id: Uuid,
    candidate_id: Uuid,
    file_name: String,
    data: Vec<u8>,
}

/// Stores a candidate's resume. A `.zip` upload is expanded and only its
/// `.pdf`/`.docx` members are kept; anything else is stored as-is under the
/// `resume` key.
pub async fn upload_resume(
    State(state): State<AppState>,
    ctx: AuthContext,
    multipart: Multipart,
) -> ApiResult<Json<UploadResponse>> {
    let upload = collect_candidate_upload(multipart, "resumeFile").await?;
    ensure_caller_org(&ctx, upload.organization_id)?;

    if file_extension(&upload.file_name) == ".zip" {
        store_zip_resumes(&state, &upload).await?;
        state.metrics.upload("resume_zip");
        return Ok(Json(UploadResponse {
            message: "Resume processed and stored successfully.",
        }));
    }

    let key = object_key(
        upload.organization_id,
        upload.job_id,
        upload.candidate_id,
        "resume",
        &file_extension(&upload.file_name),
    );
    state
        .storage
        .put(&key, upload.data)
        .await
        .map_err(internal_storage)?;

    let mut updates = Map::new();
    updates.insert(
        "resume_filename".to_string(),
        Value::String(upload.file_name.clone()),
    );
    merge_metadata(
        state.storage.as_ref(),
        upload.organization_id,
        upload.job_id,
        upload.candidate_id,
        updates,
    )
    .await
    .map_err(internal_storage)?;

    state.metrics.upload("resume");
    Ok(Json(UploadResponse {
        message: "Resume processed and stored successfully.",
    }))
}

pub async fn upload_cover_letter(
    State(state): State<AppState>,
    ctx: AuthContext,
    multipart: Multipart,
) -> ApiResult<Json<UploadResponse>> {
    let upload = collect_candidate_upload(multipart, "coverLetterFile").await?;
    ensure_caller_org(&ctx, upload.organization_id)?;

    if file_extension(&upload.file_name) == ".zip" {
        return Err(ApiError::validation(
            "Zip files are not supported for cover letters",
        ));
    }

    let key = object_key(
        upload.organization_id,
        upload.job_id,
        upload.candidate_id,
        "cover_letter",
        &file_extension(&upload.file_name),
    );
    state
        .storage
        .put(&key, upload.data)
        .await
        .map_err(internal_storage)?;

    let mut updates = Map::new();
    updates.insert(
        "cover_letter_filename".to_string(),
        Value::String(upload.file_name.clone()),
    );
    merge_metadata(
        state.storage.as_ref(),
        upload.organization_id,
        upload.job_id,
        upload.candidate_id,
        updates,
    )
    .await
    .map_err(internal_storage)?;

    state.metrics.upload("cover_letter");
    Ok(Json(UploadResponse {
        message: "Cover letter stored successfully.",
    }))
}

/// Merges a raw JSON body into the candidate's metadata.json. The three id
/// fields are required; everything in the body is merged verbatim.
pub async fn upload_metadata(
    State(state): State<AppState>,
    ctx: AuthContext,
    Json(body): Json<Map<String, Value>>,
) -> ApiResult<Json<UploadResponse>> {
    let organization_id = required_id(&body, "organization_id")?;
    let job_id = required_id(&body, "job_id")?;
    let candidate_id = required_id(&body, "candidate_id")?;
    ensure_caller_org(&ctx, organization_id)?;

    merge_metadata(
        state.storage.as_ref(),
        organization_id,
        job_id,
        candidate_id,
        body,
    )
    .await
    .map_err(internal_storage)?;

    state.metrics.upload("metadata");
    Ok(Json(UploadResponse {
        message: "Metadata stored successfully.",
    }))
}

async fn collect_candidate_upload(
    mut multipart: Multipart,
    file_field: &str,
) -> Result<CandidateUpload, ApiError> {
    let mut organization_id = None;
    let mut job_id = None;
    let mut candidate_id = None;
    let mut file = None;

    while let Some(field) = multipart.next_field().await.map_err(|err| {
        ApiError::validation(format!("Malformed multipart request: {err}"))
    })? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };

        if name == file_field {
            let file_name = field
                .file_name()
                .map(str::to_string)
                .ok_or_else(|| ApiError::validation("Uploaded file must have a filename"))?;
            let data = field.bytes().await.map_err(|err| {
                ApiError::validation(format!("Failed to read uploaded file: {err}"))
            })?;
            file = Some((file_name, data.to_vec()));
            continue;
        }

        let text = field.text().await.map_err(|err| {
            ApiError::validation(format!("Malformed multipart field '{name}': {err}"))
        })?;
        match name.as_str() {
            "organization_id" => organization_id = Some(parse_id(&name, &text)?),
            "job_id" => job_id = Some(parse_id(&name, &text)?),
            "candidate_id" => candidate_id = Some(parse_id(&name, &text)?),
            _ => {}
        }
    }

    let (organization_id, job_id, candidate_id) = match (organization_id, job_id, candidate_id) {
        (Some(org), Some(job), Some(candidate)) => (org, job, candidate),
        _ => {
            return Err(ApiError::validation(
                "organization_id, job_id, and candidate_id are required",
            ))
        }
    };
    let (file_name, data) = file.ok_or_else(|| {
        ApiError::validation(format!("Could not retrieve '{file_field}' from request"))
    })?;

    Ok(CandidateUpload {
        organization_id,
        job_id,
        candidate_id,
        file_name,
        data,
    })
}

/// Expands a zip upload and stores its resume-like members. Extraction is
/// synchronous and finishes before any object write, so the archive handle
/// never crosses an await point.
async fn store_zip_resumes(state: &AppState, upload: &CandidateUpload) -> Result<(), ApiError> {
    for (ext, data) in extract_zip_resumes(&upload.data)? {
        let key = object_key(
            upload.organization_id,
            upload.job_id,
            upload.candidate_id,
            "resume",
            &ext,
        );
        state.storage.put(&key, data).await.map_err(internal_storage)?;
    }

    Ok(())
}

/// Only `.pdf`/`.docx` members are kept; a member that fails to read is
/// skipped rather than failing the whole upload.
fn extract_zip_resumes(data: &[u8]) -> Result<Vec<(String, Vec<u8>)>, ApiError> {
    let mut archive = ZipArchive::new(Cursor::new(data))
        .map_err(|err| ApiError::validation(format!("Could not read zip file: {err}")))?;

    let mut members = Vec::new();
    for index in 0..archive.len() {
        let mut member = match archive.by_index(index) {
            Ok(member) => member,
            Err(err) => {
                warn!(index, error = ?err, "Skipping unreadable zip member");
                continue;
            }
        };

        let member_name = member.name().to_string();
        let ext = file_extension(&member_name);
        if !ZIP_RESUME_EXTENSIONS.contains(&ext.as_str()) {
            continue;
        }

        let mut bytes = Vec::with_capacity(member.size() as usize);
        if let Err(err) = member.read_to_end(&mut bytes) {
            warn!(member = %member_name, error = ?err, "Skipping unreadable zip member");
            continue;
        }
        members.push((ext, bytes));
    }

    Ok(members)
}

fn ensure_caller_org(ctx: &AuthContext, organization_id: Uuid) -> Result<(), ApiError> {
    if ctx.organization_id() != organization_id {
        return Err(ApiError::forbidden("forbidden"));
    }
    Ok(())
}

fn parse_id(name: &str, value: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(value.trim())
        .map_err(|_| ApiError::validation(format!("Field '{name}' must be a valid UUID")))
}

fn required_id(body: &Map<String, Value>, field: &str) -> Result<Uuid, ApiError> {
    let value = body
        .get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| {
            ApiError::validation("organization_id, job_id, and candidate_id are required in JSON body")
        })?;
    parse_id(field, value)
}

fn file_extension(name: &str) -> String {
    match std::path::Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
    {
        Some(ext) => format!(".{ext}"),
        None => String::new(),
    }
}

fn internal_storage(err: crate::storage::StorageError) -> ApiError {
    error!(error = ?err, "Object store operation failed");
    ApiError::internal("Failed to store uploaded file")
}
