//! Upload intake, status, confirmation and purge.

use std::path::{Path, PathBuf};

use axum::extract::{FromRequest, Multipart, Path as UrlPath, Request, State};
use axum::http::header::CONTENT_TYPE;
use axum::{Form, Json};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};
use uuid::Uuid;

use vpress_models::{
    sanitize_file_name, validate_job_id, validate_upload, JobId, JobMetadata, JobStatus, StatusReport,
};
use vpress_worker::SubmitReceipt;

use crate::auth::ServiceAuth;
use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::state::AppState;

/// Form field carrying the job id.
const JOB_ID_FIELD: &str = "video_id";
/// Form field carrying the upload.
const FILE_FIELD: &str = "file";

/// An upload written to disk, not yet submitted.
struct StoredUpload {
    path: PathBuf,
    size: u64,
}

/// Accept an upload and start its job.
///
/// Multipart fields: `file`, `video_id`, and any other text field, which
/// becomes job metadata. `video_id` is passed along as metadata too.
pub async fn receive_video(
    State(state): State<AppState>,
    _auth: ServiceAuth,
    mut multipart: Multipart,
) -> ApiResult<Json<SubmitReceipt>> {
    let mut upload: Option<StoredUpload> = None;
    let (job_id, metadata) = match read_form(&state, &mut multipart, &mut upload).await {
        Ok(form) => form,
        Err(e) => {
            if let Some(stored) = &upload {
                discard(&stored.path).await;
            }
            return Err(e);
        }
    };
    let stored = upload.ok_or_else(|| ApiError::bad_request("Missing file"))?;

    metrics::record_upload_bytes(stored.size);
    info!(job_id = %job_id, path = %stored.path.display(), size = stored.size, "Upload received");

    match state
        .orchestrator
        .submit(job_id, stored.path.clone(), metadata)
        .await
    {
        Ok(receipt) => Ok(Json(receipt)),
        Err(e) => {
            discard(&stored.path).await;
            Err(e.into())
        }
    }
}

/// Read every field, writing the file part to the upload directory.
///
/// `upload` is set as soon as a file starts being written so the caller can
/// remove it if anything later fails.
async fn read_form(
    state: &AppState,
    multipart: &mut Multipart,
    upload: &mut Option<StoredUpload>,
) -> ApiResult<(JobId, JobMetadata)> {
    let mut job_id: Option<String> = None;
    let mut metadata = JobMetadata::new();

    while let Some(mut field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();

        if name == FILE_FIELD {
            if upload.is_some() {
                return Err(ApiError::bad_request("Only one file per upload"));
            }
            let file_name = field
                .file_name()
                .map(str::to_string)
                .ok_or_else(|| ApiError::bad_request("File part has no file name"))?;
            validate_upload(&file_name, 0, state.config.max_upload_bytes)?;

            let path = state
                .upload_dir
                .join(format!("{}_{}", Uuid::new_v4(), sanitize_file_name(&file_name)));
            *upload = Some(StoredUpload {
                path: path.clone(),
                size: 0,
            });
            let size = write_field(&mut field, &path, state.config.max_upload_bytes).await?;
            *upload = Some(StoredUpload { path, size });
        } else {
            let value = field.text().await?;
            if name == JOB_ID_FIELD {
                job_id = Some(value.clone());
            }
            if !name.is_empty() {
                metadata.insert(name, value);
            }
        }
    }

    let job_id = job_id.ok_or_else(|| ApiError::bad_request("Missing video_id"))?;
    validate_job_id(&job_id)?;
    Ok((JobId::from(job_id), metadata))
}

/// Stream one multipart field to `path`, enforcing the size limit.
async fn write_field(
    field: &mut axum::extract::multipart::Field<'_>,
    path: &Path,
    max_bytes: u64,
) -> ApiResult<u64> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let mut file = tokio::fs::File::create(path).await?;
    let mut size = 0u64;

    while let Some(chunk) = field.chunk().await? {
        size += chunk.len() as u64;
        if size > max_bytes {
            return Err(ApiError::PayloadTooLarge(format!(
                "Upload exceeds {} bytes",
                max_bytes
            )));
        }
        file.write_all(&chunk).await?;
    }
    file.flush().await?;
    Ok(size)
}

async fn discard(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %path.display(), "Failed to discard rejected upload: {}", e);
        }
    }
}

/// Current state of a job. Unknown ids report `not_found`.
pub async fn video_status(
    State(state): State<AppState>,
    _auth: ServiceAuth,
    UrlPath(video_id): UrlPath<String>,
) -> ApiResult<Json<StatusReport>> {
    let report = state.orchestrator.query(&JobId::from(video_id)).await?;
    Ok(Json(report))
}

/// Body of a confirmation, as a form or JSON.
#[derive(Debug, Deserialize)]
pub struct ConfirmRequest {
    pub video_id: String,
}

#[derive(Debug, Serialize)]
pub struct ConfirmResponse {
    pub status: JobStatus,
    pub video_id: String,
}

/// The consumer acknowledges receipt; local files are released.
pub async fn confirm_video(
    State(state): State<AppState>,
    _auth: ServiceAuth,
    request: Request,
) -> ApiResult<Json<ConfirmResponse>> {
    let is_json = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.starts_with("application/json"))
        .unwrap_or(false);

    let body = if is_json {
        Json::<ConfirmRequest>::from_request(request, &state)
            .await
            .map(|Json(body)| body)
            .map_err(|e| ApiError::bad_request(e.body_text()))?
    } else {
        Form::<ConfirmRequest>::from_request(request, &state)
            .await
            .map(|Form(body)| body)
            .map_err(|e| ApiError::bad_request(e.body_text()))?
    };

    let job_id = JobId::from(body.video_id);
    let outcome = state.orchestrator.confirm(&job_id).await?;
    Ok(Json(ConfirmResponse {
        status: outcome.status(),
        video_id: job_id.to_string(),
    }))
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub status: &'static str,
    pub video_id: String,
    pub previous_status: JobStatus,
}

/// Remove a finished job's record, and a failed job's retained files.
pub async fn delete_video(
    State(state): State<AppState>,
    _auth: ServiceAuth,
    UrlPath(video_id): UrlPath<String>,
) -> ApiResult<Json<DeleteResponse>> {
    let job_id = JobId::from(video_id);
    let previous_status = state.orchestrator.purge(&job_id).await?;
    Ok(Json(DeleteResponse {
        status: "deleted",
        video_id: job_id.to_string(),
        previous_status,
    }))
}
