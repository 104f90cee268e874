//! Evidence upload and download endpoints.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::{header, StatusCode},
    response::Response,
    routing::{delete, get, post},
    Extension, Json, Router,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::error::{GatewayError, GatewayResult};
use crate::middleware::CurrentUser;
use crate::state::GatewayState;

#[derive(Debug, Serialize, ToSchema)]
pub struct EvidenceResponse {
    pub id: String,
    pub file_name: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub created_at: String,
}

impl From<cybermitra_database::EvidenceFile> for EvidenceResponse {
    fn from(file: cybermitra_database::EvidenceFile) -> Self {
        Self {
            id: file.public_id,
            file_name: file.file_name,
            content_type: file.content_type,
            size_bytes: file.size_bytes,
            created_at: file.created_at,
        }
    }
}

pub fn protected_routes(max_upload_bytes: u64) -> Router<Arc<GatewayState>> {
    // Leave headroom for multipart framing around the file itself.
    let body_limit = (max_upload_bytes as usize).saturating_add(64 * 1024);
    Router::new()
        .route(
            "/complaints/:complaint_id/evidence",
            post(upload_evidence).get(list_evidence),
        )
        .route("/evidence/:evidence_id/download", get(download_evidence))
        .route("/evidence/:evidence_id", delete(delete_evidence))
        .layer(DefaultBodyLimit::max(body_limit))
}

#[utoipa::path(
    post,
    path = "/api/complaints/{complaint_id}/evidence",
    tag = "evidence",
    params(("complaint_id" = String, Path, description = "Complaint public id")),
    responses(
        (status = 201, description = "File stored", body = EvidenceResponse),
        (status = 400, description = "Missing or invalid file part"),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Complaint belongs to another user"),
        (status = 404, description = "Complaint not found"),
        (status = 413, description = "File exceeds the size limit"),
        (status = 415, description = "File type not accepted")
    )
)]
pub async fn upload_evidence(
    Path(complaint_id): Path<String>,
    State(state): State<Arc<GatewayState>>,
    Extension(user): Extension<CurrentUser>,
    mut multipart: Multipart,
) -> GatewayResult<(StatusCode, Json<EvidenceResponse>)> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| GatewayError::InvalidRequest(format!("invalid multipart body: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let file_name = field.file_name().unwrap_or("upload").to_string();
        let content_type = field
            .content_type()
            .ok_or_else(|| GatewayError::InvalidRequest("file part needs a content type".into()))?
            .to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| GatewayError::InvalidRequest(format!("failed to read upload: {e}")))?;

        let file = state
            .evidence_service
            .attach(user.0, &complaint_id, &file_name, &content_type, &data)
            .await?;
        return Ok((StatusCode::CREATED, Json(file.into())));
    }

    Err(GatewayError::InvalidRequest(
        "multipart body must contain a 'file' part".into(),
    ))
}

#[utoipa::path(
    get,
    path = "/api/complaints/{complaint_id}/evidence",
    tag = "evidence",
    params(("complaint_id" = String, Path, description = "Complaint public id")),
    responses(
        (status = 200, description = "Files attached to the complaint", body = Vec<EvidenceResponse>),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Complaint belongs to another user"),
        (status = 404, description = "Complaint not found")
    )
)]
pub async fn list_evidence(
    Path(complaint_id): Path<String>,
    State(state): State<Arc<GatewayState>>,
    Extension(user): Extension<CurrentUser>,
) -> GatewayResult<Json<Vec<EvidenceResponse>>> {
    let files = state.evidence_service.list(user.0, &complaint_id).await?;
    Ok(Json(files.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    get,
    path = "/api/evidence/{evidence_id}/download",
    tag = "evidence",
    params(("evidence_id" = String, Path, description = "Evidence public id")),
    responses(
        (status = 200, description = "File content"),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Evidence belongs to another user"),
        (status = 404, description = "Evidence not found")
    )
)]
pub async fn download_evidence(
    Path(evidence_id): Path<String>,
    State(state): State<Arc<GatewayState>>,
    Extension(user): Extension<CurrentUser>,
) -> GatewayResult<Response> {
    let (file, path) = state.evidence_service.open(user.0, &evidence_id).await?;

    let data = tokio::fs::read(&path)
        .await
        .map_err(|e| GatewayError::InternalError(format!("failed to read evidence: {e}")))?;

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, file.content_type)
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", file.file_name.replace('"', "")),
        )
        .body(Body::from(data))
        .map_err(|e| GatewayError::InternalError(e.to_string()))
}

#[utoipa::path(
    delete,
    path = "/api/evidence/{evidence_id}",
    tag = "evidence",
    params(("evidence_id" = String, Path, description = "Evidence public id")),
    responses(
        (status = 204, description = "Evidence removed"),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Evidence belongs to another user"),
        (status = 404, description = "Evidence not found")
    )
)]
pub async fn delete_evidence(
    Path(evidence_id): Path<String>,
    State(state): State<Arc<GatewayState>>,
    Extension(user): Extension<CurrentUser>,
) -> GatewayResult<StatusCode> {
    state.evidence_service.delete(user.0, &evidence_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
