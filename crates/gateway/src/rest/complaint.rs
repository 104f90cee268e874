//! Complaint REST endpoints.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use cybermitra_assist::{NewComplaintInput, UpdateComplaintInput};
use cybermitra_database::ComplaintStatus;

use crate::error::{GatewayError, GatewayResult};
use crate::middleware::CurrentUser;
use crate::state::GatewayState;

#[derive(Debug, Serialize, ToSchema)]
pub struct ComplaintResponse {
    pub id: String,
    pub category: String,
    pub description: String,
    pub incident_date: Option<String>,
    pub loss_amount_inr: Option<i64>,
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
}

impl From<cybermitra_database::Complaint> for ComplaintResponse {
    fn from(complaint: cybermitra_database::Complaint) -> Self {
        Self {
            id: complaint.public_id,
            category: complaint.category,
            description: complaint.description,
            incident_date: complaint.incident_date,
            loss_amount_inr: complaint.loss_amount_inr,
            status: complaint.status.as_str().to_string(),
            created_at: complaint.created_at,
            updated_at: complaint.updated_at,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateComplaintRequest {
    pub category: String,
    pub description: String,
    pub incident_date: Option<String>,
    pub loss_amount_inr: Option<i64>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateComplaintRequest {
    pub category: Option<String>,
    pub description: Option<String>,
    pub incident_date: Option<String>,
    pub loss_amount_inr: Option<i64>,
    /// One of `draft`, `submitted`, `under_review`, `resolved`.
    pub status: Option<String>,
}

pub fn protected_routes() -> Router<Arc<GatewayState>> {
    Router::new()
        .route("/complaints", get(list_complaints).post(create_complaint))
        .route(
            "/complaints/:complaint_id",
            get(get_complaint).put(update_complaint).delete(delete_complaint),
        )
}

#[utoipa::path(
    get,
    path = "/api/complaints",
    tag = "complaints",
    responses(
        (status = 200, description = "The user's complaints", body = Vec<ComplaintResponse>),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn list_complaints(
    State(state): State<Arc<GatewayState>>,
    Extension(user): Extension<CurrentUser>,
) -> GatewayResult<Json<Vec<ComplaintResponse>>> {
    let complaints = state.complaint_service.list(user.0).await?;
    Ok(Json(complaints.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    post,
    path = "/api/complaints",
    tag = "complaints",
    request_body = CreateComplaintRequest,
    responses(
        (status = 201, description = "Draft created", body = ComplaintResponse),
        (status = 400, description = "Invalid request"),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn create_complaint(
    State(state): State<Arc<GatewayState>>,
    Extension(user): Extension<CurrentUser>,
    Json(body): Json<CreateComplaintRequest>,
) -> GatewayResult<(StatusCode, Json<ComplaintResponse>)> {
    let complaint = state
        .complaint_service
        .create(
            user.0,
            NewComplaintInput {
                category: body.category,
                description: body.description,
                incident_date: body.incident_date,
                loss_amount_inr: body.loss_amount_inr,
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(complaint.into())))
}

#[utoipa::path(
    get,
    path = "/api/complaints/{complaint_id}",
    tag = "complaints",
    params(("complaint_id" = String, Path, description = "Complaint public id")),
    responses(
        (status = 200, description = "Complaint details", body = ComplaintResponse),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Complaint belongs to another user"),
        (status = 404, description = "Complaint not found")
    )
)]
pub async fn get_complaint(
    Path(complaint_id): Path<String>,
    State(state): State<Arc<GatewayState>>,
    Extension(user): Extension<CurrentUser>,
) -> GatewayResult<Json<ComplaintResponse>> {
    let complaint = state.complaint_service.get(user.0, &complaint_id).await?;
    Ok(Json(complaint.into()))
}

#[utoipa::path(
    put,
    path = "/api/complaints/{complaint_id}",
    tag = "complaints",
    params(("complaint_id" = String, Path, description = "Complaint public id")),
    request_body = UpdateComplaintRequest,
    responses(
        (status = 200, description = "Complaint updated", body = ComplaintResponse),
        (status = 400, description = "Invalid request"),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Complaint belongs to another user"),
        (status = 404, description = "Complaint not found"),
        (status = 409, description = "Disallowed edit or status move")
    )
)]
pub async fn update_complaint(
    Path(complaint_id): Path<String>,
    State(state): State<Arc<GatewayState>>,
    Extension(user): Extension<CurrentUser>,
    Json(body): Json<UpdateComplaintRequest>,
) -> GatewayResult<Json<ComplaintResponse>> {
    let status = body.status.as_deref().map(parse_status).transpose()?;
    let complaint = state
        .complaint_service
        .update(
            user.0,
            &complaint_id,
            UpdateComplaintInput {
                category: body.category,
                description: body.description,
                incident_date: body.incident_date,
                loss_amount_inr: body.loss_amount_inr,
                status,
            },
        )
        .await?;
    Ok(Json(complaint.into()))
}

#[utoipa::path(
    delete,
    path = "/api/complaints/{complaint_id}",
    tag = "complaints",
    params(("complaint_id" = String, Path, description = "Complaint public id")),
    responses(
        (status = 204, description = "Draft deleted"),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Complaint belongs to another user"),
        (status = 404, description = "Complaint not found"),
        (status = 409, description = "Complaint is no longer a draft")
    )
)]
pub async fn delete_complaint(
    Path(complaint_id): Path<String>,
    State(state): State<Arc<GatewayState>>,
    Extension(user): Extension<CurrentUser>,
) -> GatewayResult<StatusCode> {
    state.complaint_service.delete(user.0, &complaint_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

fn parse_status(raw: &str) -> GatewayResult<ComplaintStatus> {
    match raw {
        "draft" => Ok(ComplaintStatus::Draft),
        "submitted" => Ok(ComplaintStatus::Submitted),
        "under_review" => Ok(ComplaintStatus::UnderReview),
        "resolved" => Ok(ComplaintStatus::Resolved),
        other => Err(GatewayError::InvalidRequest(format!(
            "unknown status: {other}"
        ))),
    }
}
