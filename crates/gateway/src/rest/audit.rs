//! Risk audit endpoints.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{extract::State, routing::get, routing::post, Extension, Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::GatewayResult;
use crate::middleware::CurrentUser;
use crate::state::GatewayState;

#[derive(Debug, Serialize, ToSchema)]
pub struct AuditQuestionResponse {
    pub id: String,
    pub prompt: String,
    pub weight: u32,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RunAuditRequest {
    /// Answer per question id; `true` is the safe behaviour.
    pub answers: BTreeMap<String, bool>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AuditReportResponse {
    pub score: i64,
    pub risk_band: String,
    pub recommendations: Vec<String>,
}

pub fn public_routes() -> Router<Arc<GatewayState>> {
    Router::new().route("/audit/questions", get(list_questions))
}

pub fn protected_routes() -> Router<Arc<GatewayState>> {
    Router::new().route("/audit/run", post(run_audit))
}

#[utoipa::path(
    get,
    path = "/api/audit/questions",
    tag = "audit",
    responses(
        (status = 200, description = "The checklist", body = Vec<AuditQuestionResponse>)
    )
)]
pub async fn list_questions(
    State(state): State<Arc<GatewayState>>,
) -> Json<Vec<AuditQuestionResponse>> {
    let questions = state
        .audit_service
        .questions()
        .iter()
        .map(|q| AuditQuestionResponse {
            id: q.id.to_string(),
            prompt: q.prompt.to_string(),
            weight: q.weight,
        })
        .collect();
    Json(questions)
}

#[utoipa::path(
    post,
    path = "/api/audit/run",
    tag = "audit",
    request_body = RunAuditRequest,
    responses(
        (status = 200, description = "Scored report", body = AuditReportResponse),
        (status = 400, description = "Missing or unknown answers"),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn run_audit(
    State(state): State<Arc<GatewayState>>,
    Extension(user): Extension<CurrentUser>,
    Json(body): Json<RunAuditRequest>,
) -> GatewayResult<Json<AuditReportResponse>> {
    let report = state.audit_service.run(user.0, &body.answers).await?;
    Ok(Json(AuditReportResponse {
        score: report.score,
        risk_band: report.risk_band,
        recommendations: report.recommendations,
    }))
}
