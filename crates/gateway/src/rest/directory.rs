//! Public directory endpoints: police stations and the emergency panel.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use cybermitra_database::StationQuery;

use crate::error::GatewayResult;
use crate::state::GatewayState;

#[derive(Debug, Serialize, ToSchema)]
pub struct StationResponse {
    pub id: i64,
    pub name: String,
    pub state: String,
    pub district: String,
    pub address: String,
    pub phone: Option<String>,
}

impl From<cybermitra_database::PoliceStation> for StationResponse {
    fn from(station: cybermitra_database::PoliceStation) -> Self {
        Self {
            id: station.id,
            name: station.name,
            state: station.state,
            district: station.district,
            address: station.address,
            phone: station.phone,
        }
    }
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct StationSearchParams {
    pub state: Option<String>,
    pub district: Option<String>,
    /// Free-text match on station name and address.
    pub q: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct EmergencyContactResponse {
    pub name: String,
    pub number: String,
    pub description: String,
    pub around_the_clock: bool,
}

pub fn public_routes() -> Router<Arc<GatewayState>> {
    Router::new()
        .route("/stations", get(search_stations))
        .route("/emergency", get(emergency_panel))
}

#[utoipa::path(
    get,
    path = "/api/stations",
    tag = "directory",
    params(StationSearchParams),
    responses(
        (status = 200, description = "Matching police stations", body = Vec<StationResponse>)
    )
)]
pub async fn search_stations(
    Query(params): Query<StationSearchParams>,
    State(state): State<Arc<GatewayState>>,
) -> GatewayResult<Json<Vec<StationResponse>>> {
    let stations = state
        .directory_service
        .search_stations(&StationQuery {
            state: params.state,
            district: params.district,
            text: params.q,
            limit: params.limit.unwrap_or(0),
        })
        .await?;
    Ok(Json(stations.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    get,
    path = "/api/emergency",
    tag = "directory",
    responses(
        (status = 200, description = "Emergency helpline panel", body = Vec<EmergencyContactResponse>)
    )
)]
pub async fn emergency_panel(
    State(state): State<Arc<GatewayState>>,
) -> Json<Vec<EmergencyContactResponse>> {
    let panel = state
        .directory_service
        .emergency_panel()
        .iter()
        .map(|contact| EmergencyContactResponse {
            name: contact.name.to_string(),
            number: contact.number.to_string(),
            description: contact.description.to_string(),
            around_the_clock: contact.around_the_clock,
        })
        .collect();
    Json(panel)
}
