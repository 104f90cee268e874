//! Risk audit run entities

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRun {
    #[serde(skip_serializing)]
    pub id: i64,
    #[serde(skip_serializing)]
    pub user_id: i64,
    pub score: i64,
    pub risk_band: String,
    /// Serialised answer map, as submitted.
    pub answers: String,
    pub created_at: String,
}
