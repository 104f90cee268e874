//! Response shapes of the REST surface.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub pincode: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OtpRequested {
    pub cooldown_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum VerifyResponse {
    Registered { token: String, user: UserProfile },
    NeedsRegistration { registration_token: String },
}

#[derive(Debug, Clone, Deserialize)]
pub struct Session {
    pub token: String,
    pub user: UserProfile,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatSummary {
    pub id: i64,
    pub title: String,
    pub language: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatDetail {
    pub id: i64,
    pub title: String,
    pub language: String,
    pub created_at: String,
    pub updated_at: String,
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatMessage {
    pub id: i64,
    pub role: String,
    pub content: String,
    pub image: Option<String>,
    pub sources: Option<serde_json::Value>,
    pub failed: bool,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewComplaint {
    pub category: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub incident_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loss_amount_inr: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ComplaintUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub incident_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loss_amount_inr: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Complaint {
    pub id: String,
    pub category: String,
    pub description: String,
    pub incident_date: Option<String>,
    pub loss_amount_inr: Option<i64>,
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Evidence {
    pub id: String,
    pub file_name: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub created_at: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Station {
    pub id: i64,
    pub name: String,
    pub state: String,
    pub district: String,
    pub address: String,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmergencyContact {
    pub name: String,
    pub number: String,
    pub description: String,
    pub around_the_clock: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuditQuestion {
    pub id: String,
    pub prompt: String,
    pub weight: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuditReport {
    pub score: i64,
    pub risk_band: String,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiErrorBody {
    pub message: String,
}
