//! Evidence file entity definitions

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceFile {
    #[serde(skip_serializing)]
    pub id: i64,
    pub public_id: String,
    #[serde(skip_serializing)]
    pub complaint_id: i64,
    pub file_name: String,
    pub content_type: String,
    pub size_bytes: i64,
    /// Name of the stored object under the evidence root, never the
    /// caller-supplied file name.
    #[serde(skip_serializing)]
    pub object_name: String,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct NewEvidenceFile {
    pub complaint_id: i64,
    pub file_name: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub object_name: String,
}
