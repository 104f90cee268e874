//! Evidence upload, download and deletion, bound to complaints.

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::warn;
use uuid::Uuid;

use cybermitra_config::EvidenceConfig;
use cybermitra_database::{
    Complaint, ComplaintRepository, EvidenceFile, EvidenceRepository, NewEvidenceFile,
};

use crate::types::{AssistError, AssistResult};

/// Content types accepted as evidence. Everything else is refused rather
/// than stored and served back.
const ALLOWED_TYPES: &[&str] = &[
    "image/png",
    "image/jpeg",
    "image/webp",
    "application/pdf",
    "text/plain",
    "audio/mpeg",
    "video/mp4",
];

pub struct EvidenceService {
    evidence: EvidenceRepository,
    complaints: ComplaintRepository,
    root: PathBuf,
    max_bytes: u64,
}

impl EvidenceService {
    pub fn new(
        evidence: EvidenceRepository,
        complaints: ComplaintRepository,
        config: &EvidenceConfig,
    ) -> Self {
        Self {
            evidence,
            complaints,
            root: PathBuf::from(&config.storage_root),
            max_bytes: config.max_file_bytes,
        }
    }

    /// Store an uploaded file for one of the user's complaints.
    pub async fn attach(
        &self,
        user_id: i64,
        complaint_public_id: &str,
        file_name: &str,
        content_type: &str,
        data: &[u8],
    ) -> AssistResult<EvidenceFile> {
        let complaint = self.owned_complaint(user_id, complaint_public_id).await?;

        if data.is_empty() {
            return Err(AssistError::invalid("empty upload"));
        }
        if data.len() as u64 > self.max_bytes {
            return Err(AssistError::FileTooLarge {
                size_bytes: data.len() as u64,
                max_bytes: self.max_bytes,
            });
        }
        if !ALLOWED_TYPES.contains(&content_type) {
            return Err(AssistError::UnsupportedFileType(content_type.to_string()));
        }

        let file_name = sanitize_file_name(file_name)?;
        let object_name = format!(
            "{}/{}{}",
            complaint.public_id,
            Uuid::new_v4(),
            extension_for(content_type)
        );

        let path = self.root.join(&object_name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&path, data).await?;

        let created = self
            .evidence
            .create(&NewEvidenceFile {
                complaint_id: complaint.id,
                file_name,
                content_type: content_type.to_string(),
                size_bytes: data.len() as i64,
                object_name,
            })
            .await;

        match created {
            Ok(file) => Ok(file),
            Err(store_error) => {
                // Do not leave an orphaned object behind.
                if let Err(io_error) = fs::remove_file(&path).await {
                    warn!(path = %path.display(), %io_error, "failed to clean up evidence object");
                }
                Err(store_error.into())
            }
        }
    }

    pub async fn list(
        &self,
        user_id: i64,
        complaint_public_id: &str,
    ) -> AssistResult<Vec<EvidenceFile>> {
        let complaint = self.owned_complaint(user_id, complaint_public_id).await?;
        Ok(self.evidence.list_for_complaint(complaint.id).await?)
    }

    /// Resolve a download: the file row plus the path to stream from.
    pub async fn open(
        &self,
        user_id: i64,
        evidence_public_id: &str,
    ) -> AssistResult<(EvidenceFile, PathBuf)> {
        let file = self.owned_file(user_id, evidence_public_id).await?;
        let path = self.root.join(&file.object_name);
        if !path.exists() {
            warn!(object = %file.object_name, "evidence row exists but object is missing");
            return Err(AssistError::NotFound("evidence file"));
        }
        Ok((file, path))
    }

    pub async fn delete(&self, user_id: i64, evidence_public_id: &str) -> AssistResult<()> {
        let file = self.owned_file(user_id, evidence_public_id).await?;
        self.evidence.delete(file.id).await?;

        let path = self.root.join(&file.object_name);
        if let Err(io_error) = fs::remove_file(&path).await {
            warn!(path = %path.display(), %io_error, "failed to remove evidence object");
        }
        Ok(())
    }

    async fn owned_complaint(
        &self,
        user_id: i64,
        complaint_public_id: &str,
    ) -> AssistResult<Complaint> {
        let complaint = self
            .complaints
            .find_by_public_id(complaint_public_id)
            .await?
            .ok_or(AssistError::NotFound("complaint"))?;
        if complaint.user_id != user_id {
            return Err(AssistError::AccessDenied("complaint belongs to another user"));
        }
        Ok(complaint)
    }

    /// Ownership of a file is carried by the complaint it belongs to.
    async fn owned_file(
        &self,
        user_id: i64,
        evidence_public_id: &str,
    ) -> AssistResult<EvidenceFile> {
        let file = self
            .evidence
            .find_by_public_id(evidence_public_id)
            .await?
            .ok_or(AssistError::NotFound("evidence file"))?;

        let complaint = self
            .complaints
            .find_by_id(file.complaint_id)
            .await?
            .ok_or(AssistError::NotFound("complaint"))?;
        if complaint.user_id != user_id {
            return Err(AssistError::AccessDenied("evidence belongs to another user"));
        }
        Ok(file)
    }
}

fn sanitize_file_name(file_name: &str) -> AssistResult<String> {
    let name = Path::new(file_name)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .trim()
        .to_string();
    if name.is_empty() || name.len() > 255 {
        return Err(AssistError::invalid("invalid file name"));
    }
    Ok(name)
}

fn extension_for(content_type: &str) -> &'static str {
    match content_type {
        "image/png" => ".png",
        "image/jpeg" => ".jpg",
        "image/webp" => ".webp",
        "application/pdf" => ".pdf",
        "text/plain" => ".txt",
        "audio/mpeg" => ".mp3",
        "video/mp4" => ".mp4",
        _ => "",
    }
}
