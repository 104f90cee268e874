//! Shared application state for the gateway

use std::sync::Arc;

use sqlx::SqlitePool;

use cybermitra_assist::engine::AnswerEngine;
use cybermitra_assist::{
    AuditService, ChatService, ComplaintService, DirectoryService, EvidenceService,
};
use cybermitra_auth::Authenticator;
use cybermitra_config::AppConfig;
use cybermitra_database::{
    AuditRepository, ChatRepository, ComplaintRepository, EvidenceRepository, StationRepository,
};

/// Shared application state containing all services
#[derive(Clone)]
pub struct GatewayState {
    pub authenticator: Authenticator,
    pub chat_service: Arc<ChatService>,
    pub complaint_service: Arc<ComplaintService>,
    pub evidence_service: Arc<EvidenceService>,
    pub directory_service: Arc<DirectoryService>,
    pub audit_service: Arc<AuditService>,
    /// Accepted upload size, used to bound the multipart body.
    pub max_upload_bytes: u64,
}

impl GatewayState {
    pub fn new(
        pool: SqlitePool,
        config: &AppConfig,
        authenticator: Authenticator,
        engine: Arc<dyn AnswerEngine>,
    ) -> Self {
        let chat_service = Arc::new(ChatService::new(
            ChatRepository::new(pool.clone()),
            engine,
            config.assistant.default_language.clone(),
        ));
        let complaint_service = Arc::new(ComplaintService::new(ComplaintRepository::new(
            pool.clone(),
        )));
        let evidence_service = Arc::new(EvidenceService::new(
            EvidenceRepository::new(pool.clone()),
            ComplaintRepository::new(pool.clone()),
            &config.evidence,
        ));
        let directory_service = Arc::new(DirectoryService::new(StationRepository::new(
            pool.clone(),
        )));
        let audit_service = Arc::new(AuditService::new(AuditRepository::new(pool)));

        Self {
            authenticator,
            chat_service,
            complaint_service,
            evidence_service,
            directory_service,
            audit_service,
            max_upload_bytes: config.evidence.max_file_bytes,
        }
    }
}
