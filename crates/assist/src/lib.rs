//! Domain services for the Cybermitra backend: chat turns and their
//! streaming orchestration, complaints, evidence files, directories and
//! the risk audit, plus the [`AnswerEngine`] seam the chat service drives.

pub mod engine;
pub mod services;
pub mod types;

pub use engine::{AnswerChunk, AnswerEngine, AnswerRequest, EngineError, SopGuidanceEngine};
pub use services::{
    AuditAnswers, AuditQuestion, AuditReport, AuditService, ChatService, ComplaintService,
    DirectoryService, EmergencyContact, EvidenceService, NewComplaintInput, UpdateComplaintInput,
};
pub use types::{AssistError, AssistResult};
