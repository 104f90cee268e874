//! The answer generation seam.
//!
//! The chat service only knows this trait; the bundled
//! [`SopGuidanceEngine`] answers from packaged incident-response
//! guidance, and a retrieval-backed model can be swapped in behind the
//! same interface.

mod sop;

pub use sop::SopGuidanceEngine;

use cybermitra_protocol::SourceReference;
use futures::stream::BoxStream;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("the assistant could not answer: {0}")]
    Failed(String),
}

/// One turn's worth of input to the engine.
#[derive(Debug, Clone)]
pub struct AnswerRequest {
    pub question: String,
    /// BCP 47 tag the answer should be written in.
    pub language: String,
    /// Prior turns of the conversation, oldest first, as (role, content).
    pub history: Vec<(String, String)>,
}

/// Incremental engine output.
#[derive(Debug, Clone, PartialEq)]
pub enum AnswerChunk {
    Text(String),
    /// Citations for the answer. Emitted once, after the text.
    Sources(Vec<SourceReference>),
}

pub trait AnswerEngine: Send + Sync {
    /// Produce the answer as a stream of chunks. Text chunks arrive in
    /// reading order; a sources chunk, if any, follows the text.
    fn answer(&self, request: AnswerRequest) -> BoxStream<'static, Result<AnswerChunk, EngineError>>;
}
