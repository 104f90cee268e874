//! Event and request types for the chat streaming transport.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A citation attached to an assistant answer.
///
/// `metadata` carries free-form, source-specific fields (page numbers,
/// section titles, document URLs) that the UI may render but the protocol
/// does not interpret.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceReference {
    pub id: String,
    pub content: String,
    pub source: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl SourceReference {
    pub fn new(
        id: impl Into<String>,
        content: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            source: source.into(),
            metadata: BTreeMap::new(),
        }
    }
}

/// One line of the newline-delimited chat stream.
///
/// Within a single stream:
/// - at most one `meta` is emitted, before any other output, and the chat
///   id it carries is immutable for the remainder of the stream;
/// - `content` fragments are concatenated in arrival order;
/// - `sources` appears at most once and replaces any prior citation state;
/// - `error` terminates useful output (already received content stays
///   valid);
/// - `done` is the explicit terminal marker. End-of-transport without a
///   `done` means the stream was truncated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StreamEvent {
    Meta { chat_id: i64 },
    Content { data: String },
    Sources { data: Vec<SourceReference> },
    Error { error: String },
    Done,
}

impl StreamEvent {
    pub fn content(data: impl Into<String>) -> Self {
        Self::Content { data: data.into() }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            error: message.into(),
        }
    }

    /// Whether this event ends the logical turn.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Error { .. } | Self::Done)
    }
}

/// Request body accepted by the streaming chat endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessageRequest {
    pub message: String,
    /// Optional attached image as a data URI. User turns only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// BCP 47 language tag the answer should be written in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    /// Continue an existing chat; absent to start a new one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_id: Option<i64>,
}
