//! # Cybermitra Streaming Protocol
//!
//! Wire format shared by the gateway and the client SDK for the chat
//! streaming transport: newline-delimited JSON, one complete event object
//! per line.
//!
//! A single chat turn produces a stream shaped like:
//!
//! ```text
//! {"type":"meta","chat_id":42}
//! {"type":"content","data":"Immediately "}
//! {"type":"content","data":"call 1930."}
//! {"type":"sources","data":[]}
//! {"type":"done"}
//! ```
//!
//! The server side uses [`StreamFramer`] to serialise events and enforce
//! emission order. The client side feeds raw byte chunks through
//! [`LineDecoder`] and parses each complete line independently, so a
//! malformed line never poisons the rest of the stream.

pub mod decode;
pub mod event;
pub mod framer;

pub use decode::LineDecoder;
pub use event::{ChatMessageRequest, SourceReference, StreamEvent};
pub use framer::{FrameError, StreamFramer};

use thiserror::Error;

/// Content type of the streaming response body.
pub const NDJSON_CONTENT_TYPE: &str = "application/x-ndjson";

/// Terminal failures of a chat stream, as observed by a reader.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StreamError {
    /// The transport reached end-of-stream before a `done` event was seen.
    /// The turn content received so far is valid but possibly incomplete.
    #[error("stream ended before a done event")]
    Truncated,

    /// A `meta` event tried to change the chat id established earlier in
    /// the same stream.
    #[error("stream reassigned chat id {got} after establishing {established}")]
    MetaConflict { established: i64, got: i64 },

    /// The underlying byte transport failed mid-stream.
    #[error("transport error: {0}")]
    Transport(String),
}
