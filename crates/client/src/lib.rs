//! # Cybermitra Client SDK
//!
//! A `reqwest`-based client for the Cybermitra backend. One transport
//! serves both the JSON REST surface and the newline-delimited JSON chat
//! stream; authentication flows through an injected [`TokenProvider`] and
//! 401 recovery through an injected unauthorized callback, so nothing in
//! here reads or mutates ambient storage.
//!
//! The streaming pieces live in [`reader`]: [`ChatStream`] consumes a
//! chat turn incrementally, survives malformed lines, enforces the
//! chat-id invariant, honours cancellation and reports truncated streams
//! instead of passing them off as complete.

pub mod api;
pub mod cancel;
pub mod login;
pub mod reader;
pub mod types;

pub use api::{ApiClient, ApiClientConfig, NoToken, StaticToken, TokenProvider, UnauthorizedHandler};
pub use cancel::CancelHandle;
pub use login::{AuthGateway, Clock, LoginFlow, LoginStep, RegistrationForm, SystemClock};
pub use reader::{ChatStream, ChatTurn, EventReader, TurnStatus};

use thiserror::Error;

pub use cybermitra_protocol::StreamError;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid base url: {0}")]
    InvalidBaseUrl(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("the server rejected the request ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("not authenticated")]
    Unauthorized,

    #[error(transparent)]
    Stream(#[from] StreamError),
}
