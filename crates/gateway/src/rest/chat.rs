//! Chat REST endpoints, including the streaming message endpoint.

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, StatusCode},
    response::Response,
    routing::{get, post},
    Extension, Json, Router,
};
use bytes::Bytes;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::error;
use utoipa::ToSchema;

use cybermitra_protocol::{ChatMessageRequest, StreamFramer, NDJSON_CONTENT_TYPE};

use crate::error::{GatewayError, GatewayResult};
use crate::middleware::CurrentUser;
use crate::state::GatewayState;

#[derive(Debug, Serialize, ToSchema)]
pub struct ChatResponse {
    pub id: i64,
    pub title: String,
    pub language: String,
    pub created_at: String,
    pub updated_at: String,
}

impl From<cybermitra_database::Chat> for ChatResponse {
    fn from(chat: cybermitra_database::Chat) -> Self {
        Self {
            id: chat.id,
            title: chat.title,
            language: chat.language,
            created_at: chat.created_at,
            updated_at: chat.updated_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    pub id: i64,
    pub role: String,
    pub content: String,
    pub image: Option<String>,
    /// Citations as emitted on the stream, already JSON.
    pub sources: Option<serde_json::Value>,
    pub failed: bool,
    pub created_at: String,
}

impl From<cybermitra_database::ChatMessage> for MessageResponse {
    fn from(message: cybermitra_database::ChatMessage) -> Self {
        let sources = message
            .sources
            .as_deref()
            .and_then(|raw| serde_json::from_str(raw).ok());
        Self {
            id: message.id,
            role: message.role.as_str().to_string(),
            content: message.content,
            image: message.image,
            sources,
            failed: message.failed,
            created_at: message.created_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ChatDetailResponse {
    #[serde(flatten)]
    pub chat: ChatResponse,
    pub messages: Vec<MessageResponse>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateChatRequest {
    pub title: String,
    pub language: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SendMessageRequest {
    pub message: String,
    /// Attached image as a data URI.
    pub image: Option<String>,
    pub language: Option<String>,
    /// Continue an existing chat; omit to start a new one.
    pub chat_id: Option<i64>,
}

impl From<SendMessageRequest> for ChatMessageRequest {
    fn from(body: SendMessageRequest) -> Self {
        Self {
            message: body.message,
            image: body.image,
            language: body.language,
            chat_id: body.chat_id,
        }
    }
}

pub fn protected_routes() -> Router<Arc<GatewayState>> {
    Router::new()
        .route("/chats", get(list_chats).post(create_chat))
        .route("/chats/:chat_id", get(get_chat).delete(delete_chat))
        .route("/chats/messages", post(send_message))
}

#[utoipa::path(
    get,
    path = "/api/chats",
    tag = "chats",
    responses(
        (status = 200, description = "The user's chats", body = Vec<ChatResponse>),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn list_chats(
    State(state): State<Arc<GatewayState>>,
    Extension(user): Extension<CurrentUser>,
) -> GatewayResult<Json<Vec<ChatResponse>>> {
    let chats = state.chat_service.list_chats(user.0).await?;
    Ok(Json(chats.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    post,
    path = "/api/chats",
    tag = "chats",
    request_body = CreateChatRequest,
    responses(
        (status = 201, description = "Chat created", body = ChatResponse),
        (status = 400, description = "Invalid request"),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn create_chat(
    State(state): State<Arc<GatewayState>>,
    Extension(user): Extension<CurrentUser>,
    Json(body): Json<CreateChatRequest>,
) -> GatewayResult<(StatusCode, Json<ChatResponse>)> {
    let chat = state
        .chat_service
        .create_chat(user.0, &body.title, body.language.as_deref())
        .await?;
    Ok((StatusCode::CREATED, Json(chat.into())))
}

#[utoipa::path(
    get,
    path = "/api/chats/{chat_id}",
    tag = "chats",
    params(("chat_id" = i64, Path, description = "Chat id")),
    responses(
        (status = 200, description = "Chat with messages", body = ChatDetailResponse),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Chat belongs to another user"),
        (status = 404, description = "Chat not found")
    )
)]
pub async fn get_chat(
    Path(chat_id): Path<i64>,
    State(state): State<Arc<GatewayState>>,
    Extension(user): Extension<CurrentUser>,
) -> GatewayResult<Json<ChatDetailResponse>> {
    let (chat, messages) = state.chat_service.chat_with_messages(user.0, chat_id).await?;
    Ok(Json(ChatDetailResponse {
        chat: chat.into(),
        messages: messages.into_iter().map(Into::into).collect(),
    }))
}

#[utoipa::path(
    delete,
    path = "/api/chats/{chat_id}",
    tag = "chats",
    params(("chat_id" = i64, Path, description = "Chat id")),
    responses(
        (status = 204, description = "Chat deleted"),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Chat belongs to another user"),
        (status = 404, description = "Chat not found")
    )
)]
pub async fn delete_chat(
    Path(chat_id): Path<i64>,
    State(state): State<Arc<GatewayState>>,
    Extension(user): Extension<CurrentUser>,
) -> GatewayResult<StatusCode> {
    state.chat_service.delete_chat(user.0, chat_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// One chat turn as a newline-delimited JSON stream.
///
/// Authentication, chat resolution and validation happen before the
/// first byte; after that every failure is reported in-band as an
/// `error` event and the stream still ends with `done`.
#[utoipa::path(
    post,
    path = "/api/chats/messages",
    tag = "chats",
    request_body = SendMessageRequest,
    responses(
        (status = 200, description = "Newline-delimited JSON event stream"),
        (status = 400, description = "Invalid request"),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Chat belongs to another user"),
        (status = 404, description = "Chat not found")
    )
)]
pub async fn send_message(
    State(state): State<Arc<GatewayState>>,
    Extension(user): Extension<CurrentUser>,
    Json(body): Json<SendMessageRequest>,
) -> GatewayResult<Response> {
    let events = state.chat_service.stream_turn(user.0, body.into()).await?;

    let frames = async_stream::stream! {
        let mut framer = StreamFramer::new();
        let mut events = events;
        while let Some(event) = events.next().await {
            match framer.frame(&event) {
                Ok(line) => yield Ok::<Bytes, Infallible>(Bytes::from(line)),
                Err(frame_error) => {
                    // A framing violation is a server bug; cut the stream
                    // so the client sees a truncation, not corrupt data.
                    error!(%frame_error, "stream framing violated, aborting response");
                    break;
                }
            }
        }
    };

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, NDJSON_CONTENT_TYPE)
        .header(header::CACHE_CONTROL, "no-cache")
        .body(Body::from_stream(frames))
        .map_err(|e| GatewayError::InternalError(e.to_string()))
}
