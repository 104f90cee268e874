//! Chat turns and their streaming orchestration.

use std::sync::Arc;

use async_stream::stream;
use futures::stream::BoxStream;
use futures::StreamExt;
use tracing::{error, warn};

use cybermitra_database::{
    Chat, ChatMessage, ChatRepository, MessageRole, NewChat, NewMessage,
};
use cybermitra_protocol::{ChatMessageRequest, StreamEvent};

use crate::engine::{AnswerChunk, AnswerEngine, AnswerRequest};
use crate::types::{AssistError, AssistResult};

const MAX_MESSAGE_CHARS: usize = 8_000;
const TITLE_CHARS: usize = 60;

pub struct ChatService {
    chats: ChatRepository,
    engine: Arc<dyn AnswerEngine>,
    default_language: String,
}

impl ChatService {
    pub fn new(chats: ChatRepository, engine: Arc<dyn AnswerEngine>, default_language: String) -> Self {
        Self {
            chats,
            engine,
            default_language,
        }
    }

    pub async fn list_chats(&self, user_id: i64) -> AssistResult<Vec<Chat>> {
        Ok(self.chats.list_for_user(user_id).await?)
    }

    pub async fn create_chat(
        &self,
        user_id: i64,
        title: &str,
        language: Option<&str>,
    ) -> AssistResult<Chat> {
        let title = title.trim();
        if title.is_empty() {
            return Err(AssistError::invalid("chat title must not be empty"));
        }
        Ok(self
            .chats
            .create(&NewChat {
                user_id,
                title: truncate_chars(title, TITLE_CHARS),
                language: language.unwrap_or(&self.default_language).to_string(),
            })
            .await?)
    }

    pub async fn chat_with_messages(
        &self,
        user_id: i64,
        chat_id: i64,
    ) -> AssistResult<(Chat, Vec<ChatMessage>)> {
        let chat = self.owned_chat(user_id, chat_id).await?;
        let messages = self.chats.list_messages(chat.id).await?;
        Ok((chat, messages))
    }

    pub async fn delete_chat(&self, user_id: i64, chat_id: i64) -> AssistResult<()> {
        let chat = self.owned_chat(user_id, chat_id).await?;
        self.chats.delete(chat.id).await?;
        Ok(())
    }

    /// Run one chat turn: persist the user message, drive the answer
    /// engine, and yield protocol events in emission order.
    ///
    /// Pre-stream failures (unknown chat, validation) surface as errors
    /// here so the caller can reply with a proper HTTP status. Failures
    /// after the first byte are reported in-band as an `error` event;
    /// content already streamed stays persisted, with the assistant turn
    /// marked failed.
    pub async fn stream_turn(
        &self,
        user_id: i64,
        request: ChatMessageRequest,
    ) -> AssistResult<BoxStream<'static, StreamEvent>> {
        let message = request.message.trim().to_string();
        if message.is_empty() {
            return Err(AssistError::invalid("message must not be empty"));
        }
        if message.chars().count() > MAX_MESSAGE_CHARS {
            return Err(AssistError::invalid("message too long"));
        }

        let (chat, is_new) = match request.chat_id {
            Some(chat_id) => (self.owned_chat(user_id, chat_id).await?, false),
            None => {
                let chat = self
                    .create_chat(user_id, &message, request.language.as_deref())
                    .await?;
                (chat, true)
            }
        };

        let history: Vec<(String, String)> = self
            .chats
            .list_messages(chat.id)
            .await?
            .into_iter()
            .map(|m| (m.role.as_str().to_string(), m.content))
            .collect();

        self.chats
            .insert_message(&NewMessage {
                chat_id: chat.id,
                role: MessageRole::User,
                content: message.clone(),
                image: request.image.clone(),
                sources: None,
                failed: false,
            })
            .await?;

        let answer = self.engine.answer(AnswerRequest {
            question: message,
            language: request
                .language
                .unwrap_or_else(|| chat.language.clone()),
            history,
        });

        let chats = self.chats.clone();
        let chat_id = chat.id;

        let events = stream! {
            if is_new {
                yield StreamEvent::Meta { chat_id };
            }

            let mut content = String::new();
            let mut sources: Option<Vec<cybermitra_protocol::SourceReference>> = None;
            let mut failed = false;

            let mut answer = answer;
            while let Some(chunk) = answer.next().await {
                match chunk {
                    Ok(AnswerChunk::Text(fragment)) => {
                        content.push_str(&fragment);
                        yield StreamEvent::Content { data: fragment };
                    }
                    Ok(AnswerChunk::Sources(list)) => {
                        if sources.is_some() {
                            warn!(chat_id, "engine emitted sources twice, keeping the last set");
                        }
                        sources = Some(list.clone());
                        yield StreamEvent::Sources { data: list };
                    }
                    Err(engine_error) => {
                        error!(chat_id, %engine_error, "answer engine failed mid-turn");
                        failed = true;
                        yield StreamEvent::error(engine_error.to_string());
                        break;
                    }
                }
            }

            let serialized_sources = match sources
                .map(|list| serde_json::to_string(&list))
                .transpose()
            {
                Ok(serialized) => serialized,
                Err(serde_error) => {
                    error!(chat_id, %serde_error, "failed to serialise sources");
                    None
                }
            };

            let persisted = chats
                .insert_message(&NewMessage {
                    chat_id,
                    role: MessageRole::Assistant,
                    content,
                    image: None,
                    sources: serialized_sources,
                    failed,
                })
                .await;
            match persisted {
                Ok(_) => {
                    if let Err(store_error) = chats.touch(chat_id).await {
                        warn!(chat_id, %store_error, "failed to bump chat timestamp");
                    }
                }
                Err(store_error) => {
                    error!(chat_id, %store_error, "failed to persist assistant turn");
                    if !failed {
                        yield StreamEvent::error("failed to save the assistant reply");
                    }
                }
            }

            yield StreamEvent::Done;
        };

        Ok(events.boxed())
    }

    async fn owned_chat(&self, user_id: i64, chat_id: i64) -> AssistResult<Chat> {
        let chat = self
            .chats
            .find_by_id(chat_id)
            .await?
            .ok_or(AssistError::NotFound("chat"))?;
        if chat.user_id != user_id {
            return Err(AssistError::AccessDenied("chat belongs to another user"));
        }
        Ok(chat)
    }
}

fn truncate_chars(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let truncated: String = text.chars().take(limit).collect();
    format!("{}…", truncated.trim_end())
}
