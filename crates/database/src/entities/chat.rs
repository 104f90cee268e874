//! Chat and message entity definitions

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chat {
    pub id: i64,
    #[serde(skip_serializing)]
    pub user_id: i64,
    pub title: String,
    pub language: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone)]
pub struct NewChat {
    pub user_id: i64,
    pub title: String,
    pub language: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: i64,
    pub chat_id: i64,
    pub role: MessageRole,
    pub content: String,
    /// Attached image as a data URI. User turns only.
    pub image: Option<String>,
    /// Serialised citation list. Assistant turns only.
    pub sources: Option<String>,
    /// Set when the turn ended with a stream error; the content received
    /// up to that point is kept.
    pub failed: bool,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct NewMessage {
    pub chat_id: i64,
    pub role: MessageRole,
    pub content: String,
    pub image: Option<String>,
    pub sources: Option<String>,
    pub failed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }
}

impl From<&str> for MessageRole {
    fn from(s: &str) -> Self {
        match s {
            "assistant" => MessageRole::Assistant,
            _ => MessageRole::User,
        }
    }
}
