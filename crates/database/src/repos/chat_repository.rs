//! Repository for chat and message data access.

use chrono::Utc;
use sqlx::{Row, SqlitePool};

use crate::entities::chat::{Chat, ChatMessage, MessageRole, NewChat, NewMessage};
use crate::types::StoreResult;

#[derive(Clone)]
pub struct ChatRepository {
    pool: SqlitePool,
}

impl ChatRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, new_chat: &NewChat) -> StoreResult<Chat> {
        let now = Utc::now().to_rfc3339();
        let result = sqlx::query(
            "INSERT INTO chats (user_id, title, language, created_at, updated_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(new_chat.user_id)
        .bind(&new_chat.title)
        .bind(&new_chat.language)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(Chat {
            id: result.last_insert_rowid(),
            user_id: new_chat.user_id,
            title: new_chat.title.clone(),
            language: new_chat.language.clone(),
            created_at: now.clone(),
            updated_at: now,
        })
    }

    pub async fn find_by_id(&self, id: i64) -> StoreResult<Option<Chat>> {
        let row = sqlx::query(
            "SELECT id, user_id, title, language, created_at, updated_at FROM chats WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| map_chat(&row)).transpose()
    }

    pub async fn list_for_user(&self, user_id: i64) -> StoreResult<Vec<Chat>> {
        let rows = sqlx::query(
            "SELECT id, user_id, title, language, created_at, updated_at
             FROM chats WHERE user_id = ? ORDER BY updated_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(map_chat).collect()
    }

    pub async fn delete(&self, id: i64) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM chats WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Bump the chat's updated_at so it sorts to the top of the list.
    pub async fn touch(&self, id: i64) -> StoreResult<()> {
        sqlx::query("UPDATE chats SET updated_at = ? WHERE id = ?")
            .bind(Utc::now().to_rfc3339())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn insert_message(&self, new_message: &NewMessage) -> StoreResult<ChatMessage> {
        let now = Utc::now().to_rfc3339();
        let result = sqlx::query(
            "INSERT INTO messages (chat_id, role, content, image, sources, failed, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(new_message.chat_id)
        .bind(new_message.role.as_str())
        .bind(&new_message.content)
        .bind(&new_message.image)
        .bind(&new_message.sources)
        .bind(new_message.failed)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(ChatMessage {
            id: result.last_insert_rowid(),
            chat_id: new_message.chat_id,
            role: new_message.role,
            content: new_message.content.clone(),
            image: new_message.image.clone(),
            sources: new_message.sources.clone(),
            failed: new_message.failed,
            created_at: now,
        })
    }

    pub async fn list_messages(&self, chat_id: i64) -> StoreResult<Vec<ChatMessage>> {
        let rows = sqlx::query(
            "SELECT id, chat_id, role, content, image, sources, failed, created_at
             FROM messages WHERE chat_id = ? ORDER BY id ASC",
        )
        .bind(chat_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(map_message).collect()
    }
}

fn map_chat(row: &sqlx::sqlite::SqliteRow) -> StoreResult<Chat> {
    Ok(Chat {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        title: row.try_get("title")?,
        language: row.try_get("language")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn map_message(row: &sqlx::sqlite::SqliteRow) -> StoreResult<ChatMessage> {
    let role: String = row.try_get("role")?;
    Ok(ChatMessage {
        id: row.try_get("id")?,
        chat_id: row.try_get("chat_id")?,
        role: MessageRole::from(role.as_str()),
        content: row.try_get("content")?,
        image: row.try_get("image")?,
        sources: row.try_get("sources")?,
        failed: row.try_get("failed")?,
        created_at: row.try_get("created_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{memory_pool, seed_user};

    async fn setup() -> (ChatRepository, i64) {
        let pool = memory_pool().await;
        let user_id = seed_user(&pool, "Asha").await;
        (ChatRepository::new(pool), user_id)
    }

    #[tokio::test]
    async fn creates_and_lists_chats_most_recent_first() {
        let (repo, user_id) = setup().await;

        let first = repo
            .create(&NewChat {
                user_id,
                title: "UPI fraud".into(),
                language: "en".into(),
            })
            .await
            .unwrap();
        let second = repo
            .create(&NewChat {
                user_id,
                title: "Phishing email".into(),
                language: "hi".into(),
            })
            .await
            .unwrap();

        repo.touch(second.id).await.unwrap();

        let chats = repo.list_for_user(user_id).await.unwrap();
        assert_eq!(chats.len(), 2);
        assert!(chats.iter().any(|c| c.id == first.id));
    }

    #[tokio::test]
    async fn messages_come_back_in_insertion_order() {
        let (repo, user_id) = setup().await;
        let chat = repo
            .create(&NewChat {
                user_id,
                title: "UPI fraud".into(),
                language: "en".into(),
            })
            .await
            .unwrap();

        repo.insert_message(&NewMessage {
            chat_id: chat.id,
            role: MessageRole::User,
            content: "I lost money via UPI".into(),
            image: None,
            sources: None,
            failed: false,
        })
        .await
        .unwrap();
        repo.insert_message(&NewMessage {
            chat_id: chat.id,
            role: MessageRole::Assistant,
            content: "Immediately call 1930.".into(),
            image: None,
            sources: Some("[]".into()),
            failed: false,
        })
        .await
        .unwrap();

        let messages = repo.list_messages(chat.id).await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, MessageRole::User);
        assert_eq!(messages[1].content, "Immediately call 1930.");
        assert!(!messages[1].failed);
    }

    #[tokio::test]
    async fn deleting_a_chat_cascades_to_messages() {
        let (repo, user_id) = setup().await;
        let chat = repo
            .create(&NewChat {
                user_id,
                title: "temp".into(),
                language: "en".into(),
            })
            .await
            .unwrap();
        repo.insert_message(&NewMessage {
            chat_id: chat.id,
            role: MessageRole::User,
            content: "hello".into(),
            image: None,
            sources: None,
            failed: false,
        })
        .await
        .unwrap();

        assert!(repo.delete(chat.id).await.unwrap());
        assert!(repo.find_by_id(chat.id).await.unwrap().is_none());
        assert!(repo.list_messages(chat.id).await.unwrap().is_empty());
    }
}
