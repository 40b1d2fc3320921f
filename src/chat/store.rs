use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqlitePoolOptions, sqlite::SqliteRow, Row, SqlitePool};

use crate::core::errors::ApiError;
use super::types::{Chat, Message};

/// A chat without its messages, for listings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSummary {
    pub id: String,
    pub title: String,
    pub path: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub message_count: usize,
}

/// SQLite-backed store of persisted chat records.
#[derive(Clone)]
pub struct ChatStore {
    pool: SqlitePool,
}

impl ChatStore {
    pub async fn new(db_path: PathBuf) -> Result<Self, ApiError> {
        let conn_str = format!("sqlite://{}?mode=rwc", db_path.to_string_lossy());
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&conn_str)
            .await
            .map_err(|e| ApiError::internal(format!("Failed to connect to chat db: {}", e)))?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS chats (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                title TEXT NOT NULL,
                path TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                messages TEXT NOT NULL
            )",
        )
        .execute(&pool)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to init chats table: {}", e)))?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_chats_user_id ON chats(user_id)")
            .execute(&pool)
            .await
            .map_err(|e| ApiError::internal(format!("Failed to create index: {}", e)))?;

        Ok(Self { pool })
    }

    /// Inserts the chat or replaces its title and messages. The original
    /// `created_at` is kept. Fails with `Forbidden` if the id belongs to a
    /// different user.
    pub async fn save_chat(&self, chat: &Chat) -> Result<(), ApiError> {
        let messages = serde_json::to_string(&chat.messages).map_err(ApiError::internal)?;
        let now = Utc::now().to_rfc3339();

        let result = sqlx::query(
            "INSERT INTO chats (id, user_id, title, path, created_at, updated_at, messages) \
             VALUES (?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT(id) DO UPDATE SET \
                title = excluded.title, \
                path = excluded.path, \
                updated_at = excluded.updated_at, \
                messages = excluded.messages \
             WHERE chats.user_id = excluded.user_id",
        )
        .bind(&chat.id)
        .bind(&chat.user_id)
        .bind(&chat.title)
        .bind(&chat.path)
        .bind(chat.created_at.to_rfc3339())
        .bind(&now)
        .bind(messages)
        .execute(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        if result.rows_affected() == 0 {
            return Err(ApiError::Forbidden);
        }
        Ok(())
    }

    pub async fn get_chat(&self, chat_id: &str) -> Result<Option<Chat>, ApiError> {
        let row = sqlx::query("SELECT * FROM chats WHERE id = ?")
            .bind(chat_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(ApiError::internal)?;

        row.map(|row| chat_from_row(&row)).transpose()
    }

    pub async fn list_chats(&self, user_id: &str) -> Result<Vec<ChatSummary>, ApiError> {
        let rows = sqlx::query(
            "SELECT * FROM chats WHERE user_id = ? ORDER BY updated_at DESC LIMIT 100",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        let mut chats = Vec::with_capacity(rows.len());
        for row in rows {
            let chat = chat_from_row(&row)?;
            chats.push(ChatSummary {
                updated_at: parse_timestamp(&row, "updated_at")?,
                message_count: chat.messages.len(),
                id: chat.id,
                title: chat.title,
                path: chat.path,
                created_at: chat.created_at,
            });
        }
        Ok(chats)
    }

    /// Deletes a chat owned by `user_id`. Returns whether a row was removed.
    pub async fn delete_chat(&self, chat_id: &str, user_id: &str) -> Result<bool, ApiError> {
        let result = sqlx::query("DELETE FROM chats WHERE id = ? AND user_id = ?")
            .bind(chat_id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(ApiError::internal)?;
        Ok(result.rows_affected() > 0)
    }
}

fn chat_from_row(row: &SqliteRow) -> Result<Chat, ApiError> {
    let messages_json: String = row.try_get("messages").map_err(ApiError::internal)?;
    let messages: Vec<Message> =
        serde_json::from_str(&messages_json).map_err(ApiError::internal)?;

    Ok(Chat {
        id: row.try_get("id").map_err(ApiError::internal)?,
        title: row.try_get("title").map_err(ApiError::internal)?,
        user_id: row.try_get("user_id").map_err(ApiError::internal)?,
        created_at: parse_timestamp(row, "created_at")?,
        messages,
        path: row.try_get("path").map_err(ApiError::internal)?,
    })
}

fn parse_timestamp(row: &SqliteRow, column: &str) -> Result<DateTime<Utc>, ApiError> {
    let raw: String = row.try_get(column).map_err(ApiError::internal)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(ApiError::internal)
}
