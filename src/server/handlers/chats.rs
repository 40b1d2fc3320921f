use std::sync::Arc;
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use axum::http::HeaderMap;
use serde_json::json;

use crate::chat::{Message, Role};
use crate::state::AppState;
use crate::core::errors::ApiError;
use crate::core::security::require_user;

pub async fn list_chats(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let session = require_user(&headers, &state.session_token)?;
    let chats = state.chats.list_chats(&session.user_id).await?;
    Ok(Json(json!({ "chats": chats })))
}

pub async fn get_chat(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(chat_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let session = require_user(&headers, &state.session_token)?;

    let chat = state
        .chats
        .get_chat(&chat_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Chat not found".to_string()))?;
    if chat.user_id != session.user_id {
        return Err(ApiError::NotFound("Chat not found".to_string()));
    }

    Ok(Json(json!({
        "chat": {
            "id": chat.id,
            "title": chat.title,
            "path": chat.path,
            "createdAt": chat.created_at,
        },
        "messages": visible_messages(&chat.messages),
    })))
}

pub async fn delete_chat(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(chat_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let session = require_user(&headers, &state.session_token)?;
    if !state.chats.delete_chat(&chat_id, &session.user_id).await? {
        return Err(ApiError::NotFound("Chat not found".to_string()));
    }
    state.sessions.forget(&chat_id);
    tracing::info!(chat_id = %chat_id, "Chat deleted");
    Ok(Json(json!({"status": "deleted"})))
}

/// The messages a UI shows: everything but system messages.
pub fn visible_messages(messages: &[Message]) -> Vec<&Message> {
    messages.iter().filter(|m| m.role != Role::System).collect()
}
