use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};

use crate::chat::{ConversationStateStore, TurnEvent};
use crate::core::config::settings::ws_allowed_origins;
use crate::core::errors::ApiError;
use crate::core::security::{user_session, AuthSession};
use crate::server::handlers::chats::visible_messages;
use crate::server::router::default_local_origins;
use crate::state::AppState;
use super::protocol::{WsIncomingMessage, WS_APP_PROTOCOL, WS_TOKEN_PREFIX, WS_USER_PREFIX};

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let origin_ok = validate_origin(&headers, &state);
    let token_ok = validate_token(&headers, &state);
    let user = user_session(&headers).or_else(|| user_from_protocol_header(&headers));

    ws.protocols([WS_APP_PROTOCOL])
        .on_upgrade(move |socket| handle_socket(socket, state, origin_ok, token_ok, user))
}

async fn handle_socket(
    socket: WebSocket,
    state: Arc<AppState>,
    origin_ok: bool,
    token_ok: bool,
    user: Option<AuthSession>,
) {
    let (mut sender, mut receiver) = socket.split();

    if !origin_ok {
        let _ = sender
            .send(Message::Close(Some(axum::extract::ws::CloseFrame {
                code: 4003,
                reason: "Forbidden: Invalid Origin".into(),
            })))
            .await;
        return;
    }

    if !token_ok {
        let _ = sender
            .send(Message::Close(Some(axum::extract::ws::CloseFrame {
                code: 4001,
                reason: "Unauthorized: Invalid Token".into(),
            })))
            .await;
        return;
    }

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<WsIncomingMessage>();
    tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => match serde_json::from_str::<WsIncomingMessage>(&text) {
                    Ok(incoming) => {
                        let _ = tx.send(incoming);
                    }
                    Err(err) => tracing::debug!("Ignoring malformed frame: {}", err),
                },
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    let mut current_chat_id: Option<String> = None;

    while let Some(incoming) = rx.recv().await {
        if let Err(err) =
            handle_message(&mut sender, &state, user.as_ref(), &mut current_chat_id, incoming).await
        {
            let _ = send_json(
                &mut sender,
                json!({"type": "error", "message": err.to_string()}),
            )
            .await;
        }
    }
}

async fn handle_message(
    sender: &mut SplitSink<WebSocket, Message>,
    state: &Arc<AppState>,
    user: Option<&AuthSession>,
    current_chat_id: &mut Option<String>,
    data: WsIncomingMessage,
) -> Result<(), ApiError> {
    match data.msg_type.as_deref().unwrap_or("message") {
        "set_chat" => {
            let chat_id = data
                .chat_id
                .ok_or_else(|| ApiError::BadRequest("chatId is required".to_string()))?;
            let snapshot = state.sessions.snapshot(&chat_id, user).await?;
            let messages = snapshot.map(|s| s.messages).unwrap_or_default();
            *current_chat_id = Some(chat_id.clone());
            send_json(sender, json!({"type": "chat_changed", "chatId": chat_id})).await?;
            send_json(
                sender,
                json!({"type": "history", "messages": visible_messages(&messages)}),
            )
            .await
        }
        "message" => {
            let text = data.message.unwrap_or_default();
            if text.trim().is_empty() {
                return Ok(());
            }
            let requested = data.chat_id.or_else(|| current_chat_id.clone());
            run_turn(sender, state, user, current_chat_id, requested, &text).await
        }
        other => Err(ApiError::BadRequest(format!(
            "Unknown message type: {}",
            other
        ))),
    }
}

async fn run_turn(
    sender: &mut SplitSink<WebSocket, Message>,
    state: &Arc<AppState>,
    user: Option<&AuthSession>,
    current_chat_id: &mut Option<String>,
    requested_chat_id: Option<String>,
    text: &str,
) -> Result<(), ApiError> {
    let ai_state = state
        .sessions
        .begin_turn(requested_chat_id, user.cloned())
        .await?;
    let chat_id = ai_state.get().chat_id;
    if current_chat_id.as_deref() != Some(chat_id.as_str()) {
        *current_chat_id = Some(chat_id.clone());
        send_json(sender, json!({"type": "chat_changed", "chatId": chat_id})).await?;
    }

    let mut stream = state.pipeline.submit_user_message(ai_state, text).await?;

    while let Some(event) = stream.recv().await {
        match event {
            TurnEvent::Delta(chunk) => {
                if chunk.is_empty() {
                    continue;
                }
                send_json(sender, json!({"type": "chunk", "message": chunk})).await?;
            }
            TurnEvent::Done(message) => {
                send_json(
                    sender,
                    json!({"type": "done", "chatId": chat_id, "message": message}),
                )
                .await?;
            }
            TurnEvent::Failed(err) => {
                send_json(sender, json!({"type": "error", "message": err})).await?;
            }
        }
    }
    Ok(())
}

pub async fn send_json(
    sender: &mut SplitSink<WebSocket, Message>,
    payload: Value,
) -> Result<(), ApiError> {
    let text = serde_json::to_string(&payload).map_err(ApiError::internal)?;
    sender
        .send(Message::Text(text))
        .await
        .map_err(ApiError::internal)?;
    Ok(())
}

fn validate_origin(headers: &HeaderMap, state: &AppState) -> bool {
    let origin = headers.get("origin").and_then(|v| v.to_str().ok());
    let Some(origin) = origin else {
        let env = std::env::var("MENTOR_RAG_ENV").unwrap_or_else(|_| "production".to_string());
        return env != "production";
    };

    let mut allowed = state
        .config
        .load_config()
        .map(|cfg| ws_allowed_origins(&cfg))
        .unwrap_or_default();
    if allowed.is_empty() {
        allowed = default_local_origins();
    }

    allowed.iter().map(|entry| entry.trim()).any(|allowed_origin| {
        origin == allowed_origin || origin.starts_with(&format!("{}/", allowed_origin))
    })
}

fn validate_token(headers: &HeaderMap, state: &AppState) -> bool {
    protocol_value(headers, WS_TOKEN_PREFIX)
        .map(|token| token == state.session_token.value())
        .unwrap_or(false)
}

fn user_from_protocol_header(headers: &HeaderMap) -> Option<AuthSession> {
    protocol_value(headers, WS_USER_PREFIX).map(|user_id| AuthSession { user_id })
}

/// Finds `<prefix><hex>` among the offered subprotocols and decodes it.
fn protocol_value(headers: &HeaderMap, prefix: &str) -> Option<String> {
    let protocol_header = headers.get("sec-websocket-protocol")?.to_str().ok()?;
    for item in protocol_header.split(',') {
        let protocol = item.trim();
        let Some(encoded) = protocol.strip_prefix(prefix) else {
            continue;
        };
        if encoded.is_empty() {
            return None;
        }
        let bytes = hex::decode(encoded).ok()?;
        let value = String::from_utf8(bytes).ok()?;
        if !value.trim().is_empty() {
            return Some(value);
        }
    }
    None
}
