use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Number of characters of the first message used as a chat title.
pub const TITLE_MAX_CHARS: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
    Function,
    Data,
    Tool,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
            Role::Function => "function",
            Role::Data => "data",
            Role::Tool => "tool",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            name: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// The message list of one chat, as seen by the turn that is running.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationState {
    pub chat_id: String,
    pub messages: Vec<Message>,
}

impl ConversationState {
    pub fn new(chat_id: impl Into<String>) -> Self {
        Self {
            chat_id: chat_id.into(),
            messages: Vec::new(),
        }
    }

    /// Returns a copy with `message` appended.
    pub fn with_message(&self, message: Message) -> Self {
        let mut next = self.clone();
        next.messages.push(message);
        next
    }

    pub fn contents(&self) -> Vec<String> {
        self.messages.iter().map(|m| m.content.clone()).collect()
    }
}

/// A persisted chat record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chat {
    pub id: String,
    pub title: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub messages: Vec<Message>,
    pub path: String,
}

impl Chat {
    pub fn from_state(state: &ConversationState, user_id: &str, created_at: DateTime<Utc>) -> Self {
        Self {
            id: state.chat_id.clone(),
            title: chat_title(&state.messages),
            user_id: user_id.to_string(),
            created_at,
            messages: state.messages.clone(),
            path: chat_path(&state.chat_id),
        }
    }

    pub fn into_state(self) -> ConversationState {
        ConversationState {
            chat_id: self.id,
            messages: self.messages,
        }
    }
}

pub fn chat_title(messages: &[Message]) -> String {
    messages
        .first()
        .map(|m| m.content.chars().take(TITLE_MAX_CHARS).collect())
        .unwrap_or_default()
}

pub fn chat_path(chat_id: &str) -> String {
    format!("/chat/{}", chat_id)
}

pub fn new_chat_id() -> String {
    Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn roles_serialize_lowercase() {
        let message = Message {
            id: "m1".to_string(),
            role: Role::Assistant,
            content: "hi".to_string(),
            name: None,
        };
        assert_eq!(
            serde_json::to_value(&message).unwrap(),
            json!({ "id": "m1", "role": "assistant", "content": "hi" })
        );
        let parsed: Message =
            serde_json::from_value(json!({ "id": "m2", "role": "tool", "content": "x", "name": "t" }))
                .unwrap();
        assert_eq!(parsed.role, Role::Tool);
        assert_eq!(parsed.name.as_deref(), Some("t"));
    }

    #[test]
    fn title_is_first_hundred_chars_of_first_message() {
        let long = "é".repeat(150);
        let messages = vec![Message::user(long), Message::assistant("answer")];
        let title = chat_title(&messages);
        assert_eq!(title.chars().count(), 100);
        assert!(title.chars().all(|c| c == 'é'));

        assert_eq!(chat_title(&[Message::user("short")]), "short");
        assert_eq!(chat_title(&[]), "");
    }

    #[test]
    fn chat_record_from_state() {
        let state = ConversationState::new("abc").with_message(Message::user("Hello mentors"));
        let now = Utc::now();
        let chat = Chat::from_state(&state, "user-1", now);

        assert_eq!(chat.id, "abc");
        assert_eq!(chat.path, "/chat/abc");
        assert_eq!(chat.title, "Hello mentors");
        assert_eq!(chat.user_id, "user-1");
        assert_eq!(chat.clone().into_state(), state);

        let value = serde_json::to_value(&chat).unwrap();
        assert!(value.get("userId").is_some());
        assert!(value.get("createdAt").is_some());
    }

    #[test]
    fn with_message_leaves_original_untouched() {
        let state = ConversationState::new("c");
        let next = state.with_message(Message::user("q"));
        assert!(state.messages.is_empty());
        assert_eq!(next.messages.len(), 1);
        assert_eq!(next.contents(), vec!["q".to_string()]);
    }
}
