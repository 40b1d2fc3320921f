use serde::Deserialize;

pub const WS_APP_PROTOCOL: &str = "mentor-rag.v1";
pub const WS_TOKEN_PREFIX: &str = "mentor-rag-token.";
pub const WS_USER_PREFIX: &str = "mentor-rag-user.";

#[derive(Debug, Deserialize, Default)]
pub struct WsIncomingMessage {
    #[serde(rename = "type")]
    pub msg_type: Option<String>,
    pub message: Option<String>,
    #[serde(rename = "chatId")]
    pub chat_id: Option<String>,
}
