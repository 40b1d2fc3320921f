//! Typed views over the merged config value.
//!
//! The config file stays a free-form `serde_json::Value`; each consumer reads
//! the section it needs through one of these structs, falling back to the
//! defaults below for anything missing.

use serde_json::Value;

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com";
pub const DEFAULT_CHAT_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-ada-002";
pub const DEFAULT_TABLE_NAME: &str = "documents";
pub const DEFAULT_QUERY_NAME: &str = "match_documents";
pub const DEFAULT_TOP_K: usize = 4;
pub const DEFAULT_SUPPORT_EMAIL: &str = "help@aplentify.com";

#[derive(Debug, Clone, PartialEq)]
pub struct LlmSettings {
    pub base_url: String,
    pub api_key: Option<String>,
    pub chat_model: String,
    pub rewrite_model: String,
    pub embedding_model: String,
    pub temperature: Option<f64>,
    pub rewrite_temperature: Option<f64>,
    pub timeout_secs: u64,
}

impl LlmSettings {
    pub fn from_config(config: &Value) -> Self {
        let section = config.get("llm");
        let chat_model = str_field(section, "chat_model").unwrap_or_else(|| DEFAULT_CHAT_MODEL.to_string());
        Self {
            base_url: str_field(section, "base_url")
                .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string()),
            api_key: str_field(section, "api_key"),
            rewrite_model: str_field(section, "rewrite_model").unwrap_or_else(|| chat_model.clone()),
            chat_model,
            embedding_model: str_field(section, "embedding_model")
                .unwrap_or_else(|| DEFAULT_EMBEDDING_MODEL.to_string()),
            temperature: section
                .and_then(|v| v.get("temperature"))
                .and_then(|v| v.as_f64()),
            rewrite_temperature: section
                .and_then(|v| v.get("rewrite_temperature"))
                .and_then(|v| v.as_f64()),
            timeout_secs: section
                .and_then(|v| v.get("timeout_secs"))
                .and_then(|v| v.as_u64())
                .unwrap_or(120),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VectorStoreSettings {
    pub url: Option<String>,
    pub service_role_key: Option<String>,
    pub table_name: String,
    pub query_name: String,
    pub timeout_secs: u64,
}

impl VectorStoreSettings {
    pub fn from_config(config: &Value) -> Self {
        let section = config.get("vector_store");
        Self {
            url: str_field(section, "url"),
            service_role_key: str_field(section, "service_role_key"),
            table_name: str_field(section, "table_name").unwrap_or_else(|| DEFAULT_TABLE_NAME.to_string()),
            query_name: str_field(section, "query_name").unwrap_or_else(|| DEFAULT_QUERY_NAME.to_string()),
            timeout_secs: section
                .and_then(|v| v.get("timeout_secs"))
                .and_then(|v| v.as_u64())
                .unwrap_or(30),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RagSettings {
    pub top_k: usize,
    /// `None` keeps the context unbounded.
    pub max_context_chars: Option<usize>,
}

impl Default for RagSettings {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            max_context_chars: None,
        }
    }
}

impl RagSettings {
    pub fn from_config(config: &Value) -> Self {
        let section = config.get("rag");
        Self {
            top_k: section
                .and_then(|v| v.get("top_k"))
                .and_then(|v| v.as_u64())
                .map(|v| v as usize)
                .unwrap_or(DEFAULT_TOP_K),
            max_context_chars: section
                .and_then(|v| v.get("max_context_chars"))
                .and_then(|v| v.as_u64())
                .map(|v| v as usize),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PromptSettings {
    pub support_email: String,
    /// Replaces the built-in persona paragraph when set.
    pub persona: Option<String>,
}

impl Default for PromptSettings {
    fn default() -> Self {
        Self {
            support_email: DEFAULT_SUPPORT_EMAIL.to_string(),
            persona: None,
        }
    }
}

impl PromptSettings {
    pub fn from_config(config: &Value) -> Self {
        let section = config.get("prompts");
        Self {
            support_email: str_field(section, "support_email")
                .unwrap_or_else(|| DEFAULT_SUPPORT_EMAIL.to_string()),
            persona: str_field(section, "persona"),
        }
    }
}

pub fn cors_allowed_origins(config: &Value) -> Vec<String> {
    string_list(config, "cors_allowed_origins")
}

pub fn ws_allowed_origins(config: &Value) -> Vec<String> {
    let explicit = string_list(config, "ws_allowed_origins");
    if explicit.is_empty() {
        cors_allowed_origins(config)
    } else {
        explicit
    }
}

fn string_list(config: &Value, key: &str) -> Vec<String> {
    config
        .get("server")
        .and_then(|server| server.get(key))
        .and_then(|list| list.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.as_str().map(|s| s.to_string()))
                .collect()
        })
        .unwrap_or_default()
}

fn str_field(section: Option<&Value>, key: &str) -> Option<String> {
    section
        .and_then(|v| v.get(key))
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}
