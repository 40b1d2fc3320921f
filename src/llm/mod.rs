pub mod openai;
pub mod provider;
pub mod types;

pub use openai::OpenAiProvider;
pub use provider::{ChatStream, LlmProvider};
pub use types::{ChatMessage, ChatRequest};
