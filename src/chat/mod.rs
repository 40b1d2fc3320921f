//! Conversation handling: the retrieval pipeline, per-chat state and the
//! persisted chat records.

pub mod history;
pub mod pipeline;
pub mod prompt;
pub mod rewriter;
pub mod sessions;
pub mod state;
pub mod store;
#[cfg(test)]
pub(crate) mod testing;
pub mod types;

pub use history::format_conv_history;
pub use pipeline::{PreparedTurn, RetrievalPipeline, TurnEvent, TurnStream};
pub use rewriter::QuestionRewriter;
pub use sessions::{ChatSessions, TurnLease};
pub use state::{AiState, ConversationStateStore};
pub use store::{ChatStore, ChatSummary};
pub use types::{Chat, ConversationState, Message, Role};
