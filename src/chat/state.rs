use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;

use crate::core::errors::ApiError;
use crate::core::security::AuthSession;
use super::sessions::TurnLease;
use super::store::ChatStore;
use super::types::{Chat, ConversationState};

/// The mutable conversation state of one running turn.
///
/// `update` publishes an intermediate state, `done` publishes the final one
/// and ends the turn. A turn may be finished only once.
#[async_trait]
pub trait ConversationStateStore: Send + Sync {
    fn get(&self) -> ConversationState;

    fn update(&self, state: ConversationState);

    async fn done(&self, state: ConversationState) -> Result<(), ApiError>;
}

/// State handle for one turn, writing through to the shared in-memory slot
/// of its chat and persisting the final state for signed-in users.
pub struct AiState {
    slot: Arc<Mutex<ConversationState>>,
    store: Option<ChatStore>,
    session: Option<AuthSession>,
    finished: AtomicBool,
    lease: Option<TurnLease>,
}

impl AiState {
    pub fn new(
        slot: Arc<Mutex<ConversationState>>,
        store: Option<ChatStore>,
        session: Option<AuthSession>,
    ) -> Self {
        Self {
            slot,
            store,
            session,
            finished: AtomicBool::new(false),
            lease: None,
        }
    }

    /// Keeps the chat's turn lease until this handle is dropped.
    pub fn holding(mut self, lease: TurnLease) -> Self {
        self.lease = Some(lease);
        self
    }

    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }

    fn write(&self, state: ConversationState) {
        match self.slot.lock() {
            Ok(mut slot) => *slot = state,
            Err(poisoned) => *poisoned.into_inner() = state,
        }
    }
}

#[async_trait]
impl ConversationStateStore for AiState {
    fn get(&self) -> ConversationState {
        match self.slot.lock() {
            Ok(slot) => slot.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn update(&self, state: ConversationState) {
        self.write(state);
    }

    async fn done(&self, state: ConversationState) -> Result<(), ApiError> {
        if self.finished.swap(true, Ordering::SeqCst) {
            return Err(ApiError::internal("conversation turn already finished"));
        }

        let (Some(store), Some(session)) = (&self.store, &self.session) else {
            tracing::debug!(chat_id = %state.chat_id, "No signed-in user; chat not persisted");
            self.write(state);
            return Ok(());
        };

        // The live state only advances once the record is saved.
        let chat = Chat::from_state(&state, &session.user_id, Utc::now());
        store.save_chat(&chat).await?;
        if let Some(lease) = &self.lease {
            lease.claim(&session.user_id);
        }
        self.write(state);
        tracing::info!(
            chat_id = %chat.id,
            messages = chat.messages.len(),
            "Chat saved"
        );
        Ok(())
    }
}
