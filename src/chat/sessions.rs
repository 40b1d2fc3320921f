use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::sync::OwnedMutexGuard;

use crate::core::errors::ApiError;
use crate::core::security::AuthSession;
use super::state::AiState;
use super::store::ChatStore;
use super::types::{new_chat_id, ConversationState};

/// How long a chat that was never saved stays live after its last turn.
pub const DEFAULT_IDLE_TTL: Duration = Duration::from_secs(30 * 60);

type Registry = Arc<Mutex<HashMap<String, Arc<ChatSlot>>>>;

struct ChatSlot {
    owner: Mutex<Option<String>>,
    state: Arc<Mutex<ConversationState>>,
    turn: Arc<tokio::sync::Mutex<()>>,
    idle_since: Mutex<Instant>,
}

impl ChatSlot {
    fn new(owner: Option<String>, state: ConversationState) -> Self {
        Self {
            owner: Mutex::new(owner),
            state: Arc::new(Mutex::new(state)),
            turn: Arc::new(tokio::sync::Mutex::new(())),
            idle_since: Mutex::new(Instant::now()),
        }
    }

    fn owner(&self) -> Option<String> {
        match self.owner.lock() {
            Ok(owner) => owner.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn check_owner(&self, session: Option<&AuthSession>) -> Result<(), ApiError> {
        check_owner(&self.owner(), session)
    }

    fn idle_for(&self) -> Duration {
        match self.idle_since.lock() {
            Ok(since) => since.elapsed(),
            Err(poisoned) => poisoned.into_inner().elapsed(),
        }
    }

    fn touch(&self) {
        match self.idle_since.lock() {
            Ok(mut since) => *since = Instant::now(),
            Err(poisoned) => *poisoned.into_inner() = Instant::now(),
        }
    }
}

/// Exclusive right to run one turn on a chat, held by the turn's `AiState`.
///
/// Dropping the lease frees the chat for the next turn. A chat whose turn
/// was saved leaves the registry right away unless another turn is already
/// waiting for it; the next turn reloads it from the store.
pub struct TurnLease {
    chat_id: String,
    slot: Arc<ChatSlot>,
    chats: Registry,
    saved: AtomicBool,
    guard: Option<OwnedMutexGuard<()>>,
}

impl TurnLease {
    /// Records that the chat was saved for `user_id`, who owns it from now on.
    pub(crate) fn claim(&self, user_id: &str) {
        match self.slot.owner.lock() {
            Ok(mut owner) => *owner = Some(user_id.to_string()),
            Err(poisoned) => *poisoned.into_inner() = Some(user_id.to_string()),
        }
        self.saved.store(true, Ordering::SeqCst);
    }
}

impl Drop for TurnLease {
    fn drop(&mut self) {
        drop(self.guard.take());
        self.slot.touch();
        if !self.saved.load(Ordering::SeqCst) {
            return;
        }
        let Ok(mut chats) = self.chats.lock() else {
            return;
        };
        // Held only by the registry and this lease: no turn is waiting.
        let idle = chats
            .get(&self.chat_id)
            .is_some_and(|slot| Arc::ptr_eq(slot, &self.slot) && Arc::strong_count(slot) == 2);
        if idle {
            chats.remove(&self.chat_id);
            tracing::debug!(chat_id = %self.chat_id, "Saved chat released");
        }
    }
}

/// Live conversation states, one per chat id. Turns on the same chat run
/// one at a time; turns on different chats run concurrently.
#[derive(Clone)]
pub struct ChatSessions {
    store: Option<ChatStore>,
    chats: Registry,
    idle_ttl: Duration,
}

impl ChatSessions {
    pub fn new(store: Option<ChatStore>) -> Self {
        Self {
            store,
            chats: Arc::new(Mutex::new(HashMap::new())),
            idle_ttl: DEFAULT_IDLE_TTL,
        }
    }

    /// Sets how long an unsaved chat stays live without turns.
    pub fn with_idle_ttl(mut self, idle_ttl: Duration) -> Self {
        self.idle_ttl = idle_ttl;
        self
    }

    /// Waits for any running turn on the chat to finish, then returns the
    /// state handle for a new turn. A missing `chat_id` starts a new chat.
    pub async fn begin_turn(
        &self,
        chat_id: Option<String>,
        session: Option<AuthSession>,
    ) -> Result<Arc<AiState>, ApiError> {
        let chat_id = chat_id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(new_chat_id);
        let slot = self.slot(&chat_id, session.as_ref()).await?;
        let guard = slot.turn.clone().lock_owned().await;
        // The previous turn may have claimed the chat while this one waited.
        slot.check_owner(session.as_ref())?;
        tracing::debug!(chat_id = %chat_id, "Turn started");

        let lease = TurnLease {
            chat_id,
            slot: slot.clone(),
            chats: self.chats.clone(),
            saved: AtomicBool::new(false),
            guard: Some(guard),
        };
        let state = AiState::new(slot.state.clone(), self.store.clone(), session).holding(lease);
        Ok(Arc::new(state))
    }

    /// Current state of a chat, or `None` if it is neither live nor stored.
    pub async fn snapshot(
        &self,
        chat_id: &str,
        session: Option<&AuthSession>,
    ) -> Result<Option<ConversationState>, ApiError> {
        if let Some(slot) = self.cached(chat_id) {
            slot.check_owner(session)?;
            return Ok(Some(read(&slot.state)));
        }
        let Some(store) = &self.store else {
            return Ok(None);
        };
        match store.get_chat(chat_id).await? {
            Some(chat) => {
                check_owner(&Some(chat.user_id.clone()), session)?;
                Ok(Some(chat.into_state()))
            }
            None => Ok(None),
        }
    }

    /// Drops the live state of a chat, e.g. after it was deleted.
    pub fn forget(&self, chat_id: &str) {
        if let Ok(mut chats) = self.chats.lock() {
            chats.remove(chat_id);
        }
    }

    #[cfg(test)]
    fn live_chats(&self) -> usize {
        self.chats.lock().map(|chats| chats.len()).unwrap_or(0)
    }

    fn cached(&self, chat_id: &str) -> Option<Arc<ChatSlot>> {
        self.chats
            .lock()
            .ok()
            .and_then(|chats| chats.get(chat_id).cloned())
    }

    async fn slot(
        &self,
        chat_id: &str,
        session: Option<&AuthSession>,
    ) -> Result<Arc<ChatSlot>, ApiError> {
        self.evict_idle();
        if let Some(slot) = self.cached(chat_id) {
            slot.check_owner(session)?;
            return Ok(slot);
        }

        let stored = match &self.store {
            Some(store) => store.get_chat(chat_id).await?,
            None => None,
        };
        let loaded = match stored {
            Some(chat) => {
                let owner = Some(chat.user_id.clone());
                check_owner(&owner, session)?;
                ChatSlot::new(owner, chat.into_state())
            }
            None => ChatSlot::new(
                session.map(|s| s.user_id.clone()),
                ConversationState::new(chat_id),
            ),
        };

        let mut chats = self
            .chats
            .lock()
            .map_err(|_| ApiError::internal("chat registry lock poisoned"))?;
        let slot = chats
            .entry(chat_id.to_string())
            .or_insert_with(|| Arc::new(loaded))
            .clone();
        slot.check_owner(session)?;
        Ok(slot)
    }

    /// Drops unreferenced chats that have had no turn for `idle_ttl`.
    fn evict_idle(&self) {
        let Ok(mut chats) = self.chats.lock() else {
            return;
        };
        let before = chats.len();
        chats.retain(|_, slot| Arc::strong_count(slot) > 1 || slot.idle_for() < self.idle_ttl);
        if chats.len() < before {
            tracing::debug!(evicted = before - chats.len(), "Evicted idle chats");
        }
    }
}

fn check_owner(owner: &Option<String>, session: Option<&AuthSession>) -> Result<(), ApiError> {
    match owner {
        Some(owner) if session.map(|s| &s.user_id) != Some(owner) => Err(ApiError::Forbidden),
        _ => Ok(()),
    }
}

fn read(state: &Mutex<ConversationState>) -> ConversationState {
    match state.lock() {
        Ok(state) => state.clone(),
        Err(poisoned) => poisoned.into_inner().clone(),
    }
}
