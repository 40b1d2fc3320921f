use std::sync::Arc;

use crate::chat::{ChatSessions, ChatStore, RetrievalPipeline};
use crate::core::config::{
    AppPaths, ConfigService, LlmSettings, PromptSettings, RagSettings, VectorStoreSettings,
};
use crate::core::security::{init_session_token, SessionToken};
use crate::llm::{LlmProvider, OpenAiProvider};
use crate::rag::{Retriever, SupabaseVectorStore, VectorStore};

pub mod error;

use error::InitializationError;

/// Global application state shared across all routes.
///
/// Contains references to:
/// - Configuration and paths
/// - The chat store and the live chat sessions
/// - The retrieval pipeline with its hosted model and vector store clients
#[derive(Clone)]
pub struct AppState {
    pub paths: Arc<AppPaths>,
    pub config: ConfigService,
    pub session_token: SessionToken,
    pub chats: ChatStore,
    pub sessions: ChatSessions,
    pub pipeline: RetrievalPipeline,
}

impl AppState {
    /// Initializes the application state.
    ///
    /// This process includes:
    /// 1. Loading configuration from `paths`
    /// 2. Opening the chat database
    /// 3. Building the hosted model and vector store clients
    /// 4. Wiring the retrieval pipeline
    pub async fn initialize(paths: Arc<AppPaths>) -> Result<Arc<Self>, InitializationError> {
        let config = ConfigService::new(paths.clone());
        let loaded = config
            .load_config()
            .map_err(|e| InitializationError::Config(e.into()))?;
        let session_token = init_session_token(&paths.user_data_dir);

        let chats = ChatStore::new(paths.db_path.clone())
            .await
            .map_err(|e| InitializationError::ChatStore(e.into()))?;

        let llm_settings = LlmSettings::from_config(&loaded);
        let llm: Arc<dyn LlmProvider> = Arc::new(
            OpenAiProvider::from_settings(&llm_settings)
                .map_err(|e| InitializationError::Llm(e.into()))?,
        );

        let store: Arc<dyn VectorStore> = Arc::new(
            SupabaseVectorStore::from_settings(&VectorStoreSettings::from_config(&loaded))
                .map_err(|e| InitializationError::VectorStore(e.into()))?,
        );

        let rag = RagSettings::from_config(&loaded);
        let retriever = Retriever::new(
            llm.clone(),
            llm_settings.embedding_model.clone(),
            store,
            rag.top_k,
        );
        let pipeline = RetrievalPipeline::from_settings(
            llm,
            retriever,
            &llm_settings,
            &rag,
            &PromptSettings::from_config(&loaded),
        );

        tracing::info!(
            chat_model = %llm_settings.chat_model,
            embedding_model = %llm_settings.embedding_model,
            top_k = rag.top_k,
            "Retrieval pipeline ready"
        );

        Ok(Self::from_parts(paths, config, session_token, chats, pipeline))
    }

    /// Assembles state from already-built parts.
    pub fn from_parts(
        paths: Arc<AppPaths>,
        config: ConfigService,
        session_token: SessionToken,
        chats: ChatStore,
        pipeline: RetrievalPipeline,
    ) -> Arc<Self> {
        let sessions = ChatSessions::new(Some(chats.clone()));
        Arc::new(AppState {
            paths,
            config,
            session_token,
            chats,
            sessions,
            pipeline,
        })
    }
}
