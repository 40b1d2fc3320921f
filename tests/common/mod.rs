#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use mentor_rag::chat::{ChatStore, QuestionRewriter, RetrievalPipeline};
use mentor_rag::chat::prompt::AnswerPrompt;
use mentor_rag::core::config::{AppPaths, ConfigService};
use mentor_rag::core::errors::ApiError;
use mentor_rag::core::security::SessionToken;
use mentor_rag::llm::{ChatRequest, ChatStream, LlmProvider};
use mentor_rag::rag::{NewDocument, RetrievedDocument, Retriever, VectorStore};
use mentor_rag::server::router::router;
use mentor_rag::state::AppState;

pub const TOKEN: &str = "test-session-token";
pub const ORIGIN: &str = "http://localhost:5173";

pub const MENTOR_DOCS: [&str; 2] = [
    "Ada Lovelace: mentors students who learn best visually, with diagrams and sketches.",
    "Grace Hopper: mentors compiler and systems projects.",
];

/// Scripted hosted model: a fixed rewrite and a fixed answer split in deltas.
pub struct ScriptedLlm {
    pub rewrite: String,
    pub deltas: Vec<String>,
    pub answer_requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedLlm {
    pub fn new(rewrite: &str, deltas: &[&str]) -> Self {
        Self {
            rewrite: rewrite.to_string(),
            deltas: deltas.iter().map(|d| d.to_string()).collect(),
            answer_requests: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl LlmProvider for ScriptedLlm {
    async fn chat(&self, _request: ChatRequest, _model_id: &str) -> Result<String, ApiError> {
        Ok(self.rewrite.clone())
    }

    async fn stream_chat(
        &self,
        request: ChatRequest,
        _model_id: &str,
    ) -> Result<ChatStream, ApiError> {
        self.answer_requests.lock().unwrap().push(request);
        let (tx, rx) = mpsc::channel(32);
        let deltas = self.deltas.clone();
        tokio::spawn(async move {
            for delta in deltas {
                if tx.send(Ok(delta)).await.is_err() {
                    return;
                }
            }
        });
        Ok(rx)
    }

    async fn embed(&self, inputs: &[String], _model_id: &str) -> Result<Vec<Vec<f32>>, ApiError> {
        Ok(inputs.iter().map(|_| vec![0.1, 0.2, 0.3]).collect())
    }
}

#[derive(Default)]
pub struct MemoryStore {
    pub documents: Mutex<Vec<RetrievedDocument>>,
}

impl MemoryStore {
    pub fn with_documents(contents: &[&str]) -> Self {
        Self {
            documents: Mutex::new(contents.iter().map(|c| RetrievedDocument::new(*c)).collect()),
        }
    }
}

#[async_trait]
impl VectorStore for MemoryStore {
    async fn similarity_search(
        &self,
        _query_embedding: &[f32],
        k: usize,
    ) -> Result<Vec<RetrievedDocument>, ApiError> {
        Ok(self.documents.lock().unwrap().iter().take(k).cloned().collect())
    }

    async fn add_documents(
        &self,
        documents: Vec<(NewDocument, Vec<f32>)>,
    ) -> Result<usize, ApiError> {
        let count = documents.len();
        let mut stored = self.documents.lock().unwrap();
        for (doc, _) in documents {
            let mut retrieved = RetrievedDocument::new(doc.content);
            retrieved.metadata = doc.metadata;
            stored.push(retrieved);
        }
        Ok(count)
    }
}

pub struct TestServer {
    pub addr: SocketAddr,
    pub state: Arc<AppState>,
    pub llm: Arc<ScriptedLlm>,
    pub store: Arc<MemoryStore>,
    _dir: tempfile::TempDir,
}

pub async fn spawn_server(llm: ScriptedLlm, store: MemoryStore) -> TestServer {
    let dir = tempfile::tempdir().unwrap();
    let paths = Arc::new(AppPaths::with_data_dir(
        dir.path().to_path_buf(),
        dir.path().join("data"),
    ));
    let config = ConfigService::new(paths.clone());
    let chats = ChatStore::new(paths.db_path.clone()).await.unwrap();

    let llm = Arc::new(llm);
    let store = Arc::new(store);
    let retriever = Retriever::new(llm.clone(), "embed".to_string(), store.clone(), 4);
    let rewriter = QuestionRewriter::new(llm.clone(), "rewrite".to_string(), Some(0.0));
    let pipeline = RetrievalPipeline::new(
        llm.clone(),
        rewriter,
        retriever,
        AnswerPrompt::default(),
        "chat".to_string(),
        None,
        None,
    );

    let state = AppState::from_parts(paths, config, SessionToken::new(TOKEN), chats, pipeline);
    let app = router(state.clone());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestServer {
        addr,
        state,
        llm,
        store,
        _dir: dir,
    }
}
