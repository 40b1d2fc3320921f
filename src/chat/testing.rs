//! In-memory stand-ins for the hosted services, shared by the chat tests.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::{mpsc, Notify};

use crate::chat::pipeline::{TurnEvent, TurnStream};
use crate::core::errors::ApiError;
use crate::llm::{ChatRequest, ChatStream, LlmProvider};
use crate::rag::{NewDocument, RetrievedDocument, VectorStore};

pub struct FakeLlm {
    rewrite_output: String,
    deltas: Vec<String>,
    fail_chat: bool,
    fail_stream_after: Option<usize>,
    gate: Option<Arc<Notify>>,
    chat_calls: Mutex<Vec<(ChatRequest, String)>>,
    stream_calls: Mutex<Vec<(ChatRequest, String)>>,
    embed_calls: Mutex<Vec<Vec<String>>>,
}

impl FakeLlm {
    pub fn new(rewrite_output: &str, deltas: &[&str]) -> Self {
        Self {
            rewrite_output: rewrite_output.to_string(),
            deltas: deltas.iter().map(|d| d.to_string()).collect(),
            fail_chat: false,
            fail_stream_after: None,
            gate: None,
            chat_calls: Mutex::new(Vec::new()),
            stream_calls: Mutex::new(Vec::new()),
            embed_calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_chat() -> Self {
        Self {
            fail_chat: true,
            ..Self::new("", &[])
        }
    }

    /// Emits the first `after` deltas, then an error.
    pub fn failing_stream(rewrite_output: &str, deltas: &[&str], after: usize) -> Self {
        Self {
            fail_stream_after: Some(after),
            ..Self::new(rewrite_output, deltas)
        }
    }

    /// Holds each stream open until `gate` is notified.
    pub fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn chat_calls(&self) -> Vec<(ChatRequest, String)> {
        self.chat_calls.lock().unwrap().clone()
    }

    pub fn stream_calls(&self) -> Vec<(ChatRequest, String)> {
        self.stream_calls.lock().unwrap().clone()
    }

    pub fn embed_calls(&self) -> Vec<Vec<String>> {
        self.embed_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmProvider for FakeLlm {
    async fn chat(&self, request: ChatRequest, model_id: &str) -> Result<String, ApiError> {
        self.chat_calls
            .lock()
            .unwrap()
            .push((request, model_id.to_string()));
        if self.fail_chat {
            return Err(ApiError::Upstream("chat unavailable".to_string()));
        }
        Ok(self.rewrite_output.clone())
    }

    async fn stream_chat(
        &self,
        request: ChatRequest,
        model_id: &str,
    ) -> Result<ChatStream, ApiError> {
        self.stream_calls
            .lock()
            .unwrap()
            .push((request, model_id.to_string()));
        let (tx, rx) = mpsc::channel(32);
        let deltas = self.deltas.clone();
        let fail_after = self.fail_stream_after;
        let gate = self.gate.clone();
        tokio::spawn(async move {
            if let Some(gate) = gate {
                gate.notified().await;
            }
            let limit = fail_after.unwrap_or(usize::MAX);
            for delta in deltas.into_iter().take(limit) {
                if tx.send(Ok(delta)).await.is_err() {
                    return;
                }
            }
            if fail_after.is_some() {
                let _ = tx
                    .send(Err(ApiError::Upstream("stream interrupted".to_string())))
                    .await;
            }
        });
        Ok(rx)
    }

    async fn embed(&self, inputs: &[String], _model_id: &str) -> Result<Vec<Vec<f32>>, ApiError> {
        self.embed_calls.lock().unwrap().push(inputs.to_vec());
        Ok(inputs
            .iter()
            .map(|text| vec![text.len() as f32, 1.0])
            .collect())
    }
}

#[derive(Default)]
pub struct FakeVectorStore {
    documents: Vec<RetrievedDocument>,
    fail: bool,
    searches: Mutex<Vec<(Vec<f32>, usize)>>,
    added: Mutex<Vec<(NewDocument, Vec<f32>)>>,
}

impl FakeVectorStore {
    pub fn with_documents(contents: &[&str]) -> Self {
        Self {
            documents: contents.iter().map(|c| RetrievedDocument::new(*c)).collect(),
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn searches(&self) -> Vec<(Vec<f32>, usize)> {
        self.searches.lock().unwrap().clone()
    }

    pub fn added(&self) -> Vec<(NewDocument, Vec<f32>)> {
        self.added.lock().unwrap().clone()
    }
}

#[async_trait]
impl VectorStore for FakeVectorStore {
    async fn similarity_search(
        &self,
        query_embedding: &[f32],
        k: usize,
    ) -> Result<Vec<RetrievedDocument>, ApiError> {
        self.searches
            .lock()
            .unwrap()
            .push((query_embedding.to_vec(), k));
        if self.fail {
            return Err(ApiError::Upstream("vector store unavailable".to_string()));
        }
        Ok(self.documents.iter().take(k).cloned().collect())
    }

    async fn add_documents(
        &self,
        documents: Vec<(NewDocument, Vec<f32>)>,
    ) -> Result<usize, ApiError> {
        let count = documents.len();
        self.added.lock().unwrap().extend(documents);
        Ok(count)
    }
}

/// Drains a turn, returning the streamed text and the final event.
pub async fn collect_turn(mut stream: TurnStream) -> (String, Option<TurnEvent>) {
    let mut text = String::new();
    let mut last = None;
    while let Some(event) = stream.recv().await {
        match event {
            TurnEvent::Delta(delta) => text.push_str(&delta),
            other => last = Some(other),
        }
    }
    (text, last)
}
