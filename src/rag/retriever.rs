use std::sync::Arc;

use crate::core::errors::ApiError;
use crate::llm::LlmProvider;
use super::store::{NewDocument, RetrievedDocument, VectorStore};

/// Embeds text with the hosted embedding model and runs it against the
/// vector store.
#[derive(Clone)]
pub struct Retriever {
    embedder: Arc<dyn LlmProvider>,
    embedding_model: String,
    store: Arc<dyn VectorStore>,
    top_k: usize,
}

impl Retriever {
    pub fn new(
        embedder: Arc<dyn LlmProvider>,
        embedding_model: String,
        store: Arc<dyn VectorStore>,
        top_k: usize,
    ) -> Self {
        Self {
            embedder,
            embedding_model,
            store,
            top_k: top_k.max(1),
        }
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    pub async fn retrieve(&self, query: &str) -> Result<Vec<RetrievedDocument>, ApiError> {
        let query_embedding = self.embed_one(query).await?;
        let documents = self
            .store
            .similarity_search(&query_embedding, self.top_k)
            .await?;
        tracing::debug!(documents = documents.len(), "Retrieved documents");
        Ok(documents)
    }

    /// Embeds and stores new documents. Returns how many were written.
    pub async fn add_documents(&self, documents: Vec<NewDocument>) -> Result<usize, ApiError> {
        if documents.is_empty() {
            return Ok(0);
        }
        let inputs: Vec<String> = documents.iter().map(|d| d.content.clone()).collect();
        let embeddings = self.embedder.embed(&inputs, &self.embedding_model).await?;
        let items = documents.into_iter().zip(embeddings).collect();
        self.store.add_documents(items).await
    }

    async fn embed_one(&self, text: &str) -> Result<Vec<f32>, ApiError> {
        self.embedder
            .embed(&[text.to_string()], &self.embedding_model)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ApiError::Upstream("embedding response was empty".to_string()))
    }
}
