//! VectorStore trait: the seam over the hosted similarity search.
//!
//! The primary implementation is `SupabaseVectorStore` in the `supabase`
//! module. Tests substitute in-memory stores.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::core::errors::ApiError;

/// A document returned by a similarity search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedDocument {
    /// The text content of the document.
    pub content: String,
    /// Free-form metadata stored alongside the document.
    #[serde(default)]
    pub metadata: Map<String, Value>,
    /// Similarity score (higher = better).
    #[serde(default)]
    pub score: f32,
}

impl RetrievedDocument {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            metadata: Map::new(),
            score: 0.0,
        }
    }
}

/// A document to be embedded and added to the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewDocument {
    pub content: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Return the `k` documents most similar to the query embedding, best
    /// match first.
    async fn similarity_search(
        &self,
        query_embedding: &[f32],
        k: usize,
    ) -> Result<Vec<RetrievedDocument>, ApiError>;

    /// Insert documents with their embeddings (same order). Returns the
    /// number of rows written.
    async fn add_documents(
        &self,
        items: Vec<(NewDocument, Vec<f32>)>,
    ) -> Result<usize, ApiError>;
}
