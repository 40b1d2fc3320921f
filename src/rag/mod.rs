//! RAG (Retrieval-Augmented Generation) module.
//!
//! This module provides:
//! - `VectorStore`: the similarity-search seam, with `SupabaseVectorStore`
//!   as the hosted implementation
//! - `Retriever`: embeds a query and fetches the top-k documents
//! - `combine_documents`: flattens retrieved documents into a context string

mod combine;
mod retriever;
mod store;
mod supabase;

pub use combine::{combine_documents, combine_documents_within, DOCUMENT_SEPARATOR};
pub use retriever::Retriever;
pub use store::{NewDocument, RetrievedDocument, VectorStore};
pub use supabase::SupabaseVectorStore;
