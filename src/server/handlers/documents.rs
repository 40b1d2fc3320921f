use std::sync::Arc;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use axum::http::HeaderMap;
use serde::Deserialize;
use serde_json::json;

use crate::rag::NewDocument;
use crate::state::AppState;
use crate::core::errors::ApiError;
use crate::core::security::require_api_key;

#[derive(Debug, Deserialize)]
pub struct AddDocumentsRequest {
    pub documents: Vec<NewDocument>,
}

pub async fn add_documents(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<AddDocumentsRequest>,
) -> Result<impl IntoResponse, ApiError> {
    require_api_key(&headers, &state.session_token)?;
    if payload.documents.iter().any(|d| d.content.trim().is_empty()) {
        return Err(ApiError::BadRequest(
            "documents must have non-empty content".to_string(),
        ));
    }
    let added = state
        .pipeline
        .retriever()
        .add_documents(payload.documents)
        .await?;
    tracing::info!(added, "Documents ingested");
    Ok(Json(json!({ "added": added })))
}
