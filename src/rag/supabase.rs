//! Supabase (pgvector) vector store.
//!
//! Searches through the PostgREST RPC endpoint of a `match_documents`-style
//! SQL function and inserts into the backing table. The index itself lives
//! entirely on the hosted side.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::core::config::VectorStoreSettings;
use crate::core::errors::ApiError;
use super::store::{NewDocument, RetrievedDocument, VectorStore};

pub struct SupabaseVectorStore {
    url: String,
    service_key: String,
    table_name: String,
    query_name: String,
    client: Client,
}

/// One row returned by the match function.
#[derive(Debug, Deserialize)]
struct MatchRow {
    content: String,
    #[serde(default)]
    metadata: Option<Map<String, Value>>,
    #[serde(default)]
    similarity: Option<f64>,
}

impl SupabaseVectorStore {
    pub fn new(
        url: String,
        service_key: String,
        table_name: String,
        query_name: String,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ApiError::internal)?;
        Ok(Self {
            url: url.trim_end_matches('/').to_string(),
            service_key,
            table_name,
            query_name,
            client,
        })
    }

    pub fn from_settings(settings: &VectorStoreSettings) -> Result<Self, ApiError> {
        let url = settings
            .url
            .clone()
            .ok_or_else(|| ApiError::BadRequest("vector_store.url is not configured".to_string()))?;
        let key = settings.service_role_key.clone().ok_or_else(|| {
            ApiError::BadRequest("vector_store.service_role_key is not configured".to_string())
        })?;
        Self::new(
            url,
            key,
            settings.table_name.clone(),
            settings.query_name.clone(),
            Duration::from_secs(settings.timeout_secs),
        )
    }

    fn post(&self, path: &str) -> RequestBuilder {
        self.client
            .post(format!("{}/rest/v1/{}", self.url, path))
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
    }

    fn match_body(query_embedding: &[f32], k: usize) -> Value {
        json!({
            "query_embedding": query_embedding,
            "match_count": k,
            "filter": {},
        })
    }
}

#[async_trait]
impl VectorStore for SupabaseVectorStore {
    async fn similarity_search(
        &self,
        query_embedding: &[f32],
        k: usize,
    ) -> Result<Vec<RetrievedDocument>, ApiError> {
        let res = self
            .post(&format!("rpc/{}", self.query_name))
            .json(&Self::match_body(query_embedding, k))
            .send()
            .await
            .map_err(ApiError::upstream)?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(ApiError::Upstream(format!(
                "Supabase {} error ({}): {}",
                self.query_name, status, text
            )));
        }

        let rows: Vec<MatchRow> = res.json().await.map_err(ApiError::upstream)?;
        tracing::debug!(matches = rows.len(), "Vector search returned");

        Ok(rows
            .into_iter()
            .take(k)
            .map(|row| RetrievedDocument {
                content: row.content,
                metadata: row.metadata.unwrap_or_default(),
                score: row.similarity.unwrap_or_default() as f32,
            })
            .collect())
    }

    async fn add_documents(
        &self,
        items: Vec<(NewDocument, Vec<f32>)>,
    ) -> Result<usize, ApiError> {
        if items.is_empty() {
            return Ok(0);
        }

        let rows: Vec<Value> = items
            .iter()
            .map(|(doc, embedding)| {
                json!({
                    "content": doc.content,
                    "metadata": doc.metadata,
                    "embedding": embedding,
                })
            })
            .collect();

        let res = self
            .post(&self.table_name)
            .header("Prefer", "return=minimal")
            .json(&rows)
            .send()
            .await
            .map_err(ApiError::upstream)?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(ApiError::Upstream(format!(
                "Supabase insert into {} failed ({}): {}",
                self.table_name, status, text
            )));
        }

        Ok(rows.len())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use axum::extract::{Path, State};
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use axum::{Json, Router};
    use tokio::net::TcpListener;

    use super::*;

    #[derive(Clone, Default)]
    struct Seen {
        bodies: Arc<Mutex<Vec<(String, Value)>>>,
    }

    async fn rest(
        State(seen): State<Seen>,
        Path(path): Path<String>,
        headers: HeaderMap,
        Json(body): Json<Value>,
    ) -> (StatusCode, Json<Value>) {
        if headers.get("apikey").and_then(|v| v.to_str().ok()) != Some("service-key") {
            return (StatusCode::UNAUTHORIZED, Json(json!({ "message": "bad key" })));
        }
        seen.bodies.lock().unwrap().push((path.clone(), body));
        if path == "documents" {
            return (StatusCode::CREATED, Json(Value::Null));
        }
        (
            StatusCode::OK,
            Json(json!([
                { "id": 1, "content": "Ada mentors visual learners", "metadata": { "mentor": "ada" }, "similarity": 0.91 },
                { "id": 2, "content": "Grace mentors systems students", "metadata": null, "similarity": 0.72 }
            ])),
        )
    }

    async fn serve_fake_supabase(seen: Seen) -> String {
        let app = Router::new()
            .route("/rest/v1/*path", post(rest))
            .with_state(seen);
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        format!("http://{}", addr)
    }

    fn store(url: String, key: &str) -> SupabaseVectorStore {
        SupabaseVectorStore::new(
            url,
            key.to_string(),
            "documents".to_string(),
            "match_documents".to_string(),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn similarity_search_calls_match_function_and_keeps_order() {
        let seen = Seen::default();
        let url = serve_fake_supabase(seen.clone()).await;

        let docs = store(url, "service-key")
            .similarity_search(&[0.1, 0.2], 2)
            .await
            .unwrap();

        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].content, "Ada mentors visual learners");
        assert_eq!(docs[0].metadata["mentor"], "ada");
        assert!(docs[0].score > docs[1].score);
        assert!(docs[1].metadata.is_empty());

        let bodies = seen.bodies.lock().unwrap();
        let (path, body) = &bodies[0];
        assert_eq!(path, "rpc/match_documents");
        assert_eq!(body["match_count"], 2);
        assert_eq!(body["query_embedding"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn add_documents_inserts_into_table() {
        let seen = Seen::default();
        let url = serve_fake_supabase(seen.clone()).await;

        let written = store(url, "service-key")
            .add_documents(vec![(
                NewDocument {
                    content: "Linus mentors kernel hackers".to_string(),
                    metadata: Map::new(),
                },
                vec![0.3, 0.4],
            )])
            .await
            .unwrap();

        assert_eq!(written, 1);
        let bodies = seen.bodies.lock().unwrap();
        assert_eq!(bodies[0].0, "documents");
        assert_eq!(bodies[0].1[0]["content"], "Linus mentors kernel hackers");
    }

    #[tokio::test]
    async fn rejected_key_is_upstream_error() {
        let url = serve_fake_supabase(Seen::default()).await;

        let err = store(url, "wrong").similarity_search(&[0.1], 4).await.unwrap_err();

        assert!(matches!(err, ApiError::Upstream(msg) if msg.contains("401")));
    }

    #[test]
    fn missing_url_is_reported() {
        let settings = VectorStoreSettings {
            url: None,
            service_role_key: Some("k".to_string()),
            table_name: "documents".to_string(),
            query_name: "match_documents".to_string(),
            timeout_secs: 5,
        };
        assert!(matches!(
            SupabaseVectorStore::from_settings(&settings),
            Err(ApiError::BadRequest(msg)) if msg.contains("vector_store.url")
        ));
    }
}
