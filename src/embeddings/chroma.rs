//! Chroma vector store over its HTTP API (v1).

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use super::error::{error_message, EmbeddingError, Result};
use super::store::{VectorMatch, VectorRecord, VectorStore};

#[derive(Debug, Deserialize)]
struct Collection {
    id: String,
    name: String,
}

#[derive(Debug, Serialize)]
struct UpsertRequest<'a> {
    ids: Vec<&'a str>,
    embeddings: Vec<&'a [f32]>,
    documents: Vec<&'a str>,
    metadatas: Vec<&'a Map<String, Value>>,
}

/// Column-oriented query result, one inner list per query embedding.
#[derive(Debug, Deserialize)]
struct QueryResponse {
    ids: Vec<Vec<String>>,
    #[serde(default)]
    documents: Option<Vec<Vec<Option<String>>>>,
    #[serde(default)]
    metadatas: Option<Vec<Vec<Option<Map<String, Value>>>>>,
    #[serde(default)]
    distances: Option<Vec<Vec<f32>>>,
}

/// A Chroma collection, created on first use.
#[derive(Debug)]
pub(crate) struct ChromaStore {
    base_url: String,
    collection: String,
    http: reqwest::Client,
    collection_id: OnceCell<String>,
}

impl ChromaStore {
    pub fn new(base_url: &str, collection: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            collection: collection.to_string(),
            http,
            collection_id: OnceCell::new(),
        })
    }

    /// Id of the collection, creating it if needed.
    async fn collection_id(&self) -> Result<&str> {
        let id = self
            .collection_id
            .get_or_try_init(|| async {
                let collection: Collection = self
                    .post(
                        "/api/v1/collections",
                        &json!({"name": self.collection, "get_or_create": true}),
                    )
                    .await?;
                info!("Using Chroma collection '{}' ({})", collection.name, collection.id);
                Ok::<_, EmbeddingError>(collection.id)
            })
            .await?;
        Ok(id.as_str())
    }

    async fn post<T: DeserializeOwned>(&self, path: &str, body: &impl Serialize) -> Result<T> {
        let url = format!("{}{path}", self.base_url);
        debug!("POST {}", url);

        let response = self.http.post(&url).json(body).send().await?;
        let status = response.status().as_u16();
        let text = response.text().await?;

        if status >= 400 {
            return Err(EmbeddingError::Store {
                status,
                message: error_message(&text),
            });
        }
        Ok(serde_json::from_str(&text)?)
    }
}

#[async_trait]
impl VectorStore for ChromaStore {
    async fn upsert(&self, records: &[VectorRecord]) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }
        let id = self.collection_id().await?;

        let body = UpsertRequest {
            ids: records.iter().map(|r| r.id.as_str()).collect(),
            embeddings: records.iter().map(|r| r.embedding.as_slice()).collect(),
            documents: records.iter().map(|r| r.document.as_str()).collect(),
            metadatas: records.iter().map(|r| &r.metadata).collect(),
        };
        let _: Value = self
            .post(&format!("/api/v1/collections/{id}/upsert"), &body)
            .await?;
        Ok(records.len())
    }

    async fn query(&self, embedding: &[f32], n_results: usize) -> Result<Vec<VectorMatch>> {
        let id = self.collection_id().await?;
        let body = json!({
            "query_embeddings": [embedding],
            "n_results": n_results,
            "include": ["documents", "metadatas", "distances"],
        });
        let response: QueryResponse = self
            .post(&format!("/api/v1/collections/{id}/query"), &body)
            .await?;
        Ok(into_matches(response))
    }
}

/// Zip the first result row into matches, closest first.
fn into_matches(response: QueryResponse) -> Vec<VectorMatch> {
    let ids = response.ids.into_iter().next().unwrap_or_default();
    let mut documents = response
        .documents
        .and_then(|d| d.into_iter().next())
        .unwrap_or_default()
        .into_iter();
    let mut metadatas = response
        .metadatas
        .and_then(|m| m.into_iter().next())
        .unwrap_or_default()
        .into_iter();
    let mut distances = response
        .distances
        .and_then(|d| d.into_iter().next())
        .unwrap_or_default()
        .into_iter();

    let mut matches: Vec<VectorMatch> = ids
        .into_iter()
        .map(|id| VectorMatch {
            id,
            document: documents.next().flatten().unwrap_or_default(),
            metadata: metadatas.next().flatten().unwrap_or_default(),
            distance: distances.next().unwrap_or(f32::INFINITY),
        })
        .collect();
    matches.sort_by(|a, b| a.distance.total_cmp(&b.distance));
    matches
}
