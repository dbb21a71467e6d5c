//! Vector store abstraction.

use async_trait::async_trait;
use serde_json::{Map, Value};

use super::error::Result;

/// A document and its embedding, ready to store.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct VectorRecord {
    pub id: String,
    pub document: String,
    pub embedding: Vec<f32>,
    /// Flat string/number/bool values only.
    pub metadata: Map<String, Value>,
}

/// A stored document near a query vector.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct VectorMatch {
    pub id: String,
    pub document: String,
    /// Lower is closer.
    pub distance: f32,
    pub metadata: Map<String, Value>,
}

#[async_trait]
pub(crate) trait VectorStore: Send + Sync {
    /// Insert or replace records by id. Returns how many were written.
    async fn upsert(&self, records: &[VectorRecord]) -> Result<usize>;

    /// Up to `n_results` nearest records, closest first.
    async fn query(&self, embedding: &[f32], n_results: usize) -> Result<Vec<VectorMatch>>;
}
