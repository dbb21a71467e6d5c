//! Article ingest and semantic query on top of an embedder and a store.

use serde_json::{Map, Value};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

use super::client::Embedder;
use super::error::{EmbeddingError, Result};
use super::store::{VectorMatch, VectorRecord, VectorStore};
use crate::news::{slugify, Article};

/// Searchable index of news articles.
#[derive(Clone)]
pub(crate) struct NewsIndex {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    batch_size: usize,
}

impl NewsIndex {
    pub fn new(embedder: Arc<dyn Embedder>, store: Arc<dyn VectorStore>, batch_size: usize) -> Self {
        Self {
            embedder,
            store,
            batch_size: batch_size.max(1),
        }
    }

    /// Embed and store articles. Returns the number stored.
    ///
    /// Articles without a title or content are skipped, as are repeated ids.
    pub async fn ingest(&self, articles: &[Article]) -> Result<usize> {
        let mut seen = HashSet::new();
        let pending: Vec<(String, String, Map<String, Value>)> = articles
            .iter()
            .filter_map(|article| {
                let document = article_document(article)?;
                let id = article_id(article);
                seen.insert(id.clone())
                    .then(|| (id, document, article_metadata(article)))
            })
            .collect();

        let skipped = articles.len() - pending.len();
        if skipped > 0 {
            debug!("Skipping {} empty or duplicate articles", skipped);
        }

        let mut stored = 0;
        for batch in pending.chunks(self.batch_size) {
            let documents: Vec<String> = batch.iter().map(|(_, doc, _)| doc.clone()).collect();
            let embeddings = self.embedder.embed(&documents).await?;
            if embeddings.len() != batch.len() {
                return Err(EmbeddingError::CountMismatch {
                    expected: batch.len(),
                    actual: embeddings.len(),
                });
            }

            let records: Vec<VectorRecord> = batch
                .iter()
                .zip(embeddings)
                .map(|((id, document, metadata), embedding)| VectorRecord {
                    id: id.clone(),
                    document: document.clone(),
                    embedding,
                    metadata: metadata.clone(),
                })
                .collect();
            stored += self.store.upsert(&records).await?;
        }

        info!("Stored {} articles", stored);
        Ok(stored)
    }

    /// Articles closest to `text`, closest first.
    pub async fn query(&self, text: &str, n_results: usize) -> Result<Vec<VectorMatch>> {
        let embeddings = self.embedder.embed(&[text.to_string()]).await?;
        let Some(embedding) = embeddings.into_iter().next() else {
            return Err(EmbeddingError::CountMismatch {
                expected: 1,
                actual: 0,
            });
        };
        self.store.query(&embedding, n_results).await
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// `title\n\ndescription\n\ncontent`, skipping missing parts.
///
/// `None` when the article has neither a title nor content.
pub(crate) fn article_document(article: &Article) -> Option<String> {
    let title = non_empty(Some(article.title.as_str()));
    let content = non_empty(article.content.as_deref());
    if title.is_none() && content.is_none() {
        return None;
    }

    let parts: Vec<&str> = [title, non_empty(article.description.as_deref()), content]
        .into_iter()
        .flatten()
        .collect();
    Some(parts.join("\n\n"))
}

/// The article URL, or a slug of its title.
pub(crate) fn article_id(article: &Article) -> String {
    non_empty(article.url.as_deref())
        .map_or_else(|| format!("title-{}", slugify(&article.title)), String::from)
}

fn article_metadata(article: &Article) -> Map<String, Value> {
    let mut metadata = Map::new();
    let fields = [
        ("title", Some(article.title.as_str())),
        ("url", article.url.as_deref()),
        ("author", article.author.as_deref()),
        ("published_at", article.published_at.as_deref()),
        ("source", article.source_name()),
    ];
    for (key, value) in fields {
        if let Some(value) = non_empty(value) {
            metadata.insert(key.to_string(), Value::String(value.to_string()));
        }
    }
    metadata
}
