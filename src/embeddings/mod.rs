//! Embeddings and vector search for news articles.

mod chroma;
mod client;
mod error;
mod pipeline;
mod store;

pub(crate) use chroma::ChromaStore;
pub(crate) use client::EmbeddingClient;
pub(crate) use pipeline::NewsIndex;
pub(crate) use store::VectorMatch;

#[cfg(test)]
pub(crate) use client::mock::MockEmbedder;
#[cfg(test)]
pub(crate) use store::mock::MemoryStore;
