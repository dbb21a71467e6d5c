//! CLI command implementations.
//!
//! Each submodule implements a proofrun CLI command with pure core logic
//! separated from IO for testability. The helpers here build the clients a
//! command needs from the loaded config; nothing is global.

pub mod assistant;
pub mod chat;
pub mod clean;
pub mod init;
pub mod news;
pub mod run;

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::assistant::{AssistantClient, AssistantError, ToolRegistry};
use crate::config::{Config, Secrets};
use crate::embeddings::{ChromaStore, EmbeddingClient, NewsIndex};
use crate::news::{NewsCache, NewsClient};
use crate::retry::RetryController;
use crate::sandbox::DockerSandbox;
use crate::tools::{QueryNewsTool, RunCodeTool};

/// Load `proofrun.toml` from the current directory (defaults if absent).
pub(crate) fn load_config() -> Result<(PathBuf, Config)> {
    let cwd = std::env::current_dir().context("Failed to get current directory")?;
    let config = Config::load(&cwd)?;
    Ok((cwd, config))
}

fn request_timeout(config: &Config) -> Duration {
    Duration::from_secs(config.openai.timeout_secs)
}

pub(crate) fn retry_controller(config: &Config) -> RetryController {
    let sandbox = DockerSandbox::new(config.sandbox.clone());
    RetryController::new(Arc::new(sandbox), config.retry.max_attempts)
}

pub(crate) fn assistant_client(config: &Config, secrets: &Secrets) -> Result<AssistantClient> {
    let api_key = secrets.require_openai()?;
    AssistantClient::new(&config.openai.base_url, api_key, request_timeout(config))
        .context("Failed to build assistant client")
}

pub(crate) fn news_index(config: &Config, secrets: &Secrets) -> Result<NewsIndex> {
    let api_key = secrets.require_openai()?;
    let embedder = EmbeddingClient::new(
        &config.openai.base_url,
        api_key,
        &config.embeddings.model,
        request_timeout(config),
    )
    .context("Failed to build embedding client")?;
    let store = ChromaStore::new(
        &config.vector_store.url,
        &config.vector_store.collection,
        request_timeout(config),
    )
    .context("Failed to build vector store client")?;

    Ok(NewsIndex::new(
        Arc::new(embedder),
        Arc::new(store),
        config.embeddings.batch_size,
    ))
}

pub(crate) fn news_client(config: &Config) -> Result<(NewsClient, NewsCache)> {
    let client = NewsClient::new(&config.news.base_url, request_timeout(config))
        .context("Failed to build news client")?;
    let cache = NewsCache::new(config.news.resolved_cache_dir(), config.news.cache_ttl_hours);
    Ok((client, cache))
}

/// Wrap an assistant API failure, hinting at the usual fix.
pub(crate) fn assistant_failure(context: &str, err: AssistantError) -> anyhow::Error {
    let hint = if err.is_auth() {
        " (check OPENAI_API_KEY)"
    } else if err.is_not_found() {
        " (check --assistant-id or [assistant] id)"
    } else {
        ""
    };
    anyhow::Error::new(err).context(format!("{context}{hint}"))
}

/// Every tool the assistant can call, plus the hosted code interpreter.
pub(crate) fn tool_registry(config: &Config, secrets: &Secrets) -> Result<ToolRegistry> {
    Ok(ToolRegistry::new()
        .with_code_interpreter()
        .register(RunCodeTool::new(
            retry_controller(config),
            &config.sandbox.dependency,
        ))
        .register(QueryNewsTool::new(news_index(config, secrets)?)))
}
