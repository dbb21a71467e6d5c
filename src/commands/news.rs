//! Fetch news into the vector store and query it.

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::fmt::Write;

use crate::config::Secrets;
use crate::embeddings::VectorMatch;

use super::{load_config, news_client, news_index};

#[derive(Subcommand, Debug, Clone)]
pub enum NewsAction {
    /// Fetch articles and store their embeddings
    Ingest {
        /// Search query (defaults to [news].query)
        #[arg(short, long)]
        query: Option<String>,

        /// Number of articles to request (defaults to [news].page_size)
        #[arg(short, long)]
        count: Option<u32>,

        /// Ignore cached results
        #[arg(long)]
        refresh: bool,
    },

    /// Find stored articles closest to TEXT
    Query {
        text: String,

        /// Number of results
        #[arg(short = 'n', long, default_value = "5")]
        num_results: usize,
    },
}

/// Entry point for `proofrun news`.
pub(crate) async fn run(action: NewsAction) -> Result<()> {
    match action {
        NewsAction::Ingest {
            query,
            count,
            refresh,
        } => ingest(query, count, refresh).await,
        NewsAction::Query { text, num_results } => query(&text, num_results).await,
    }
}

async fn ingest(query: Option<String>, count: Option<u32>, refresh: bool) -> Result<()> {
    let (_, config) = load_config()?;
    let secrets = Secrets::from_env();
    let query = query.unwrap_or_else(|| config.news.query.clone());
    let count = count.unwrap_or(config.news.page_size);

    let (client, cache) = news_client(&config)?;
    let articles = client
        .fetch_cached(
            secrets.news_api_key.as_deref().unwrap_or_default(),
            &query,
            count,
            &cache,
            refresh,
        )
        .await
        .context("Failed to fetch news")?;

    let index = news_index(&config, &secrets)?;
    let stored = index
        .ingest(&articles)
        .await
        .context("Failed to store articles")?;

    print!(
        "{}",
        format_ingest(&query, articles.len(), stored, &config.vector_store.collection)
    );
    Ok(())
}

async fn query(text: &str, num_results: usize) -> Result<()> {
    let (_, config) = load_config()?;
    let secrets = Secrets::from_env();
    let index = news_index(&config, &secrets)?;

    let matches = index
        .query(text, num_results.max(1))
        .await
        .context("Failed to query articles")?;

    print!("{}", format_matches(text, &matches));
    Ok(())
}

fn format_ingest(query: &str, fetched: usize, stored: usize, collection: &str) -> String {
    let mut out = String::new();
    writeln!(
        &mut out,
        "\n{} Stored {} of {} articles for '{}' in {}",
        "✓".green().bold(),
        stored.to_string().cyan(),
        fetched,
        query,
        collection.cyan()
    )
    .unwrap();
    if stored < fetched {
        writeln!(
            &mut out,
            "  {} {} skipped (empty or duplicate)",
            "⊘".yellow(),
            fetched - stored
        )
        .unwrap();
    }
    out
}

/// First line of a document, cut to `max` characters.
fn headline(document: &str, max: usize) -> String {
    let line = document.lines().next().unwrap_or_default();
    if line.chars().count() > max {
        let cut: String = line.chars().take(max).collect();
        format!("{cut}…")
    } else {
        line.to_string()
    }
}

fn format_matches(text: &str, matches: &[VectorMatch]) -> String {
    let mut out = String::new();

    if matches.is_empty() {
        writeln!(
            &mut out,
            "\n{} No articles found for '{}'. Run {} first.",
            "ℹ".blue(),
            text,
            "proofrun news ingest".green()
        )
        .unwrap();
        return out;
    }

    writeln!(&mut out, "\n{} '{}'", "Results for".bold(), text).unwrap();
    for (rank, m) in matches.iter().enumerate() {
        writeln!(
            &mut out,
            "  {}. {} {}",
            rank + 1,
            headline(&m.document, 80),
            format!("({:.4})", m.distance).dimmed()
        )
        .unwrap();
        if let Some(url) = m.metadata.get("url").and_then(|u| u.as_str()) {
            writeln!(&mut out, "     {}", url.cyan()).unwrap();
        }
    }
    out
}
