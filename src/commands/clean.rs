//! Remove orphaned sandbox containers and cached news responses.
//!
//! Core logic picks which cache files to remove from a directory listing.
//! Formatting is pure. IO happens only at the top level.

use anyhow::{Context, Result};
use colored::Colorize;
use std::fmt::Write;
use std::fs;
use std::path::{Path, PathBuf};

use crate::sandbox::{CodeSandbox, DockerSandbox};

use super::load_config;

/// Whether `name` is a cached NewsAPI response written by `proofrun news`.
fn is_cache_file(name: &str) -> bool {
    name.starts_with("news-")
        && Path::new(name)
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

/// Pick the cache files out of a directory listing.
fn cache_files_to_clean(entries: &[PathBuf]) -> Vec<PathBuf> {
    entries
        .iter()
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(is_cache_file)
        })
        .cloned()
        .collect()
}

/// Remove cache files and return the removed paths.
fn clean_files<R>(entries: &[PathBuf], mut remove: R) -> Result<Vec<PathBuf>>
where
    R: FnMut(&Path) -> Result<()>,
{
    let mut removed = Vec::new();
    for file in cache_files_to_clean(entries) {
        remove(&file)?;
        removed.push(file);
    }
    Ok(removed)
}

fn list_dir(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut entries = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("Failed to read {}", dir.display()))? {
        entries.push(entry?.path());
    }
    Ok(entries)
}

/// Format the clean results as a displayable string
fn format_results(containers: u32, removed: &[PathBuf], cache: bool) -> String {
    let mut out = String::new();

    if containers == 0 {
        writeln!(&mut out, "\n{} No orphaned sandbox containers.", "ℹ".blue()).unwrap();
    } else {
        writeln!(
            &mut out,
            "\n{} Removed {} orphaned sandbox container(s)",
            "✓".green(),
            containers
        )
        .unwrap();
    }

    if !cache {
        return out;
    }

    if removed.is_empty() {
        writeln!(&mut out, "{} No cached news responses found.", "ℹ".blue()).unwrap();
    } else {
        writeln!(&mut out, "{} Cleaned news cache:", "✓".green()).unwrap();
        for file in removed {
            writeln!(
                &mut out,
                "  {} {}",
                "✗".red(),
                file.display().to_string().dimmed()
            )
            .unwrap();
        }
    }
    out
}

/// Entry point: runs clean against Docker and the real filesystem
pub(crate) async fn run(cache: bool) -> Result<()> {
    let (_, config) = load_config()?;

    let sandbox = DockerSandbox::new(config.sandbox.clone());
    let containers = match sandbox.cleanup_orphaned().await {
        Ok(count) => count,
        Err(e) if e.is_docker_unavailable() => {
            anyhow::bail!("{e}\nStart the Docker daemon and try again.")
        }
        Err(e) => return Err(e).context("Failed to clean sandbox containers"),
    };

    let removed = if cache {
        let entries = list_dir(&config.news.resolved_cache_dir())?;
        clean_files(&entries, |path| {
            fs::remove_file(path).with_context(|| format!("Failed to remove {}", path.display()))
        })?
    } else {
        Vec::new()
    };

    print!("{}", format_results(containers, &removed, cache));
    Ok(())
}
