//! Initialize proofrun files in a project directory.
//!
//! This module separates pure logic from IO by accepting closures for
//! filesystem operations, making the core logic easily testable.

use anyhow::{Context, Result};
use colored::Colorize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::config::CONFIG_FILE;
use crate::templates;

// -----------------------------------------------------------------------------
// Public API
// -----------------------------------------------------------------------------

/// Runs the init command, writing the config and env templates.
pub(crate) fn run(force: bool) -> Result<()> {
    let cwd = std::env::current_dir().context("Failed to get current directory")?;

    info!("Initializing proofrun in {}", cwd.display());

    let files = init_files();

    let results = init_project(
        &files,
        force,
        |path| cwd.join(path).exists(),
        |path, content| {
            fs::write(cwd.join(path), content)
                .with_context(|| format!("Failed to write {}", path.display()))
        },
    )?;

    print!("{}", format_results(&results, &files));

    Ok(())
}

// -----------------------------------------------------------------------------
// Internal types
// -----------------------------------------------------------------------------

/// File to be written during init, with its relative path and content.
#[derive(Debug, Clone, PartialEq, Eq)]
struct InitFile {
    path: PathBuf,
    content: &'static str,
    description: &'static str,
}

/// Result of attempting to write a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteResult {
    Created,
    Overwritten,
    /// Already exists and `--force` was not given.
    Skipped,
}

// -----------------------------------------------------------------------------
// Helper functions
// -----------------------------------------------------------------------------

fn init_files() -> Vec<InitFile> {
    vec![
        InitFile {
            path: PathBuf::from(CONFIG_FILE),
            content: templates::PROOFRUN_TOML,
            description: "Sandbox, assistant and news configuration",
        },
        InitFile {
            path: PathBuf::from(".env.example"),
            content: templates::ENV_EXAMPLE,
            description: "Credentials template (copy to .env)",
        },
    ]
}

/// Core init logic: decides per file whether to write, and writes.
///
/// `exists` is checked before writing so overwrites can be reported.
fn init_project<E, W>(
    files: &[InitFile],
    force: bool,
    exists: E,
    mut write_file: W,
) -> Result<Vec<(PathBuf, WriteResult)>>
where
    E: Fn(&Path) -> bool,
    W: FnMut(&Path, &str) -> Result<()>,
{
    let mut results = Vec::new();

    for file in files {
        let existed = exists(&file.path);
        let result = if existed && !force {
            WriteResult::Skipped
        } else {
            write_file(&file.path, file.content)?;
            if existed {
                WriteResult::Overwritten
            } else {
                WriteResult::Created
            }
        };
        results.push((file.path.clone(), result));
    }

    Ok(results)
}

/// Formats init results for display with colored output.
fn format_results(results: &[(PathBuf, WriteResult)], files: &[InitFile]) -> String {
    use std::fmt::Write;
    let mut out = String::new();

    writeln!(
        &mut out,
        "\n{} proofrun initialized successfully!\n",
        "✓".green().bold()
    )
    .unwrap();
    writeln!(&mut out, "Files:").unwrap();

    for (path, result) in results {
        let desc = files
            .iter()
            .find(|f| &f.path == path)
            .map_or("", |f| f.description);

        match result {
            WriteResult::Created => {
                writeln!(
                    &mut out,
                    "  {} - {}",
                    path.display().to_string().cyan(),
                    desc
                )
                .unwrap();
            }
            WriteResult::Overwritten => {
                writeln!(
                    &mut out,
                    "  {} {} (overwritten)",
                    "↻".blue(),
                    path.display()
                )
                .unwrap();
            }
            WriteResult::Skipped => {
                writeln!(
                    &mut out,
                    "  {} {} (already exists, use --force to overwrite)",
                    "⊘".yellow(),
                    path.display()
                )
                .unwrap();
            }
        }
    }

    writeln!(&mut out, "\n{}", "Next steps:".yellow().bold()).unwrap();
    writeln!(
        &mut out,
        "  1. Copy {} to {} and add your API keys",
        ".env.example".cyan(),
        ".env".cyan()
    )
    .unwrap();
    writeln!(
        &mut out,
        "  2. Run {} to check the sandbox",
        "proofrun run example.py".green()
    )
    .unwrap();
    writeln!(
        &mut out,
        "  3. Run {} and put the id in {}",
        "proofrun assistant create".green(),
        CONFIG_FILE.cyan()
    )
    .unwrap();
    writeln!(
        &mut out,
        "  4. Run {} to chat",
        "proofrun chat -m \"...\"".green()
    )
    .unwrap();

    out
}

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------
