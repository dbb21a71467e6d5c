//! Run a program in the Docker sandbox with retries.

use anyhow::{bail, Context, Result};
use colored::Colorize;
use std::fmt::Write;
use std::fs;
use std::path::Path;
use tracing::info;

use crate::config::Config;
use crate::retry::{AttemptRecord, RetryReport};
use crate::tools::{ExecutionReport, NO_CODE};

use super::{load_config, retry_controller};

/// Entry point: verify `file` in the sandbox and print the outcome.
pub(crate) async fn run(
    file: &Path,
    max_attempts: Option<u32>,
    timeout: Option<u64>,
    json: bool,
) -> Result<()> {
    let code = fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    if code.trim().is_empty() {
        bail!(NO_CODE);
    }

    let (_, mut config) = load_config()?;
    apply_overrides(&mut config, max_attempts, timeout);

    info!(
        "Running {} (up to {} attempts, {}s each)",
        file.display(),
        config.retry.max_attempts.max(1),
        config.sandbox.timeout_secs
    );

    let controller = retry_controller(&config);
    let report = controller.run(&code).await;
    let succeeded = report.succeeded();
    let error = report.error.clone();

    if json {
        println!("{}", ExecutionReport::from(report).to_json());
    } else {
        print!("{}", format_report(&report, controller.max_attempts()));
    }

    if !succeeded {
        bail!(error.unwrap_or_else(|| "Run failed".to_string()));
    }
    Ok(())
}

fn apply_overrides(config: &mut Config, max_attempts: Option<u32>, timeout: Option<u64>) {
    if let Some(max_attempts) = max_attempts {
        config.retry.max_attempts = max_attempts;
    }
    if let Some(timeout) = timeout {
        config.sandbox.timeout_secs = timeout;
    }
}

fn format_attempt(out: &mut String, attempt: &AttemptRecord, ceiling: u32) {
    if attempt.succeeded {
        writeln!(
            out,
            "  {} Attempt {}/{} succeeded",
            "✓".green().bold(),
            attempt.attempt_number,
            ceiling
        )
        .unwrap();
    } else {
        let fault = attempt
            .fault
            .map_or_else(String::new, |kind| format!(" ({kind})"));
        writeln!(
            out,
            "  {} Attempt {}/{} failed{}: {}",
            "✗".red(),
            attempt.attempt_number,
            ceiling,
            fault,
            attempt.error.as_deref().unwrap_or("unknown error").dimmed()
        )
        .unwrap();
    }
}

/// Formats every attempt plus the final outcome.
fn format_report(report: &RetryReport, ceiling: u32) -> String {
    let mut out = String::new();

    writeln!(&mut out).unwrap();
    for attempt in &report.attempts {
        format_attempt(&mut out, attempt, ceiling);
    }

    let Some(last) = report.last_attempt() else {
        return out;
    };

    if !last.output.is_empty() {
        writeln!(&mut out, "\n{}", "Output:".bold()).unwrap();
        write!(&mut out, "{}", last.output).unwrap();
        if !last.output.ends_with('\n') {
            writeln!(&mut out).unwrap();
        }
    }

    writeln!(&mut out).unwrap();
    if report.succeeded() {
        let version = last.library_version.as_deref().unwrap_or("unknown");
        writeln!(
            &mut out,
            "{} Verified after {} attempt(s) (library version {})",
            "✓".green().bold(),
            report.attempt_count(),
            version.cyan()
        )
        .unwrap();
    } else if let Some(error) = &report.error {
        writeln!(&mut out, "{} {}", "✗".red().bold(), error.red()).unwrap();
    }

    out
}
