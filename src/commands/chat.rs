//! Send messages to the assistant and answer its tool calls locally.

use anyhow::{bail, Result};
use std::io::Write;
use std::time::Duration;
use tracing::info;

use crate::assistant::format::{format_event, format_summary};
use crate::assistant::{Conversation, ConversationSummary, RunStatus};
use crate::config::{Config, Secrets};

use super::{assistant_client, assistant_failure, load_config, tool_registry};

/// Entry point for `proofrun chat`.
pub(crate) async fn run(
    assistant_id: Option<String>,
    poll: bool,
    messages: Vec<String>,
    instructions: Option<String>,
) -> Result<()> {
    let (_, config) = load_config()?;
    let secrets = Secrets::from_env();

    let assistant_id = resolve_assistant_id(assistant_id, &config)?;
    let messages = non_empty_messages(messages)?;

    let client = assistant_client(&config, &secrets)?;
    let registry = tool_registry(&config, &secrets)?;
    info!("Tools available: {}", registry.names().join(", "));

    let conversation = Conversation::new(client, registry, &assistant_id)
        .instructions(instructions)
        .max_tool_rounds(config.assistant.max_tool_rounds)
        .poll_interval(Duration::from_millis(config.assistant.poll_interval_ms));

    let thread_id = conversation
        .start_thread(&messages)
        .await
        .map_err(|e| assistant_failure("Failed to start thread", e))?;

    let summary = if poll {
        let summary = conversation
            .poll(&thread_id)
            .await
            .map_err(|e| assistant_failure("Run failed", e))?;
        print!("{}", format_summary(&summary, true));
        summary
    } else {
        let mut stdout = std::io::stdout();
        let summary = conversation
            .stream(&thread_id, |event| {
                if let Some(text) = format_event(event) {
                    let _ = write!(stdout, "{text}");
                    let _ = stdout.flush();
                }
            })
            .await
            .map_err(|e| assistant_failure("Run failed", e))?;
        println!();
        print!("{}", format_summary(&summary, false));
        summary
    };

    info!(
        "Thread {} finished with {} tool call(s)",
        summary.thread_id,
        summary.tool_calls.len()
    );
    check_outcome(&summary)
}

/// Anything short of a completed run is a failed chat.
fn check_outcome(summary: &ConversationSummary) -> Result<()> {
    match summary.final_status {
        Some(RunStatus::Completed) => Ok(()),
        Some(RunStatus::RequiresAction) => bail!(
            "Run stopped with tool calls still pending \
             (if the tool round limit was hit, raise [assistant] max_tool_rounds)"
        ),
        Some(status) => bail!("Run ended with status {status}"),
        None => bail!("Run ended without reporting a status"),
    }
}

/// Flag first, then `[assistant].id`.
fn resolve_assistant_id(flag: Option<String>, config: &Config) -> Result<String> {
    match flag.or_else(|| config.assistant.id.clone()) {
        Some(id) if !id.trim().is_empty() => Ok(id),
        _ => bail!(
            "No assistant id: pass --assistant-id or set [assistant] id in proofrun.toml \
             (create one with `proofrun assistant create`)"
        ),
    }
}

fn non_empty_messages(messages: Vec<String>) -> Result<Vec<String>> {
    let messages: Vec<String> = messages
        .into_iter()
        .filter(|m| !m.trim().is_empty())
        .collect();
    if messages.is_empty() {
        bail!("At least one non-empty message is required (-m \"...\")");
    }
    Ok(messages)
}
