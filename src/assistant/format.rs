//! Formatting functions for streamed run output.
//!
//! Pure functions that return strings; printing happens in the commands.

use colored::Colorize;
use std::fmt::Write;

use super::conversation::ConversationSummary;
use super::events::{RunEvent, ToolCallDelta};
use super::types::RunStatus;

/// Text to print for a run event, if any.
pub(crate) fn format_event(event: &RunEvent) -> Option<String> {
    match event {
        RunEvent::TextCreated => Some(format!("\n{} ", "assistant >".green().bold())),
        RunEvent::TextDelta(text) => Some(text.clone()),
        RunEvent::ToolCallCreated { kind, .. } => {
            Some(format!("\n{} {}\n", "assistant >".green().bold(), kind))
        }
        RunEvent::ToolCallDelta { delta, .. } => match delta {
            ToolCallDelta::FunctionArguments(arguments) => Some(arguments.dimmed().to_string()),
            ToolCallDelta::CodeInput(input) => Some(input.clone()),
            ToolCallDelta::CodeLogs(logs) => Some(format!("\n\n{}\n{}", "output >".cyan(), logs)),
        },
        RunEvent::RequiresAction { tool_calls, .. } => {
            let names: Vec<&str> = tool_calls.iter().map(|c| c.function.name.as_str()).collect();
            Some(format!(
                "\n{} {}\n",
                "→ calling".yellow(),
                names.join(", ").yellow().bold()
            ))
        }
        RunEvent::RunCreated { .. }
        | RunEvent::RunFinished { .. }
        | RunEvent::Error(_)
        | RunEvent::End => None,
    }
}

/// Closing summary after a run.
pub(crate) fn format_summary(summary: &ConversationSummary, include_text: bool) -> String {
    let mut out = String::new();

    if include_text && !summary.text.is_empty() {
        writeln!(&mut out, "{} {}", "assistant >".green().bold(), summary.text).unwrap();
    }

    writeln!(&mut out).unwrap();
    let status = summary
        .final_status
        .map_or_else(|| "unknown".to_string(), |s| s.to_string());
    let status = match summary.final_status {
        Some(RunStatus::Completed) => status.green(),
        Some(s) if s.is_terminal() => status.red(),
        _ => status.yellow(),
    };
    writeln!(&mut out, "  Run:        {status}").unwrap();
    writeln!(&mut out, "  Thread:     {}", summary.thread_id.dimmed()).unwrap();
    if !summary.tool_calls.is_empty() {
        writeln!(
            &mut out,
            "  Tool calls: {}",
            summary.tool_calls.len().to_string().cyan()
        )
        .unwrap();
        for call in &summary.tool_calls {
            writeln!(
                &mut out,
                "    {}({}) → {}",
                call.name.bold(),
                preview(&call.arguments, 60).dimmed(),
                preview(&call.output, 60).dimmed()
            )
            .unwrap();
        }
    }

    out
}

/// Single-line preview of `text`, cut to `max` characters.
fn preview(text: &str, max: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() > max {
        let cut: String = flat.chars().take(max).collect();
        format!("{cut}…")
    } else {
        flat
    }
}
