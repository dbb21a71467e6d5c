//! Typed run events parsed from the server-sent event stream.
//!
//! Streamed runs emit named SSE events (`thread.run.created`,
//! `thread.message.delta`, ...) whose data is a JSON object. Each SSE event
//! maps to zero or more [`RunEvent`]s; unknown names are skipped so the
//! stream keeps working when the API grows new events.

use eventsource_stream::Eventsource;
use futures_util::{Stream, StreamExt};
use serde::Deserialize;
use std::pin::Pin;

use super::types::{Run, RunStatus, ToolCall, ToolKind};

/// Incremental update to a tool call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ToolCallDelta {
    FunctionArguments(String),
    CodeInput(String),
    CodeLogs(String),
}

/// Something that happened during a streamed run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum RunEvent {
    RunCreated {
        run_id: String,
    },
    /// The assistant started a new text message.
    TextCreated,
    TextDelta(String),
    ToolCallCreated {
        id: String,
        kind: ToolKind,
    },
    ToolCallDelta {
        index: u32,
        kind: ToolKind,
        delta: ToolCallDelta,
    },
    /// The run is paused until outputs for these calls are submitted.
    RequiresAction {
        run_id: String,
        tool_calls: Vec<ToolCall>,
    },
    RunFinished {
        run_id: String,
        status: RunStatus,
    },
    Error(String),
    /// The server closed this stream.
    End,
}

/// Lazy stream of run events. Restarting requires a new request.
pub(crate) type RunEventStream = Pin<Box<dyn Stream<Item = RunEvent> + Send>>;

/// Turn a streaming HTTP response into run events.
pub(crate) fn run_event_stream(response: reqwest::Response) -> RunEventStream {
    let events = response
        .bytes_stream()
        .eventsource()
        .flat_map(|event| {
            let parsed = match event {
                Ok(event) => parse_event(&event.event, &event.data),
                Err(e) => vec![RunEvent::Error(format!("stream error: {e}"))],
            };
            futures_util::stream::iter(parsed)
        });
    Box::pin(events)
}

#[derive(Debug, Deserialize)]
struct MessageDeltaEvent {
    delta: MessageDelta,
}

#[derive(Debug, Deserialize)]
struct MessageDelta {
    #[serde(default)]
    content: Vec<ContentDelta>,
}

#[derive(Debug, Deserialize)]
struct ContentDelta {
    #[serde(default)]
    text: Option<TextDelta>,
}

#[derive(Debug, Deserialize)]
struct TextDelta {
    #[serde(default)]
    value: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StepDeltaEvent {
    delta: StepDelta,
}

#[derive(Debug, Deserialize)]
struct StepDelta {
    #[serde(default)]
    step_details: Option<StepDetails>,
}

#[derive(Debug, Deserialize)]
struct StepDetails {
    #[serde(default)]
    tool_calls: Vec<ToolCallDeltaPayload>,
}

#[derive(Debug, Deserialize)]
struct ToolCallDeltaPayload {
    #[serde(default)]
    index: u32,
    #[serde(default)]
    id: Option<String>,
    #[serde(rename = "type")]
    kind: ToolKind,
    #[serde(default)]
    function: Option<FunctionDelta>,
    #[serde(default)]
    code_interpreter: Option<CodeInterpreterDelta>,
}

#[derive(Debug, Deserialize)]
struct FunctionDelta {
    #[serde(default)]
    arguments: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CodeInterpreterDelta {
    #[serde(default)]
    input: Option<String>,
    #[serde(default)]
    outputs: Vec<CodeOutput>,
}

#[derive(Debug, Deserialize)]
struct CodeOutput {
    #[serde(default)]
    logs: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEvent {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

/// Map one SSE event to run events.
pub(crate) fn parse_event(event: &str, data: &str) -> Vec<RunEvent> {
    match event {
        "thread.run.created" => parse_run(data, |run| RunEvent::RunCreated { run_id: run.id }),
        "thread.run.requires_action" => parse_run(data, |run| RunEvent::RequiresAction {
            tool_calls: run.tool_calls().to_vec(),
            run_id: run.id,
        }),
        "thread.run.completed"
        | "thread.run.failed"
        | "thread.run.cancelled"
        | "thread.run.expired"
        | "thread.run.incomplete" => parse_run(data, |run| RunEvent::RunFinished {
            run_id: run.id,
            status: run.status,
        }),
        "thread.message.created" => vec![RunEvent::TextCreated],
        "thread.message.delta" => match serde_json::from_str::<MessageDeltaEvent>(data) {
            Ok(payload) => payload
                .delta
                .content
                .into_iter()
                .filter_map(|part| part.text.and_then(|t| t.value))
                .filter(|value| !value.is_empty())
                .map(RunEvent::TextDelta)
                .collect(),
            Err(e) => vec![malformed(event, &e)],
        },
        "thread.run.step.delta" => match serde_json::from_str::<StepDeltaEvent>(data) {
            Ok(payload) => payload
                .delta
                .step_details
                .map(|details| {
                    details
                        .tool_calls
                        .into_iter()
                        .flat_map(tool_call_events)
                        .collect()
                })
                .unwrap_or_default(),
            Err(e) => vec![malformed(event, &e)],
        },
        "error" => {
            let message = serde_json::from_str::<ErrorEvent>(data)
                .ok()
                .and_then(|e| {
                    e.message.or_else(|| {
                        e.error.map(|v| match v {
                            serde_json::Value::String(s) => s,
                            other => other
                                .get("message")
                                .and_then(|m| m.as_str())
                                .map_or_else(|| other.to_string(), String::from),
                        })
                    })
                })
                .unwrap_or_else(|| data.to_string());
            vec![RunEvent::Error(message)]
        }
        "done" => vec![RunEvent::End],
        _ => Vec::new(),
    }
}

fn parse_run(data: &str, to_event: impl FnOnce(Run) -> RunEvent) -> Vec<RunEvent> {
    match serde_json::from_str::<Run>(data) {
        Ok(run) => vec![to_event(run)],
        Err(e) => vec![malformed("run", &e)],
    }
}

fn malformed(event: &str, err: &serde_json::Error) -> RunEvent {
    RunEvent::Error(format!("malformed {event} payload: {err}"))
}

fn tool_call_events(call: ToolCallDeltaPayload) -> Vec<RunEvent> {
    let mut events = Vec::new();
    let index = call.index;
    let kind = call.kind;

    if let Some(id) = call.id {
        events.push(RunEvent::ToolCallCreated { id, kind });
    }

    let mut push = |delta| events.push(RunEvent::ToolCallDelta { index, kind, delta });

    if let Some(arguments) = call.function.and_then(|f| f.arguments) {
        if !arguments.is_empty() {
            push(ToolCallDelta::FunctionArguments(arguments));
        }
    }

    if let Some(code) = call.code_interpreter {
        if let Some(input) = code.input.filter(|i| !i.is_empty()) {
            push(ToolCallDelta::CodeInput(input));
        }
        for logs in code.outputs.into_iter().filter_map(|o| o.logs) {
            push(ToolCallDelta::CodeLogs(logs));
        }
    }

    events
}
