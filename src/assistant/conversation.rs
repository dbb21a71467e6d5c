//! Drives a thread through a run, answering tool calls locally.

use futures_util::StreamExt;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::client::AssistantClient;
use super::error::{AssistantError, Result};
use super::events::RunEvent;
use super::tools::ToolRegistry;
use super::types::{Message, Role, RunStatus, ToolCall, ToolOutput};

/// A tool call answered during the conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ToolCallRecord {
    pub name: String,
    pub arguments: String,
    pub output: String,
}

/// What a finished conversation produced.
#[derive(Debug, Clone, Default)]
pub(crate) struct ConversationSummary {
    pub thread_id: String,
    pub run_id: Option<String>,
    pub final_status: Option<RunStatus>,
    /// Assistant text produced by the run.
    pub text: String,
    pub tool_calls: Vec<ToolCallRecord>,
}

impl ConversationSummary {
    fn new(thread_id: &str) -> Self {
        Self {
            thread_id: thread_id.to_string(),
            ..Self::default()
        }
    }
}

pub(crate) struct Conversation {
    client: AssistantClient,
    registry: ToolRegistry,
    assistant_id: String,
    instructions: Option<String>,
    max_tool_rounds: u32,
    poll_interval: Duration,
}

impl Conversation {
    pub fn new(client: AssistantClient, registry: ToolRegistry, assistant_id: &str) -> Self {
        Self {
            client,
            registry,
            assistant_id: assistant_id.to_string(),
            instructions: None,
            max_tool_rounds: 8,
            poll_interval: Duration::from_secs(1),
        }
    }

    /// Per-run instructions overriding the assistant's own.
    pub fn instructions(mut self, instructions: Option<String>) -> Self {
        self.instructions = instructions;
        self
    }

    pub fn max_tool_rounds(mut self, rounds: u32) -> Self {
        self.max_tool_rounds = rounds;
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Create a thread and post each message as the user.
    pub async fn start_thread(&self, messages: &[String]) -> Result<String> {
        let thread = self.client.create_thread().await?;
        info!("Created thread {}", thread.id);

        for content in messages {
            self.client
                .create_message(&thread.id, Role::User, content)
                .await?;
        }
        Ok(thread.id)
    }

    /// Run the assistant with streaming, passing every event to `on_event`.
    ///
    /// Stops at the end of a stream that did not ask for tool outputs, or
    /// once the tool round limit is reached.
    pub async fn stream<F>(&self, thread_id: &str, mut on_event: F) -> Result<ConversationSummary>
    where
        F: FnMut(&RunEvent),
    {
        let mut summary = ConversationSummary::new(thread_id);
        let mut events = self
            .client
            .stream_run(thread_id, &self.assistant_id, self.instructions.as_deref())
            .await?;
        let mut rounds = 0;

        loop {
            let mut pending: Option<(String, Vec<ToolCall>)> = None;
            let mut last_error = None;

            while let Some(event) = events.next().await {
                on_event(&event);
                match event {
                    RunEvent::RunCreated { run_id } => summary.run_id = Some(run_id),
                    RunEvent::TextDelta(text) => summary.text.push_str(&text),
                    RunEvent::RequiresAction { run_id, tool_calls } => {
                        pending = Some((run_id, tool_calls));
                    }
                    RunEvent::RunFinished { run_id, status } => {
                        debug!("Run {} finished: {}", run_id, status);
                        summary.run_id = Some(run_id);
                        summary.final_status = Some(status);
                    }
                    RunEvent::Error(message) => {
                        warn!("Run stream error: {}", message);
                        last_error = Some(message);
                    }
                    RunEvent::End => break,
                    _ => {}
                }
            }

            if summary.run_id.is_none() {
                if let Some(message) = last_error {
                    return Err(AssistantError::Stream(message));
                }
            }

            let Some((run_id, tool_calls)) = pending else {
                break;
            };
            summary.final_status = Some(RunStatus::RequiresAction);
            if rounds >= self.max_tool_rounds {
                warn!(
                    "Tool round limit ({}) reached, leaving run {} waiting",
                    self.max_tool_rounds, run_id
                );
                break;
            }
            rounds += 1;

            let outputs = self.answer(&tool_calls, &mut summary).await;
            events = match self
                .client
                .submit_tool_outputs_stream(thread_id, &run_id, &outputs)
                .await
            {
                Ok(events) => events,
                Err(e) => {
                    warn!("Failed to submit tool outputs: {}", e);
                    break;
                }
            };
        }

        Ok(summary)
    }

    /// Run the assistant without streaming, polling until the run settles.
    pub async fn poll(&self, thread_id: &str) -> Result<ConversationSummary> {
        let mut summary = ConversationSummary::new(thread_id);
        let mut run = self
            .client
            .create_run(thread_id, &self.assistant_id, self.instructions.as_deref())
            .await?;
        summary.run_id = Some(run.id.clone());
        let mut rounds = 0;

        loop {
            debug!("Run {} is {}", run.id, run.status);
            if run.status.is_terminal() {
                break;
            }
            if run.status == RunStatus::RequiresAction {
                if rounds >= self.max_tool_rounds {
                    warn!(
                        "Tool round limit ({}) reached, leaving run {} waiting",
                        self.max_tool_rounds, run.id
                    );
                    break;
                }
                rounds += 1;
                let tool_calls = run.tool_calls().to_vec();
                let outputs = self.answer(&tool_calls, &mut summary).await;
                run = self
                    .client
                    .submit_tool_outputs(thread_id, &run.id, &outputs)
                    .await?;
                continue;
            }
            tokio::time::sleep(self.poll_interval).await;
            run = self.client.retrieve_run(thread_id, &run.id).await?;
        }

        if let Some(error) = &run.last_error {
            warn!("Run {} failed: {} ({})", run.id, error.message, error.code);
        }
        summary.final_status = Some(run.status);

        let messages = self.client.list_messages(thread_id, Some(&run.id)).await?;
        summary.text = messages
            .iter()
            .filter(|m| m.role == Role::Assistant && m.run_id.as_deref() == Some(run.id.as_str()))
            .map(Message::text)
            .collect::<Vec<_>>()
            .join("\n");

        Ok(summary)
    }

    async fn answer(&self, tool_calls: &[ToolCall], summary: &mut ConversationSummary) -> Vec<ToolOutput> {
        let mut outputs = Vec::with_capacity(tool_calls.len());
        for call in tool_calls {
            let output = self
                .registry
                .dispatch(&call.function.name, &call.function.arguments)
                .await;
            summary.tool_calls.push(ToolCallRecord {
                name: call.function.name.clone(),
                arguments: call.function.arguments.clone(),
                output: output.clone(),
            });
            outputs.push(ToolOutput {
                tool_call_id: call.id.clone(),
                output,
            });
        }
        outputs
    }
}
