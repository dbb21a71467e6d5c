//! Hosted assistant integration.
//!
//! An explicit [`AssistantClient`] is built from config and handed to every
//! caller. Streamed runs surface as a typed `RunEvent` stream, and function
//! tool calls are answered through a [`ToolRegistry`].

mod client;
mod conversation;
mod error;
mod events;
pub(crate) mod format;
mod tools;
mod types;

pub(crate) use client::AssistantClient;
pub(crate) use conversation::{Conversation, ConversationSummary};
pub(crate) use error::AssistantError;
pub(crate) use tools::{error_output, ToolHandler, ToolRegistry};
pub(crate) use types::{FunctionDefinition, RunStatus, ToolDefinition};
