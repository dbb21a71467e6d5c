//! Function tools answered locally on behalf of the assistant.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

use super::types::{FunctionDefinition, ToolDefinition};

/// A function the assistant may call.
#[async_trait]
pub(crate) trait ToolHandler: Send + Sync {
    /// Name, description and argument schema advertised to the assistant.
    fn definition(&self) -> FunctionDefinition;

    /// Answer a call. The returned string is submitted verbatim as the
    /// tool output, so failures are reported in-band.
    async fn call(&self, arguments: Value) -> String;
}

/// Name-indexed set of tool handlers plus any hosted tools.
#[derive(Default, Clone)]
pub(crate) struct ToolRegistry {
    handlers: BTreeMap<String, Arc<dyn ToolHandler>>,
    hosted: Vec<ToolDefinition>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler under the name from its definition.
    pub fn register(mut self, handler: impl ToolHandler + 'static) -> Self {
        let name = handler.definition().name;
        self.handlers.insert(name, Arc::new(handler));
        self
    }

    /// Also advertise the hosted code interpreter.
    pub fn with_code_interpreter(mut self) -> Self {
        self.hosted.push(ToolDefinition::CodeInterpreter);
        self
    }

    pub fn names(&self) -> Vec<&str> {
        self.handlers.keys().map(String::as_str).collect()
    }

    /// Tool manifest sent when creating an assistant.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.hosted
            .iter()
            .cloned()
            .chain(self.handlers.values().map(|h| ToolDefinition::Function {
                function: h.definition(),
            }))
            .collect()
    }

    /// Answer one call by name with raw JSON arguments.
    ///
    /// Unknown names and unparseable arguments produce a JSON error string.
    pub async fn dispatch(&self, name: &str, arguments: &str) -> String {
        let Some(handler) = self.handlers.get(name) else {
            warn!("Assistant called unknown tool '{}'", name);
            return error_output(&format!("Unknown tool: {name}"));
        };

        let arguments = if arguments.trim().is_empty() {
            Value::Object(serde_json::Map::new())
        } else {
            match serde_json::from_str::<Value>(arguments) {
                Ok(value) => value,
                Err(e) => {
                    warn!("Invalid arguments for tool '{}': {}", name, e);
                    return error_output(&format!("Invalid arguments for {name}: {e}"));
                }
            }
        };

        info!("Calling tool '{}'", name);
        handler.call(arguments).await
    }
}

/// `{"error": message}` as a string.
pub(crate) fn error_output(message: &str) -> String {
    json!({ "error": message }).to_string()
}
