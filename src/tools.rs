//! Function tools exposed to the assistant.
//!
//! `run_code` verifies a code example in the sandbox with retries;
//! `query_news` searches the article index.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::warn;

use crate::assistant::{error_output, FunctionDefinition, ToolHandler};
use crate::embeddings::{NewsIndex, VectorMatch};
use crate::retry::{RetryController, RetryReport};

pub(crate) const RUN_CODE: &str = "run_code";
pub(crate) const QUERY_NEWS: &str = "query_news";

/// Returned for an empty payload.
pub(crate) const NO_CODE: &str = "No code provided";

/// Default number of articles returned by `query_news`.
const DEFAULT_NUM_RESULTS: usize = 5;

/// Outcome of a verified run, returned to the assistant as JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub(crate) enum ExecutionReport {
    Success {
        example_code: String,
        result: String,
        library_version: Option<String>,
    },
    Failure {
        error: String,
    },
}

impl ExecutionReport {
    pub fn failure(error: impl Into<String>) -> Self {
        Self::Failure {
            error: error.into(),
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| error_output(&e.to_string()))
    }
}

impl From<RetryReport> for ExecutionReport {
    fn from(report: RetryReport) -> Self {
        if report.succeeded() {
            if let Some(attempt) = report.attempts.into_iter().last() {
                return Self::Success {
                    example_code: attempt.payload,
                    result: attempt.output,
                    library_version: attempt.library_version,
                };
            }
        }

        Self::failure(
            report
                .error
                .unwrap_or_else(|| "Failed to run the code".to_string()),
        )
    }
}

/// Run a payload through the retry controller and describe the outcome.
///
/// Empty payloads are rejected without touching the sandbox.
pub(crate) async fn verify(controller: &RetryController, code: &str) -> ExecutionReport {
    if code.trim().is_empty() {
        return ExecutionReport::failure(NO_CODE);
    }
    controller.run(code).await.into()
}

#[derive(Debug, Deserialize)]
struct RunCodeArgs {
    #[serde(default)]
    example_code: String,
}

/// Runs assistant-written code in the sandbox until it works.
pub(crate) struct RunCodeTool {
    controller: RetryController,
    dependency: String,
}

impl RunCodeTool {
    pub fn new(controller: RetryController, dependency: &str) -> Self {
        Self {
            controller,
            dependency: dependency.to_string(),
        }
    }
}

#[async_trait]
impl ToolHandler for RunCodeTool {
    fn definition(&self) -> FunctionDefinition {
        FunctionDefinition {
            name: RUN_CODE.to_string(),
            description: format!(
                "Run a Python code example in a Docker container with the latest {} installed. \
                 Returns the program output and the {} version on success, or an error after \
                 {} failed attempts.",
                self.dependency,
                self.dependency,
                self.controller.max_attempts()
            ),
            parameters: json!({
                "type": "object",
                "properties": {
                    "example_code": {
                        "type": "string",
                        "description": "Complete, runnable Python source code"
                    }
                },
                "required": ["example_code"]
            }),
        }
    }

    async fn call(&self, arguments: Value) -> String {
        let args: RunCodeArgs = match serde_json::from_value(arguments) {
            Ok(args) => args,
            Err(e) => return error_output(&format!("Invalid arguments for {RUN_CODE}: {e}")),
        };
        verify(&self.controller, &args.example_code).await.to_json()
    }
}

#[derive(Debug, Deserialize)]
struct QueryNewsArgs {
    query: String,
    #[serde(default)]
    num_results: Option<usize>,
}

/// One `query_news` hit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct NewsHit {
    pub article: String,
    /// Vector distance; lower is more relevant.
    pub relevance_score: f32,
}

impl From<VectorMatch> for NewsHit {
    fn from(m: VectorMatch) -> Self {
        Self {
            article: m.document,
            relevance_score: m.distance,
        }
    }
}

/// Semantic search over ingested news articles.
pub(crate) struct QueryNewsTool {
    index: NewsIndex,
}

impl QueryNewsTool {
    pub fn new(index: NewsIndex) -> Self {
        Self { index }
    }
}

#[async_trait]
impl ToolHandler for QueryNewsTool {
    fn definition(&self) -> FunctionDefinition {
        FunctionDefinition {
            name: QUERY_NEWS.to_string(),
            description: "Search recently ingested technology news articles by meaning. \
                          Returns the closest articles with their relevance scores \
                          (lower is more relevant)."
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "What to search for"
                    },
                    "num_results": {
                        "type": "integer",
                        "description": "How many articles to return",
                        "default": DEFAULT_NUM_RESULTS
                    }
                },
                "required": ["query"]
            }),
        }
    }

    async fn call(&self, arguments: Value) -> String {
        let args: QueryNewsArgs = match serde_json::from_value(arguments) {
            Ok(args) => args,
            Err(e) => return error_output(&format!("Invalid arguments for {QUERY_NEWS}: {e}")),
        };

        let n = args.num_results.unwrap_or(DEFAULT_NUM_RESULTS).max(1);
        match self.index.query(&args.query, n).await {
            Ok(matches) => {
                let hits: Vec<NewsHit> = matches.into_iter().map(NewsHit::from).collect();
                serde_json::to_string(&hits).unwrap_or_else(|e| error_output(&e.to_string()))
            }
            Err(e) => {
                warn!("News query failed: {}", e);
                error_output(&e.to_string())
            }
        }
    }
}
