//! HTTP client for the assistants API.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, USER_AGENT};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

use super::error::{error_from_status, AssistantError, Result};
use super::events::{run_event_stream, RunEventStream};
use super::types::{
    Assistant, CreateAssistantRequest, CreateMessageRequest, CreateRunRequest, ListResponse,
    Message, Role, Run, SubmitToolOutputsRequest, Thread, ToolDefinition, ToolOutput,
};

const BETA_HEADER: &str = "openai-beta";
const BETA_VALUE: &str = "assistants=v2";
/// Largest page the messages endpoint returns.
const MESSAGE_PAGE_LIMIT: u32 = 100;

/// Client for an OpenAI-compatible assistants API.
///
/// Cheap to clone; both inner `reqwest::Client`s are `Arc`-backed.
#[derive(Debug, Clone)]
pub(crate) struct AssistantClient {
    base_url: String,
    http: reqwest::Client,
    /// Same headers, no overall timeout, for long-lived event streams.
    stream_http: reqwest::Client,
}

impl AssistantClient {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("proofrun/", env!("CARGO_PKG_VERSION"))),
        );
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {api_key}"))
                .map_err(|e| AssistantError::Auth(e.to_string()))?,
        );
        headers.insert(
            HeaderName::from_static(BETA_HEADER),
            HeaderValue::from_static(BETA_VALUE),
        );

        let http = reqwest::Client::builder()
            .default_headers(headers.clone())
            .timeout(timeout)
            .build()?;
        let stream_http = reqwest::Client::builder()
            .default_headers(headers)
            .connect_timeout(timeout)
            .build()?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
            stream_http,
        })
    }

    pub async fn create_assistant(
        &self,
        name: &str,
        instructions: &str,
        model: &str,
        tools: &[ToolDefinition],
    ) -> Result<Assistant> {
        let body = CreateAssistantRequest {
            name,
            instructions,
            model,
            tools,
        };
        self.request(Method::POST, "/assistants", Some(&body)).await
    }

    pub async fn create_thread(&self) -> Result<Thread> {
        self.request(Method::POST, "/threads", Some(&serde_json::json!({})))
            .await
    }

    pub async fn create_message(&self, thread_id: &str, role: Role, content: &str) -> Result<Message> {
        let body = CreateMessageRequest { role, content };
        self.request(
            Method::POST,
            &format!("/threads/{thread_id}/messages"),
            Some(&body),
        )
        .await
    }

    /// Messages on a thread, oldest first, optionally only those a run wrote.
    pub async fn list_messages(&self, thread_id: &str, run_id: Option<&str>) -> Result<Vec<Message>> {
        let mut path = format!("/threads/{thread_id}/messages?order=asc&limit={MESSAGE_PAGE_LIMIT}");
        if let Some(run_id) = run_id {
            path.push_str("&run_id=");
            path.push_str(run_id);
        }
        let list: ListResponse<Message> = self.request(Method::GET, &path, None::<&()>).await?;
        Ok(list.data)
    }

    pub async fn create_run(
        &self,
        thread_id: &str,
        assistant_id: &str,
        instructions: Option<&str>,
    ) -> Result<Run> {
        let body = CreateRunRequest {
            assistant_id,
            instructions,
            stream: false,
        };
        self.request(Method::POST, &format!("/threads/{thread_id}/runs"), Some(&body))
            .await
    }

    pub async fn retrieve_run(&self, thread_id: &str, run_id: &str) -> Result<Run> {
        self.request(
            Method::GET,
            &format!("/threads/{thread_id}/runs/{run_id}"),
            None::<&()>,
        )
        .await
    }

    pub async fn submit_tool_outputs(
        &self,
        thread_id: &str,
        run_id: &str,
        outputs: &[ToolOutput],
    ) -> Result<Run> {
        let body = SubmitToolOutputsRequest {
            tool_outputs: outputs,
            stream: false,
        };
        self.request(
            Method::POST,
            &format!("/threads/{thread_id}/runs/{run_id}/submit_tool_outputs"),
            Some(&body),
        )
        .await
    }

    /// Start a run and stream its events.
    pub async fn stream_run(
        &self,
        thread_id: &str,
        assistant_id: &str,
        instructions: Option<&str>,
    ) -> Result<RunEventStream> {
        let body = CreateRunRequest {
            assistant_id,
            instructions,
            stream: true,
        };
        self.stream(&format!("/threads/{thread_id}/runs"), &body)
            .await
    }

    /// Submit tool outputs and stream the resumed run.
    pub async fn submit_tool_outputs_stream(
        &self,
        thread_id: &str,
        run_id: &str,
        outputs: &[ToolOutput],
    ) -> Result<RunEventStream> {
        let body = SubmitToolOutputsRequest {
            tool_outputs: outputs,
            stream: true,
        };
        self.stream(
            &format!("/threads/{thread_id}/runs/{run_id}/submit_tool_outputs"),
            &body,
        )
        .await
    }

    // -- Internal --

    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&(impl Serialize + ?Sized)>,
    ) -> Result<T> {
        let url = format!("{}{path}", self.base_url);
        debug!("{} {}", method, url);

        let mut req = self.http.request(method, &url);
        if let Some(b) = body {
            req = req.json(b);
        }

        let response = req.send().await?;
        let status = response.status().as_u16();
        let text = response.text().await?;

        if status >= 400 {
            return Err(error_from_status(status, &text));
        }

        Ok(serde_json::from_str(&text)?)
    }

    async fn stream(&self, path: &str, body: &impl Serialize) -> Result<RunEventStream> {
        let url = format!("{}{path}", self.base_url);
        debug!("POST {} (stream)", url);

        let response = self.stream_http.post(&url).json(body).send().await?;
        let status = response.status().as_u16();
        if status >= 400 {
            let text = response.text().await?;
            return Err(error_from_status(status, &text));
        }

        Ok(run_event_stream(response))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assistant::events::RunEvent;
    use crate::assistant::types::RunStatus;
    use futures_util::StreamExt;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client(server: &MockServer) -> AssistantClient {
        AssistantClient::new(&server.uri(), "sk-test", Duration::from_secs(5)).unwrap()
    }

    fn sse(events: &[(&str, &str)]) -> String {
        events
            .iter()
            .map(|(event, data)| format!("event: {event}\ndata: {data}\n\n"))
            .collect()
    }

    #[tokio::test]
    async fn test_create_thread_sends_auth_and_beta_headers() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/threads"))
            .and(header("authorization", "Bearer sk-test"))
            .and(header("openai-beta", "assistants=v2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "thread_1", "object": "thread"})))
            .expect(1)
            .mount(&server)
            .await;

        let thread = test_client(&server).create_thread().await.unwrap();
        assert_eq!(thread.id, "thread_1");
    }

    #[tokio::test]
    async fn test_create_assistant_posts_tools() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/assistants"))
            .and(body_partial_json(json!({
                "name": "Prefect Assistant",
                "model": "gpt-4o",
                "tools": [{"type": "code_interpreter"}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "asst_1",
                "name": "Prefect Assistant",
                "model": "gpt-4o",
                "tools": [{"type": "code_interpreter"}]
            })))
            .mount(&server)
            .await;

        let assistant = test_client(&server)
            .create_assistant(
                "Prefect Assistant",
                "Be helpful",
                "gpt-4o",
                &[ToolDefinition::CodeInterpreter],
            )
            .await
            .unwrap();
        assert_eq!(assistant.id, "asst_1");
        assert_eq!(assistant.tools, vec![ToolDefinition::CodeInterpreter]);
    }

    #[tokio::test]
    async fn test_list_messages_in_order() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/threads/thread_1/messages"))
            .and(query_param("order", "asc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "object": "list",
                "data": [
                    {"id": "msg_1", "role": "user", "content": [{"type": "text", "text": {"value": "Hi", "annotations": []}}]},
                    {"id": "msg_2", "role": "assistant", "run_id": "run_1", "content": [{"type": "text", "text": {"value": "Hello", "annotations": []}}]}
                ]
            })))
            .mount(&server)
            .await;

        let messages = test_client(&server)
            .list_messages("thread_1", None)
            .await
            .unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].text(), "Hello");
        assert_eq!(messages[1].run_id.as_deref(), Some("run_1"));
    }

    #[tokio::test]
    async fn test_list_messages_scoped_to_run() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/threads/thread_1/messages"))
            .and(query_param("run_id", "run_7"))
            .and(query_param("limit", "100"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "object": "list",
                "data": [
                    {"id": "msg_9", "role": "assistant", "run_id": "run_7", "content": [{"type": "text", "text": {"value": "Latest", "annotations": []}}]}
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let messages = test_client(&server)
            .list_messages("thread_1", Some("run_7"))
            .await
            .unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].text(), "Latest");
    }

    #[tokio::test]
    async fn test_error_status_maps_to_typed_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/threads/thread_x/runs/run_x"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "error": {"message": "No run found with id 'run_x'.", "type": "invalid_request_error"}
            })))
            .mount(&server)
            .await;

        let err = test_client(&server)
            .retrieve_run("thread_x", "run_x")
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert!(err.to_string().contains("run_x"));
    }

    #[tokio::test]
    async fn test_submit_tool_outputs_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/threads/thread_1/runs/run_1/submit_tool_outputs"))
            .and(body_partial_json(json!({
                "tool_outputs": [{"tool_call_id": "call_1", "output": "{}"}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "run_1", "thread_id": "thread_1", "status": "queued"
            })))
            .mount(&server)
            .await;

        let run = test_client(&server)
            .submit_tool_outputs(
                "thread_1",
                "run_1",
                &[ToolOutput {
                    tool_call_id: "call_1".to_string(),
                    output: "{}".to_string(),
                }],
            )
            .await
            .unwrap();
        assert_eq!(run.status, RunStatus::Queued);
    }

    #[tokio::test]
    async fn test_stream_run_yields_typed_events() {
        let server = MockServer::start().await;
        let body = sse(&[
            ("thread.run.created", r#"{"id":"run_1","thread_id":"thread_1","status":"queued"}"#),
            ("thread.message.created", r#"{"id":"msg_1"}"#),
            ("thread.message.delta", r#"{"delta":{"content":[{"index":0,"type":"text","text":{"value":"Hi"}}]}}"#),
            ("thread.run.completed", r#"{"id":"run_1","thread_id":"thread_1","status":"completed"}"#),
            ("done", "[DONE]"),
        ]);
        Mock::given(method("POST"))
            .and(path("/threads/thread_1/runs"))
            .and(body_partial_json(json!({"assistant_id": "asst_1", "stream": true})))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
            .mount(&server)
            .await;

        let events: Vec<RunEvent> = test_client(&server)
            .stream_run("thread_1", "asst_1", None)
            .await
            .unwrap()
            .collect()
            .await;

        assert_eq!(
            events,
            vec![
                RunEvent::RunCreated {
                    run_id: "run_1".to_string()
                },
                RunEvent::TextCreated,
                RunEvent::TextDelta("Hi".to_string()),
                RunEvent::RunFinished {
                    run_id: "run_1".to_string(),
                    status: RunStatus::Completed
                },
                RunEvent::End,
            ]
        );
    }

    #[tokio::test]
    async fn test_stream_error_status_fails_before_streaming() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/threads/thread_1/runs"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({"error": {"message": "bad key"}})))
            .mount(&server)
            .await;

        let result = test_client(&server).stream_run("thread_1", "asst_1", None).await;
        assert!(matches!(result, Err(AssistantError::Auth(msg)) if msg == "bad key"));
    }
}
