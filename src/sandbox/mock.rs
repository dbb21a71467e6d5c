//! Mock sandbox for testing.
//!
//! Returns scripted outcomes and records every payload it receives, so the
//! retry controller and the tools can be exercised without Docker.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::{CodeSandbox, SandboxError, SandboxOutput};

/// A single scripted outcome.
#[derive(Debug, Clone)]
pub(crate) enum MockOutcome {
    /// The program exits 0 with the given output.
    Success(String),
    /// The program exits with the given status and output.
    Exit(i64, String),
    /// The image fails to build.
    BuildError(String),
    /// The run exceeds its time bound.
    Timeout,
    /// The run exceeds its time bound after writing some output.
    TimeoutWithOutput(String),
}

/// A mock sandbox that replays outcomes in order.
#[derive(Debug, Clone)]
pub(crate) struct MockSandbox {
    /// Outcomes to return in order. Cycles if invoked more often.
    outcomes: Arc<Vec<MockOutcome>>,
    /// Number of times `execute` has been called.
    invocation_count: Arc<AtomicUsize>,
    /// Every payload passed to `execute`.
    payloads: Arc<Mutex<Vec<String>>>,
    library_version: Option<String>,
}

impl MockSandbox {
    pub fn new(outcomes: Vec<MockOutcome>) -> Self {
        Self {
            outcomes: Arc::new(outcomes),
            invocation_count: Arc::new(AtomicUsize::new(0)),
            payloads: Arc::new(Mutex::new(Vec::new())),
            library_version: None,
        }
    }

    pub fn always_succeed(output: &str) -> Self {
        Self::new(vec![MockOutcome::Success(output.to_string())])
    }

    pub fn always_fail(output: &str) -> Self {
        Self::new(vec![MockOutcome::Exit(1, output.to_string())])
    }

    /// Fail `failures` times, then succeed with `output`.
    pub fn succeed_after(failures: usize, output: &str) -> Self {
        let mut outcomes = vec![MockOutcome::Exit(1, "Traceback".to_string()); failures];
        outcomes.push(MockOutcome::Success(output.to_string()));
        Self::new(outcomes)
    }

    pub fn with_library_version(mut self, version: &str) -> Self {
        self.library_version = Some(version.to_string());
        self
    }

    pub fn invocation_count(&self) -> usize {
        self.invocation_count.load(Ordering::SeqCst)
    }

    pub fn payloads(&self) -> Vec<String> {
        self.payloads.lock().unwrap().clone()
    }
}

#[async_trait]
impl CodeSandbox for MockSandbox {
    fn name(&self) -> &'static str {
        "Mock"
    }

    async fn execute(&self, payload: &str) -> Result<SandboxOutput, SandboxError> {
        let count = self.invocation_count.fetch_add(1, Ordering::SeqCst);
        self.payloads.lock().unwrap().push(payload.to_string());

        match &self.outcomes[count % self.outcomes.len()] {
            MockOutcome::Success(output) => Ok(SandboxOutput {
                output: output.clone(),
                exit_code: 0,
                library_version: self.library_version.clone(),
            }),
            MockOutcome::Exit(code, output) => Ok(SandboxOutput {
                output: output.clone(),
                exit_code: *code,
                library_version: None,
            }),
            MockOutcome::BuildError(msg) => Err(SandboxError::build_failed(msg.clone())),
            MockOutcome::Timeout => Err(SandboxError::timeout(Duration::from_secs(120), "")),
            MockOutcome::TimeoutWithOutput(output) => Err(SandboxError::timeout(
                Duration::from_secs(120),
                output.clone(),
            )),
        }
    }

    async fn cleanup_orphaned(&self) -> Result<u32, SandboxError> {
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_sandbox_cycles_outcomes() {
        let sandbox = MockSandbox::new(vec![
            MockOutcome::Exit(1, "boom".to_string()),
            MockOutcome::Success("ok".to_string()),
        ]);

        let first = sandbox.execute("a").await.unwrap();
        let second = sandbox.execute("b").await.unwrap();
        let third = sandbox.execute("c").await.unwrap();

        assert!(!first.succeeded());
        assert!(second.succeeded());
        assert!(!third.succeeded()); // Cycles back
        assert_eq!(sandbox.invocation_count(), 3);
        assert_eq!(sandbox.payloads(), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_mock_sandbox_errors() {
        let sandbox = MockSandbox::new(vec![
            MockOutcome::BuildError("no such image".to_string()),
            MockOutcome::Timeout,
        ]);

        let build = sandbox.execute("").await.unwrap_err();
        let timeout = sandbox.execute("").await.unwrap_err();
        assert_eq!(build.to_string(), "Build error: no such image");
        assert!(timeout.is_timeout());
    }

    #[test]
    fn test_mock_sandbox_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<MockSandbox>();
    }
}
