//! Bounded retry around a [`CodeSandbox`].
//!
//! Each attempt runs the current payload once. A clean exit ends the run;
//! otherwise the payload goes through a [`PayloadTransform`] and is tried
//! again until the attempt ceiling is reached. There is no backoff and no
//! other termination condition.

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::sandbox::{CodeSandbox, FaultKind, SandboxError};

/// Attempt ceiling used when nothing else is configured.
pub(crate) const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Lifecycle of a single attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AttemptState {
    Pending,
    Running,
    Succeeded,
    Failed,
    /// Terminal: the last permitted attempt failed.
    ExhaustedFailure,
}

impl AttemptState {
    /// Whether `next` is a legal successor of `self`.
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Running)
                | (Self::Running, Self::Succeeded | Self::Failed)
                | (Self::Failed, Self::Pending | Self::ExhaustedFailure)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::ExhaustedFailure)
    }
}

impl std::fmt::Display for AttemptState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed => write!(f, "failed"),
            Self::ExhaustedFailure => write!(f, "exhausted"),
        }
    }
}

/// What happened on one attempt. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct AttemptRecord {
    /// 1-based attempt number.
    pub attempt_number: u32,
    /// Payload that was run.
    pub payload: String,
    /// Combined program output, partial when the run timed out (empty when
    /// the program never ran).
    pub output: String,
    pub succeeded: bool,
    /// Tagged fault description for failed attempts.
    pub error: Option<String>,
    pub fault: Option<FaultKind>,
    pub library_version: Option<String>,
}

/// Strategy applied to the payload between a failed attempt and the next one.
pub(crate) trait PayloadTransform: Send + Sync {
    /// Returns the payload for the next attempt.
    fn transform(&self, payload: &str, failed: &AttemptRecord) -> String;
}

/// Resubmits the payload unchanged.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct IdentityTransform;

impl PayloadTransform for IdentityTransform {
    fn transform(&self, payload: &str, _failed: &AttemptRecord) -> String {
        payload.to_string()
    }
}

impl<F> PayloadTransform for F
where
    F: Fn(&str, &AttemptRecord) -> String + Send + Sync,
{
    fn transform(&self, payload: &str, failed: &AttemptRecord) -> String {
        self(payload, failed)
    }
}

/// Result of a full retry run.
#[derive(Debug, Clone)]
pub(crate) struct RetryReport {
    /// Every attempt made, in order.
    pub attempts: Vec<AttemptRecord>,
    /// Either `Succeeded` or `ExhaustedFailure`.
    pub final_state: AttemptState,
    /// Terminal failure message, set when attempts were exhausted.
    pub error: Option<String>,
}

impl RetryReport {
    pub fn succeeded(&self) -> bool {
        self.final_state == AttemptState::Succeeded
    }

    pub fn attempt_count(&self) -> usize {
        self.attempts.len()
    }

    pub fn last_attempt(&self) -> Option<&AttemptRecord> {
        self.attempts.last()
    }
}

/// Message returned once every attempt has failed.
pub(crate) fn exhausted_message(attempts: u32) -> String {
    format!("Failed to run the code successfully after {attempts} attempts")
}

/// Runs payloads through a sandbox with a fixed attempt ceiling.
pub(crate) struct RetryController {
    sandbox: Arc<dyn CodeSandbox>,
    max_attempts: u32,
    transform: Box<dyn PayloadTransform>,
}

impl RetryController {
    pub fn new(sandbox: Arc<dyn CodeSandbox>, max_attempts: u32) -> Self {
        Self {
            sandbox,
            max_attempts,
            transform: Box::new(IdentityTransform),
        }
    }

    /// Replace the payload transform applied after each failure.
    pub fn with_transform(mut self, transform: impl PayloadTransform + 'static) -> Self {
        self.transform = Box::new(transform);
        self
    }

    /// Effective ceiling; 0 is treated as a single attempt.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Run `payload` until it succeeds or the ceiling is reached.
    pub async fn run(&self, payload: &str) -> RetryReport {
        let ceiling = self.max_attempts();
        let mut payload = payload.to_string();
        let mut attempts = Vec::new();

        for attempt_number in 1..=ceiling {
            let mut state = AttemptState::Pending;
            advance(&mut state, AttemptState::Running, attempt_number);

            let record = self.attempt(attempt_number, ceiling, &payload).await;

            if record.succeeded {
                advance(&mut state, AttemptState::Succeeded, attempt_number);
                info!("Attempt {}/{} succeeded", attempt_number, ceiling);
                attempts.push(record);
                return RetryReport {
                    attempts,
                    final_state: state,
                    error: None,
                };
            }

            advance(&mut state, AttemptState::Failed, attempt_number);
            warn!(
                "Attempt {}/{} failed: {}",
                attempt_number,
                ceiling,
                record.error.as_deref().unwrap_or("unknown error")
            );

            if attempt_number < ceiling {
                payload = self.transform.transform(&payload, &record);
                advance(&mut state, AttemptState::Pending, attempt_number);
            } else {
                advance(&mut state, AttemptState::ExhaustedFailure, attempt_number);
            }
            attempts.push(record);
        }

        RetryReport {
            attempts,
            final_state: AttemptState::ExhaustedFailure,
            error: Some(exhausted_message(ceiling)),
        }
    }

    async fn attempt(&self, attempt_number: u32, ceiling: u32, payload: &str) -> AttemptRecord {
        info!(
            "Attempt {}/{} in {} sandbox",
            attempt_number,
            ceiling,
            self.sandbox.name()
        );

        let (output, error, library_version) = match self.sandbox.execute(payload).await {
            Ok(out) if out.succeeded() => (out.output, None, out.library_version),
            Ok(out) => (
                out.output,
                Some(SandboxError::program_failed(out.exit_code)),
                None,
            ),
            Err(e) => {
                if e.is_timeout() {
                    warn!("Attempt {} killed at the time limit", attempt_number);
                }
                let output = e.partial_output().unwrap_or_default().to_string();
                (output, Some(e), None)
            }
        };

        AttemptRecord {
            attempt_number,
            payload: payload.to_string(),
            output,
            succeeded: error.is_none(),
            fault: error.as_ref().map(SandboxError::kind),
            error: error.map(|e| e.to_string()),
            library_version,
        }
    }
}

fn advance(state: &mut AttemptState, next: AttemptState, attempt_number: u32) {
    debug_assert!(
        state.can_transition_to(next),
        "illegal attempt transition {state} -> {next}"
    );
    debug!("Attempt {}: {} -> {}", attempt_number, state, next);
    *state = next;
}
