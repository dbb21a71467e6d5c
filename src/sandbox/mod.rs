//! Docker sandbox for isolated program execution.
//!
//! A payload is baked into a throwaway image, run once in a throwaway
//! container under a wall-clock bound, and both are removed afterwards.

mod docker;
mod error;
#[cfg(test)]
pub(crate) mod mock;

pub(crate) use docker::DockerSandbox;
pub(crate) use error::{FaultKind, SandboxError};

use async_trait::async_trait;

/// Label attached to every image and container the sandbox creates.
pub(crate) const MANAGED_LABEL: &str = "proofrun.managed";

/// Transcript of a program that ran to completion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct SandboxOutput {
    /// Combined stdout and stderr, in arrival order.
    pub output: String,
    /// Exit status reported by the runtime.
    pub exit_code: i64,
    /// Version of the runtime dependency, when probed.
    pub library_version: Option<String>,
}

impl SandboxOutput {
    /// Returns true when the program exited cleanly.
    pub fn succeeded(&self) -> bool {
        self.exit_code == 0
    }
}

/// An isolated, disposable execution environment.
#[async_trait]
pub(crate) trait CodeSandbox: Send + Sync {
    /// Returns the sandbox name for display.
    fn name(&self) -> &'static str;

    /// Runs the payload once and returns its transcript.
    ///
    /// A non-zero exit is reported through [`SandboxOutput::exit_code`];
    /// `Err` means the program could not be run at all or timed out.
    async fn execute(&self, payload: &str) -> Result<SandboxOutput, SandboxError>;

    /// Removes images and containers left behind by interrupted runs.
    ///
    /// Returns the number of objects removed.
    async fn cleanup_orphaned(&self) -> Result<u32, SandboxError>;
}
