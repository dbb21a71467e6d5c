//! Domain-specific error types for sandbox operations.
//!
//! Typed errors enable callers to match on specific failure modes
//! rather than parsing error message strings. The `Display` output
//! doubles as the tagged string handed back to the assistant.

use std::time::Duration;

/// Coarse classification of a sandbox fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FaultKind {
    /// The image could not be built.
    Build,
    /// The container could not be started or the program failed.
    Run,
    /// The wall-clock bound expired.
    Timeout,
    /// Anything else (daemon unreachable, broken log stream).
    Unexpected,
}

impl std::fmt::Display for FaultKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Build => write!(f, "build"),
            Self::Run => write!(f, "run"),
            Self::Timeout => write!(f, "timeout"),
            Self::Unexpected => write!(f, "unexpected"),
        }
    }
}

/// Errors that can occur during sandbox operations.
#[derive(Debug, Clone, thiserror::Error)]
pub(crate) enum SandboxError {
    /// Docker daemon is not running or not accessible.
    #[error("Docker is not available: {message}")]
    DockerUnavailable { message: String },

    /// Building the program image failed.
    #[error("Build error: {message}")]
    BuildFailed { message: String },

    /// Container operation failed (create, start, wait).
    #[error("Container error: {message}")]
    ContainerFailed { message: String },

    /// The program ran and exited with a non-zero status.
    #[error("Container error: program exited with status {exit_code}")]
    ProgramFailed { exit_code: i64 },

    /// Container execution exceeded the configured timeout. `output` holds
    /// whatever the program wrote before it was killed.
    #[error("Container execution timed out after {timeout_secs} seconds")]
    Timeout { timeout_secs: u64, output: String },

    /// Any other failure.
    #[error("Unexpected error: {message}")]
    Unexpected { message: String },
}

impl SandboxError {
    /// Creates a `DockerUnavailable` error.
    pub fn docker_unavailable(message: impl Into<String>) -> Self {
        Self::DockerUnavailable {
            message: message.into(),
        }
    }

    /// Creates a `BuildFailed` error.
    pub fn build_failed(message: impl Into<String>) -> Self {
        Self::BuildFailed {
            message: message.into(),
        }
    }

    /// Creates a `ContainerFailed` error.
    pub fn container_failed(message: impl Into<String>) -> Self {
        Self::ContainerFailed {
            message: message.into(),
        }
    }

    /// Creates a `ProgramFailed` error.
    pub fn program_failed(exit_code: i64) -> Self {
        Self::ProgramFailed { exit_code }
    }

    /// Creates a `Timeout` error from a `Duration` and the partial output.
    pub fn timeout(duration: Duration, output: impl Into<String>) -> Self {
        Self::Timeout {
            timeout_secs: duration.as_secs(),
            output: output.into(),
        }
    }

    /// Creates an `Unexpected` error.
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected {
            message: message.into(),
        }
    }

    /// Which class of fault this is.
    pub fn kind(&self) -> FaultKind {
        match self {
            Self::BuildFailed { .. } => FaultKind::Build,
            Self::ContainerFailed { .. } | Self::ProgramFailed { .. } => FaultKind::Run,
            Self::Timeout { .. } => FaultKind::Timeout,
            Self::DockerUnavailable { .. } | Self::Unexpected { .. } => FaultKind::Unexpected,
        }
    }

    /// Returns true if this is a timeout error.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Output the program produced before the fault, if any was captured.
    pub fn partial_output(&self) -> Option<&str> {
        match self {
            Self::Timeout { output, .. } => Some(output),
            _ => None,
        }
    }

    /// Returns true if this is a Docker unavailability error.
    pub fn is_docker_unavailable(&self) -> bool {
        matches!(self, Self::DockerUnavailable { .. })
    }
}

impl From<bollard::errors::Error> for SandboxError {
    fn from(err: bollard::errors::Error) -> Self {
        Self::unexpected(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_docker_unavailable_error() {
        let err = SandboxError::docker_unavailable("daemon not running");
        assert!(err.is_docker_unavailable());
        assert!(!err.is_timeout());
        assert_eq!(err.kind(), FaultKind::Unexpected);
        assert_eq!(
            err.to_string(),
            "Docker is not available: daemon not running"
        );
    }

    #[test]
    fn test_build_failed_error() {
        let err = SandboxError::build_failed("pip install failed");
        assert_eq!(err.kind(), FaultKind::Build);
        assert_eq!(err.partial_output(), None);
        assert_eq!(err.to_string(), "Build error: pip install failed");
    }

    #[test]
    fn test_timeout_error() {
        let err = SandboxError::timeout(Duration::from_secs(120), "tick\n");
        assert!(err.is_timeout());
        assert_eq!(err.partial_output(), Some("tick\n"));
        assert_eq!(err.kind(), FaultKind::Timeout);
        assert_eq!(
            err.to_string(),
            "Container execution timed out after 120 seconds"
        );
    }

    #[test]
    fn test_run_faults_share_a_kind() {
        let start = SandboxError::container_failed("failed to start");
        let exit = SandboxError::program_failed(1);
        assert_eq!(start.kind(), FaultKind::Run);
        assert_eq!(exit.kind(), FaultKind::Run);
        assert_eq!(start.to_string(), "Container error: failed to start");
        assert_eq!(
            exit.to_string(),
            "Container error: program exited with status 1"
        );
    }

    #[test]
    fn test_unexpected_error() {
        let err = SandboxError::unexpected("log stream closed");
        assert_eq!(err.kind(), FaultKind::Unexpected);
        assert_eq!(err.to_string(), "Unexpected error: log stream closed");
    }

    #[test]
    fn test_fault_kind_display() {
        assert_eq!(FaultKind::Build.to_string(), "build");
        assert_eq!(FaultKind::Run.to_string(), "run");
        assert_eq!(FaultKind::Timeout.to_string(), "timeout");
        assert_eq!(FaultKind::Unexpected.to_string(), "unexpected");
    }
}
