//! Error types for the OpenClaw CLI client.
//!
//! Every variant carries owned strings so a single failure can be cloned out
//! to all callers that joined the same in-flight fetch.

use crate::cache::FlightAborted;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InvokeError {
    #[error("failed to start `{program}`: {message}")]
    Spawn { program: String, message: String },
    #[error("`{command}` timed out after {timeout:?}")]
    Timeout { command: String, timeout: Duration },
    #[error("`{command}` exited with {}: {stderr}", exit_code.map_or("signal".to_string(), |c| format!("status {c}")))]
    ProcessFailed {
        command: String,
        exit_code: Option<i32>,
        stderr: String,
    },
    #[error("malformed output: {0}")]
    MalformedOutput(String),
    #[error("unexpected payload shape: {0}")]
    ParseFailed(String),
    #[error("fetch aborted before completing")]
    Aborted,
}

impl From<FlightAborted> for InvokeError {
    fn from(_: FlightAborted) -> Self {
        InvokeError::Aborted
    }
}

impl InvokeError {
    /// Short machine-readable label, used in logs and API error payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            InvokeError::Spawn { .. } => "spawn_failed",
            InvokeError::Timeout { .. } => "timeout",
            InvokeError::ProcessFailed { .. } => "process_failed",
            InvokeError::MalformedOutput(_) => "malformed_output",
            InvokeError::ParseFailed(_) => "parse_failed",
            InvokeError::Aborted => "aborted",
        }
    }
}
