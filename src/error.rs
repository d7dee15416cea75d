//! Error types for the orchestration engine.
//!
//! [`OperationError`] classifies the outcome of a single step against the
//! taxonomy the engine reasons about (validation, transport, auth, quorum,
//! ...). [`VerbError`] wraps the joined per-host errors of a failed verb
//! with the verb's name, so a caller sees e.g. `"fail to add subcluster
//! sc1: 10.0.0.2: unauthorized"`.

use std::time::Duration;
use thiserror::Error;

use crate::model::Host;

/// Typed classification of a single operation's failure (§7).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OperationError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("host(s) unreachable: {0:?}")]
    Unreachable(Vec<Host>),

    #[error("authentication failed")]
    Auth,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("request timed out")]
    Timeout,

    #[error("polling deadline exceeded after {0:?}")]
    PollDeadline(Duration),

    #[error("connection closed (EOF) during a request expected to trigger shutdown")]
    EofOnShutdown,

    #[error("server internal error: {0}")]
    ServerInternal(String),

    #[error("failed to parse response: {0}")]
    Parse(String),

    #[error("unexpected response contract: {0}")]
    Contract(String),

    #[error("quorum not satisfied")]
    NoQuorum,

    #[error("operation's initiator is outside the requested sandbox")]
    WrongSandbox,

    #[error("operation cancelled")]
    Cancelled,
}

impl OperationError {
    pub fn is_validation(&self) -> bool {
        matches!(self, OperationError::Validation(_))
    }

    pub fn is_quorum_failure(&self) -> bool {
        matches!(self, OperationError::NoQuorum)
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, OperationError::Cancelled)
    }

    /// The benign EOF that legitimately accompanies a server shutting
    /// itself down (stop node, stop subcluster, TLS rotation).
    pub fn is_eof(&self) -> bool {
        matches!(self, OperationError::EofOnShutdown)
    }

    /// Whether retrying the same request might succeed: transient
    /// transport/server conditions, never validation or quorum failures.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            OperationError::Transport(_) | OperationError::Timeout | OperationError::ServerInternal(_)
        )
    }
}

/// One host's contribution to a joined operation error.
#[derive(Debug, Clone, PartialEq)]
pub struct HostError {
    pub host: Host,
    pub error: OperationError,
}

impl HostError {
    pub fn new(host: Host, error: OperationError) -> Self {
        Self { host, error }
    }
}

/// The error surfaced to the caller of a verb: the per-host errors that
/// aborted the plan, plus the short verb name used in the final message.
#[derive(Error, Debug, Clone)]
pub struct VerbError {
    pub verb: String,
    pub hosts: Vec<HostError>,
    /// Set when the failure happened before any per-host fan-out (option
    /// validation, quorum check, sandbox mismatch): there is no host to
    /// blame, only a verb-level reason.
    pub cause: Option<OperationError>,
}

impl std::fmt::Display for VerbError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "fail to {}", self.verb)?;
        if let Some(cause) = &self.cause {
            return write!(f, ": {cause}");
        }
        if self.hosts.is_empty() {
            return Ok(());
        }
        write!(
            f,
            ": {}",
            self.hosts
                .iter()
                .map(|h| format!("{}: {}", h.host, h.error))
                .collect::<Vec<_>>()
                .join("; ")
        )
    }
}

impl VerbError {
    /// A verb-level failure with no specific host attached (validation,
    /// quorum, sandbox mismatch).
    pub fn cause(verb: impl Into<String>, error: OperationError) -> Self {
        Self {
            verb: verb.into(),
            hosts: Vec::new(),
            cause: Some(error),
        }
    }

    /// A verb failure joined from the per-host errors an operation
    /// accumulated.
    pub fn from_hosts(verb: impl Into<String>, hosts: Vec<HostError>) -> Self {
        Self {
            verb: verb.into(),
            hosts,
            cause: None,
        }
    }

    pub fn is_quorum_failure(&self) -> bool {
        matches!(self.cause, Some(OperationError::NoQuorum))
            || self.hosts.iter().any(|h| h.error.is_quorum_failure())
    }

    pub fn is_wrong_sandbox(&self) -> bool {
        matches!(self.cause, Some(OperationError::WrongSandbox))
    }
}

pub type Result<T> = std::result::Result<T, OperationError>;
pub type VerbResult<T> = std::result::Result<T, VerbError>;

impl From<reqwest::Error> for OperationError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() {
            OperationError::Transport(format!("connect failed: {err}"))
        } else if err.is_timeout() {
            OperationError::Timeout
        } else if err.is_decode() {
            OperationError::Parse(err.to_string())
        } else {
            OperationError::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for OperationError {
    fn from(err: serde_json::Error) -> Self {
        OperationError::Parse(err.to_string())
    }
}
