use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::command::CodexCommand;

/// Every way a launch can end other than with a [`crate::RunResult`].
#[derive(Debug, Error)]
pub enum LaunchError {
    #[error(transparent)]
    Unavailable(#[from] UnavailableError),
    #[error(transparent)]
    Sandbox(#[from] SandboxError),
    #[error(transparent)]
    Execution(Box<ExecutionError>),
    /// The operator declined the confirmation prompt.
    #[error("codex execution cancelled by user")]
    Cancelled,
}

impl LaunchError {
    /// Cancellation is an expected outcome; callers usually treat it as a
    /// no-op rather than a failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// The command associated with the failure, when one was built.
    pub fn command(&self) -> Option<&CodexCommand> {
        match self {
            Self::Execution(err) => Some(&err.command),
            Self::Unavailable(_) | Self::Sandbox(_) | Self::Cancelled => None,
        }
    }
}

impl From<ExecutionError> for LaunchError {
    fn from(err: ExecutionError) -> Self {
        Self::Execution(Box::new(err))
    }
}

#[derive(Debug, Error)]
pub enum UnavailableError {
    #[error(
        "unable to locate the Codex CLI (tried: {}). Set AMPLIFIER_CODEX_BIN or use --codex-bin.",
        .candidates.join(", ")
    )]
    NotFound { candidates: Vec<String> },
    #[error("codex binary at {binary} could not be launched")]
    Launch {
        binary: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("sandbox directory is not configured. Use --sandbox or AMPLIFIER_CODEX_SANDBOX.")]
    NotConfigured,
    #[error("unable to create sandbox directory {path}")]
    Create {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("unable to resolve sandbox directory {path}")]
    Canonicalize {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("sandbox path {path} is not a directory")]
    NotADirectory { path: PathBuf },
    /// `~user/...` paths; only the current user's `~` is expanded.
    #[error("sandbox path {path} names another user's home directory; use an absolute path")]
    OtherUserHome { path: PathBuf },
}

/// A run that was rejected before spawning, timed out, or exited non-zero.
///
/// `return_code` is `-1` whenever no real exit status exists.
#[derive(Debug)]
pub struct ExecutionError {
    pub command: CodexCommand,
    pub return_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub message: Option<String>,
}

impl ExecutionError {
    pub(crate) fn rejected(command: CodexCommand, message: impl Into<String>) -> Self {
        Self {
            command,
            return_code: -1,
            stdout: String::new(),
            stderr: String::new(),
            message: Some(message.into()),
        }
    }
}

impl fmt::Display for ExecutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.message {
            Some(message) => f.write_str(message),
            None => write!(f, "codex exited with code {}", self.return_code),
        }
    }
}

impl std::error::Error for ExecutionError {}
