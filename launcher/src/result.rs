use serde::Serialize;

use crate::command::CodexCommand;

/// Outcome of a successful or dry-run Codex invocation.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct RunResult {
    pub command: CodexCommand,
    /// `None` exactly when `dry_run` is set.
    pub return_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub dry_run: bool,
}

impl RunResult {
    pub(crate) fn dry_run(command: CodexCommand) -> Self {
        Self {
            command,
            return_code: None,
            stdout: String::new(),
            stderr: String::new(),
            dry_run: true,
        }
    }

    pub(crate) fn completed(
        command: CodexCommand,
        return_code: i32,
        stdout: String,
        stderr: String,
    ) -> Self {
        Self {
            command,
            return_code: Some(return_code),
            stdout,
            stderr,
            dry_run: false,
        }
    }

    pub fn command_display(&self) -> String {
        self.command.display()
    }
}
