use std::fmt;
use std::path::Path;

use serde::Serialize;

/// How much autonomy Codex gets inside the sandbox.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Codex proposes changes and waits for a human to apply them.
    Suggest,
    /// Codex applies changes on its own.
    Auto,
}

impl Mode {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "suggest" => Some(Self::Suggest),
            "auto" => Some(Self::Auto),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Suggest => "suggest",
            Self::Auto => "auto",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Argument vector for one Codex invocation. The first element is always the
/// resolved binary.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(transparent)]
pub struct CodexCommand {
    args: Vec<String>,
}

impl CodexCommand {
    pub(crate) fn from_args(args: Vec<String>) -> Self {
        Self { args }
    }

    pub fn program(&self) -> &str {
        self.args.first().map(String::as_str).unwrap_or_default()
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Everything after the program.
    pub fn arguments(&self) -> &[String] {
        self.args.get(1..).unwrap_or_default()
    }

    /// Shell-quoted rendering suitable for showing to a human or pasting into
    /// a terminal.
    pub fn display(&self) -> String {
        shlex::try_join(self.args.iter().map(String::as_str))
            .unwrap_or_else(|_| self.args.join(" "))
    }
}

impl fmt::Display for CodexCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display())
    }
}

/// Assemble the `codex run` invocation. Pure: no I/O and no failure modes.
pub fn build_command(
    binary: &Path,
    sandbox: &Path,
    mode: Mode,
    context: Option<&str>,
    dry_run: bool,
    timeout_secs: Option<u64>,
) -> CodexCommand {
    let mut args = vec![
        binary.to_string_lossy().into_owned(),
        "run".to_string(),
        "--mode".to_string(),
        mode.as_str().to_string(),
        "--sandbox".to_string(),
        sandbox.to_string_lossy().into_owned(),
    ];
    if let Some(context) = context.filter(|context| !context.is_empty()) {
        args.push("--context".to_string());
        args.push(context.to_string());
    }
    if dry_run {
        args.push("--dry-run".to_string());
    }
    if let Some(timeout) = timeout_secs {
        args.push("--timeout".to_string());
        args.push(timeout.to_string());
    }
    CodexCommand::from_args(args)
}
