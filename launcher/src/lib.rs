//! Discovery, sandboxing, confirmation and execution of the Codex CLI.
//!
//! [`CodexLauncher::execute`] is the single entry point: it resolves and
//! verifies the `codex` binary, prepares the sandbox directory, builds the
//! `codex run` command line, optionally asks the operator for confirmation and
//! finally runs the process under a timeout.

// Library code reports through return values and `tracing`; the terminal
// confirmer writes its prompt through an explicit stderr handle.
#![deny(clippy::print_stdout, clippy::print_stderr)]

mod binary;
mod command;
mod confirm;
mod error;
mod launcher;
mod result;
mod sandbox;

pub use binary::BinaryResolver;
pub use binary::DEFAULT_BINARY;
pub use codex_launcher_config::Settings;
pub use command::CodexCommand;
pub use command::Mode;
pub use command::build_command;
pub use confirm::Confirmer;
pub use confirm::TerminalConfirmer;
pub use confirm::confirmation_prompt;
pub use error::ExecutionError;
pub use error::LaunchError;
pub use error::SandboxError;
pub use error::UnavailableError;
pub use launcher::CodexLauncher;
pub use launcher::RunOptions;
pub use result::RunResult;
pub use sandbox::resolve_sandbox;
