use std::io::BufRead;
use std::io::Write;

use tracing::warn;

use crate::command::CodexCommand;
use crate::command::Mode;
use crate::error::LaunchError;

/// Asks a human whether a run may proceed. Implementations must default to
/// "no" whenever an answer cannot be obtained.
pub trait Confirmer: Send + Sync {
    fn confirm(&self, prompt: &str) -> bool;
}

impl<F> Confirmer for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn confirm(&self, prompt: &str) -> bool {
        self(prompt)
    }
}

/// Prompts on stderr and reads a `y`/`yes` answer from stdin.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalConfirmer;

impl Confirmer for TerminalConfirmer {
    fn confirm(&self, prompt: &str) -> bool {
        let mut stderr = std::io::stderr().lock();
        if let Err(err) = write!(stderr, "{prompt} [y/N] ").and_then(|()| stderr.flush()) {
            warn!("failed to render confirmation prompt: {err}");
            return false;
        }

        let mut answer = String::new();
        match std::io::stdin().lock().read_line(&mut answer) {
            Ok(_) => is_affirmative(&answer),
            Err(err) => {
                warn!("failed to read confirmation answer: {err}");
                false
            }
        }
    }
}

fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

pub fn confirmation_prompt(command: &CodexCommand, mode: Mode) -> String {
    let headline = match mode {
        Mode::Auto => "Codex will run in AUTO mode. Proceed?",
        Mode::Suggest => "Execute Codex in SUGGEST mode?",
    };
    format!("{headline}\n{}\nContinue?", command.display())
}

pub(crate) fn require_confirmation(
    confirmer: &dyn Confirmer,
    command: &CodexCommand,
    mode: Mode,
) -> Result<(), LaunchError> {
    if confirmer.confirm(&confirmation_prompt(command, mode)) {
        Ok(())
    } else {
        Err(LaunchError::Cancelled)
    }
}
