use std::ffi::OsString;
use std::path::Path;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::OnceLock;

use tokio::process::Command;
use tracing::debug;
use tracing::info;

use crate::error::UnavailableError;

/// Name searched for on `PATH` when nothing more specific is configured.
pub const DEFAULT_BINARY: &str = "codex";

/// Argument used to check that a candidate actually runs.
const SELF_CHECK_ARG: &str = "--version";

/// Locates and verifies the Codex executable.
///
/// The first successful resolution is memoized: the cell is written at most
/// once and every later call returns the cached path without re-running the
/// self-check. Build a new resolver to force a fresh lookup.
#[derive(Debug)]
pub struct BinaryResolver {
    candidates: Vec<String>,
    search_path: Option<OsString>,
    resolved: OnceLock<PathBuf>,
}

impl BinaryResolver {
    /// `explicit` comes from the caller (e.g. `--codex-bin`), `configured`
    /// from settings. Both take priority over [`DEFAULT_BINARY`].
    pub fn new(explicit: Option<String>, configured: Option<String>) -> Self {
        Self {
            candidates: candidate_list(explicit, configured),
            search_path: None,
            resolved: OnceLock::new(),
        }
    }

    /// Search `path` instead of the process `PATH` for bare command names.
    pub fn with_search_path(mut self, path: impl Into<OsString>) -> Self {
        self.search_path = Some(path.into());
        self
    }

    pub fn candidates(&self) -> &[String] {
        &self.candidates
    }

    /// The cached binary, if resolution already succeeded.
    pub fn cached(&self) -> Option<&Path> {
        self.resolved.get().map(PathBuf::as_path)
    }

    pub async fn resolve(&self) -> Result<PathBuf, UnavailableError> {
        if let Some(binary) = self.resolved.get() {
            return Ok(binary.clone());
        }

        for candidate in &self.candidates {
            let Some(binary) = self.locate(candidate) else {
                debug!("codex candidate {candidate} not found");
                continue;
            };
            match self_check(&binary).await {
                Ok(()) => {
                    info!("using codex binary at {}", binary.display());
                    let binary = self.resolved.get_or_init(|| binary).clone();
                    return Ok(binary);
                }
                Err(reason) => {
                    debug!(
                        "codex candidate {} failed self-check: {reason}",
                        binary.display()
                    );
                }
            }
        }

        Err(UnavailableError::NotFound {
            candidates: self.candidates.clone(),
        })
    }

    fn locate(&self, candidate: &str) -> Option<PathBuf> {
        let path = Path::new(candidate);
        if path.is_absolute() && is_executable(path) {
            return Some(path.to_path_buf());
        }
        let search_path = self
            .search_path
            .clone()
            .or_else(|| std::env::var_os("PATH"));
        let cwd = std::env::current_dir().ok()?;
        which::which_in(candidate, search_path, cwd).ok()
    }
}

/// Candidates in priority order with duplicates and empty entries dropped.
fn candidate_list(explicit: Option<String>, configured: Option<String>) -> Vec<String> {
    let mut candidates: Vec<String> = Vec::new();
    let sources = [explicit, configured, Some(DEFAULT_BINARY.to_string())];
    for candidate in sources.into_iter().flatten() {
        if candidate.trim().is_empty() || candidates.contains(&candidate) {
            continue;
        }
        candidates.push(candidate);
    }
    candidates
}

async fn self_check(binary: &Path) -> Result<(), String> {
    let output = Command::new(binary)
        .arg(SELF_CHECK_ARG)
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|err| format!("failed to launch: {err}"))?;
    if output.status.success() {
        return Ok(());
    }
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stdout = String::from_utf8_lossy(&output.stdout);
    let detail = if stderr.trim().is_empty() {
        stdout.trim().to_string()
    } else {
        stderr.trim().to_string()
    };
    Err(format!("{} ({detail})", output.status))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    std::fs::metadata(path)
        .map(|metadata| metadata.is_file() && metadata.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
