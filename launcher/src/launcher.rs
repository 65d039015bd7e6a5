use std::path::Path;
use std::path::PathBuf;
use std::process::ExitStatus;
use std::process::Stdio;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::time::Duration;

use codex_launcher_config::DEFAULT_MODE;
use codex_launcher_config::Settings;
use tokio::io::AsyncRead;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::debug;
use tracing::info;

use crate::binary::BinaryResolver;
use crate::command::CodexCommand;
use crate::command::Mode;
use crate::command::build_command;
use crate::confirm::Confirmer;
use crate::confirm::TerminalConfirmer;
use crate::confirm::require_confirmation;
use crate::error::ExecutionError;
use crate::error::LaunchError;
use crate::error::UnavailableError;
use crate::result::RunResult;
use crate::sandbox::resolve_sandbox;

/// How long to keep draining stdout/stderr after the child has exited or been
/// killed. Grandchildren that inherited the pipes can otherwise keep them open
/// indefinitely.
const IO_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

const READ_CHUNK_SIZE: usize = 8_192;

/// Per-run knobs. Anything left unset falls back to [`Settings`].
#[derive(Clone, Debug, Default)]
pub struct RunOptions {
    pub mode: Option<String>,
    pub context: Option<String>,
    pub sandbox_override: Option<PathBuf>,
    pub dry_run: bool,
    /// Skip the confirmation prompt.
    pub approve: bool,
    /// Timeout in seconds.
    pub timeout: Option<u64>,
}

/// Entry point for running Codex: resolve, sandbox, build, confirm, spawn.
pub struct CodexLauncher {
    settings: Settings,
    resolver: BinaryResolver,
    confirmer: Box<dyn Confirmer>,
}

impl CodexLauncher {
    /// `binary_override` takes priority over the binary named in `settings`.
    pub fn new(settings: Settings, binary_override: Option<String>) -> Self {
        let resolver = BinaryResolver::new(binary_override, settings.binary.clone());
        Self {
            settings,
            resolver,
            confirmer: Box::new(TerminalConfirmer),
        }
    }

    pub fn with_confirmer(mut self, confirmer: impl Confirmer + 'static) -> Self {
        self.confirmer = Box::new(confirmer);
        self
    }

    /// Search `path` instead of the process `PATH` when resolving bare names.
    pub fn with_search_path(mut self, path: impl Into<std::ffi::OsString>) -> Self {
        self.resolver = self.resolver.with_search_path(path);
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn resolver(&self) -> &BinaryResolver {
        &self.resolver
    }

    pub async fn resolve_binary(&self) -> Result<PathBuf, LaunchError> {
        Ok(self.resolver.resolve().await?)
    }

    pub fn resolve_sandbox(&self, override_dir: Option<&Path>) -> Result<PathBuf, LaunchError> {
        Ok(resolve_sandbox(override_dir, self.settings.sandbox.as_deref())?)
    }

    /// Run Codex once. Every failure is returned to the caller as-is; nothing
    /// is retried.
    pub async fn execute(&self, options: RunOptions) -> Result<RunResult, LaunchError> {
        let binary = self.resolve_binary().await?;
        let sandbox = self.resolve_sandbox(options.sandbox_override.as_deref())?;

        let requested_mode = options
            .mode
            .as_deref()
            .filter(|mode| !mode.is_empty())
            .or_else(|| Some(self.settings.default_mode.as_str()).filter(|mode| !mode.is_empty()))
            .unwrap_or(DEFAULT_MODE);
        let Some(mode) = Mode::parse(requested_mode) else {
            let command = CodexCommand::from_args(vec![binary.to_string_lossy().into_owned()]);
            return Err(ExecutionError::rejected(
                command,
                format!("unsupported Codex mode '{requested_mode}'"),
            )
            .into());
        };

        let timeout = options.timeout.or(self.settings.default_timeout);
        let command = build_command(
            &binary,
            &sandbox,
            mode,
            options.context.as_deref(),
            options.dry_run,
            timeout,
        );

        if !options.approve {
            require_confirmation(self.confirmer.as_ref(), &command, mode)?;
        }

        if options.dry_run {
            info!("dry run: {}", command.display());
            return Ok(RunResult::dry_run(command));
        }

        run_command(command, timeout.map(Duration::from_secs)).await
    }
}

async fn run_command(
    command: CodexCommand,
    timeout: Option<Duration>,
) -> Result<RunResult, LaunchError> {
    debug!("spawning {}", command.display());
    let mut child = Command::new(command.program())
        .args(command.arguments())
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| UnavailableError::Launch {
            binary: PathBuf::from(command.program()),
            source,
        })?;

    let stdout = OutputCapture::start(child.stdout.take());
    let stderr = OutputCapture::start(child.stderr.take());

    let waited = match timeout {
        Some(limit) => match tokio::time::timeout(limit, child.wait()).await {
            Ok(status) => status,
            Err(_) => {
                if let Err(err) = child.start_kill() {
                    debug!("failed to kill timed out codex process: {err}");
                }
                if let Err(err) = child.wait().await {
                    debug!("failed to reap timed out codex process: {err}");
                }
                return Err(ExecutionError {
                    command,
                    return_code: -1,
                    stdout: stdout.finish().await,
                    stderr: stderr.finish().await,
                    message: Some(format!("codex timed out after {}s", limit.as_secs())),
                }
                .into());
            }
        },
        None => child.wait().await,
    };

    let stdout = stdout.finish().await;
    let stderr = stderr.finish().await;
    let status = match waited {
        Ok(status) => status,
        Err(err) => {
            return Err(ExecutionError {
                command,
                return_code: -1,
                stdout,
                stderr,
                message: Some(format!("failed to wait for codex: {err}")),
            }
            .into());
        }
    };

    let return_code = exit_code(status);
    debug!("codex exited with code {return_code}");
    if return_code != 0 {
        return Err(ExecutionError {
            command,
            return_code,
            stdout,
            stderr,
            message: None,
        }
        .into());
    }
    Ok(RunResult::completed(command, return_code, stdout, stderr))
}

/// Signal-terminated processes have no exit code; report them as `-1`.
fn exit_code(status: ExitStatus) -> i32 {
    status.code().unwrap_or(-1)
}

/// Accumulates one child stream in the background so that partial output is
/// still available if the child is killed.
struct OutputCapture {
    buffer: Arc<Mutex<Vec<u8>>>,
    reader: JoinHandle<()>,
}

impl OutputCapture {
    fn start<R>(stream: Option<R>) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&buffer);
        let reader = tokio::spawn(async move {
            let Some(mut stream) = stream else {
                return;
            };
            let mut chunk = vec![0u8; READ_CHUNK_SIZE];
            loop {
                match stream.read(&mut chunk).await {
                    Ok(0) => break,
                    Ok(n) => lock(&sink).extend_from_slice(&chunk[..n]),
                    Err(err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
                    Err(err) => {
                        debug!("stopped reading codex output: {err}");
                        break;
                    }
                }
            }
        });
        Self { buffer, reader }
    }

    async fn finish(mut self) -> String {
        if tokio::time::timeout(IO_DRAIN_TIMEOUT, &mut self.reader)
            .await
            .is_err()
        {
            self.reader.abort();
        }
        String::from_utf8_lossy(&lock(&self.buffer)).into_owned()
    }
}

fn lock(buffer: &Mutex<Vec<u8>>) -> MutexGuard<'_, Vec<u8>> {
    match buffer.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
