// Stdout carries only what the user asked for: the tool's output, the dry-run
// command or the JSON result. Everything else goes to stderr.
#![deny(clippy::print_stdout)]

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use clap::Subcommand;
use codex_launcher::CodexLauncher;
use codex_launcher::ExecutionError;
use codex_launcher::LaunchError;
use codex_launcher::RunOptions;
use codex_launcher::RunResult;
use codex_launcher_config::Settings;
use tracing::debug;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

/// Run the Codex CLI inside a sandbox directory.
#[derive(Debug, Parser)]
#[command(name = "codex-launch", version)]
pub struct Cli {
    /// Path or command name of the Codex binary. Takes priority over
    /// AMPLIFIER_CODEX_BIN.
    #[arg(long = "codex-bin", value_name = "PATH", global = true)]
    pub codex_bin: Option<String>,

    /// Log debug output to stderr (RUST_LOG still wins when set).
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run Codex once.
    Run(RunArgs),

    /// Print the Codex binary and sandbox directory that would be used.
    Resolve(ResolveArgs),
}

#[derive(Debug, Parser)]
pub struct RunArgs {
    /// `suggest` or `auto`. Defaults to AMPLIFIER_CODEX_DEFAULT_MODE.
    #[arg(long, value_name = "MODE")]
    pub mode: Option<String>,

    /// Free-form instructions passed to Codex.
    #[arg(long, value_name = "TEXT")]
    pub context: Option<String>,

    /// Sandbox directory. Created if missing.
    #[arg(long, value_name = "DIR")]
    pub sandbox: Option<PathBuf>,

    /// Print the command instead of running it.
    #[arg(long = "dry-run")]
    pub dry_run: bool,

    /// Do not ask for confirmation.
    #[arg(short, long)]
    pub yes: bool,

    /// Kill Codex after this many seconds.
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Print the run result as JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Parser)]
pub struct ResolveArgs {
    /// Sandbox directory. Created if missing.
    #[arg(long, value_name = "DIR")]
    pub sandbox: Option<PathBuf>,
}

pub async fn run_main(cli: Cli) -> ExitCode {
    init_logging(cli.verbose);
    match dispatch(cli).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_filter(env_filter);

    let _ = tracing_subscriber::registry().with(fmt_layer).try_init();
}

async fn dispatch(cli: Cli) -> anyhow::Result<ExitCode> {
    let settings = Settings::load().context("failed to load launcher settings")?;
    debug!("loaded settings: {settings:?}");
    let launcher = CodexLauncher::new(settings, cli.codex_bin);

    match cli.command {
        Command::Run(args) => run(&launcher, args).await,
        Command::Resolve(args) => resolve(&launcher, args).await,
    }
}

async fn run(launcher: &CodexLauncher, args: RunArgs) -> anyhow::Result<ExitCode> {
    let json = args.json;
    let options = RunOptions {
        mode: args.mode,
        context: args.context,
        sandbox_override: args.sandbox,
        dry_run: args.dry_run,
        approve: args.yes,
        timeout: args.timeout,
    };

    match launcher.execute(options).await {
        Ok(result) => {
            print_result(&result, json)?;
            Ok(ExitCode::SUCCESS)
        }
        Err(LaunchError::Cancelled) => {
            eprintln!("Cancelled.");
            Ok(ExitCode::SUCCESS)
        }
        Err(LaunchError::Execution(err)) => {
            report_failure(&err);
            Ok(ExitCode::from(failure_status(err.return_code)))
        }
        Err(err) => Err(err.into()),
    }
}

async fn resolve(launcher: &CodexLauncher, args: ResolveArgs) -> anyhow::Result<ExitCode> {
    let binary = launcher.resolve_binary().await?;
    let sandbox = launcher.resolve_sandbox(args.sandbox.as_deref())?;

    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "binary: {}", binary.display())?;
    writeln!(stdout, "sandbox: {}", sandbox.display())?;
    Ok(ExitCode::SUCCESS)
}

fn print_result(result: &RunResult, json: bool) -> anyhow::Result<()> {
    let mut stdout = std::io::stdout().lock();
    if json {
        writeln!(stdout, "{}", serde_json::to_string_pretty(result)?)?;
    } else if result.dry_run {
        writeln!(stdout, "{}", result.command_display())?;
    } else {
        stdout.write_all(result.stdout.as_bytes())?;
    }
    stdout.flush()?;
    Ok(())
}

fn report_failure(err: &ExecutionError) {
    eprintln!("Error: {err}");
    eprintln!("Command: {}", err.command.display());
    if !err.stderr.trim().is_empty() {
        eprintln!("--- stderr ---\n{}", err.stderr.trim_end());
    }
    if !err.stdout.trim().is_empty() {
        eprintln!("--- stdout ---\n{}", err.stdout.trim_end());
    }
}

/// The tool's own exit code when it fits a process exit status, else 1.
fn failure_status(return_code: i32) -> u8 {
    u8::try_from(return_code)
        .ok()
        .filter(|code| *code != 0)
        .unwrap_or(1)
}
