use std::process::ExitCode;

use clap::Parser;
use codex_launcher_cli::Cli;

#[tokio::main]
async fn main() -> ExitCode {
    codex_launcher_cli::run_main(Cli::parse()).await
}
