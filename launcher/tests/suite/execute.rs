use std::path::Path;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;
use std::time::Instant;

use codex_launcher::CodexLauncher;
use codex_launcher::LaunchError;
use codex_launcher::RunOptions;
use codex_launcher::RunResult;
use codex_launcher::SandboxError;
use codex_launcher::Settings;
use codex_launcher::UnavailableError;
use pretty_assertions::assert_eq;
use tempfile::TempDir;

use super::fake_codex::Behavior;
use super::fake_codex::FakeCodex;
use super::fake_codex::empty_search_path;

struct Harness {
    fake: FakeCodex,
    search: TempDir,
    workspace: TempDir,
}

impl Harness {
    fn new(behavior: Behavior) -> anyhow::Result<Self> {
        Ok(Self {
            fake: FakeCodex::new(behavior)?,
            search: empty_search_path()?,
            workspace: TempDir::new()?,
        })
    }

    fn settings(&self) -> Settings {
        Settings {
            binary: None,
            sandbox: None,
            default_mode: "suggest".to_string(),
            default_timeout: None,
        }
    }

    fn launcher(&self, settings: Settings) -> CodexLauncher {
        CodexLauncher::new(settings, Some(self.fake.path_string()))
            .with_search_path(self.search.path())
            .with_confirmer(|_: &str| -> bool { panic!("confirmation should not be requested") })
    }

    fn sandbox(&self) -> std::path::PathBuf {
        self.workspace.path().join("sbx")
    }

    fn options(&self) -> RunOptions {
        RunOptions {
            mode: Some("suggest".to_string()),
            sandbox_override: Some(self.sandbox()),
            approve: true,
            ..RunOptions::default()
        }
    }
}

fn canonical(path: &Path) -> anyhow::Result<String> {
    Ok(std::fs::canonicalize(path)?.to_string_lossy().into_owned())
}

fn args(result: &RunResult) -> Vec<&str> {
    result.command.args().iter().map(String::as_str).collect()
}

#[tokio::test]
async fn approved_run_captures_output() -> anyhow::Result<()> {
    let harness = Harness::new(Behavior::default())?;
    let launcher = harness.launcher(harness.settings());

    let result = launcher.execute(harness.options()).await?;

    let sandbox = canonical(&harness.sandbox())?;
    let binary = harness.fake.path_string();
    assert_eq!(
        args(&result),
        vec![
            binary.as_str(),
            "run",
            "--mode",
            "suggest",
            "--sandbox",
            sandbox.as_str()
        ]
    );
    assert_eq!(result.return_code, Some(0));
    assert_eq!(result.stdout, "ok");
    assert_eq!(result.stderr, "");
    assert!(!result.dry_run);
    assert_eq!(harness.fake.runs()?.len(), 1);
    Ok(())
}

#[tokio::test]
async fn dry_run_never_spawns() -> anyhow::Result<()> {
    let harness = Harness::new(Behavior::default())?;
    let launcher = harness.launcher(harness.settings());

    let result = launcher
        .execute(RunOptions {
            dry_run: true,
            ..harness.options()
        })
        .await?;

    assert!(result.dry_run);
    assert_eq!(result.return_code, None);
    assert_eq!(result.stdout, "");
    assert_eq!(result.stderr, "");
    assert_eq!(args(&result).last(), Some(&"--dry-run"));
    assert!(harness.fake.runs()?.is_empty());
    Ok(())
}

#[tokio::test]
async fn dry_run_still_asks_for_confirmation() -> anyhow::Result<()> {
    let harness = Harness::new(Behavior::default())?;
    let options = RunOptions {
        dry_run: true,
        approve: false,
        ..harness.options()
    };

    let declined = harness
        .launcher(harness.settings())
        .with_confirmer(|_: &str| false)
        .execute(options.clone())
        .await
        .expect_err("operator declined the dry run");
    assert!(declined.is_cancelled(), "{declined:?}");

    let prompts = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&prompts);
    let result = harness
        .launcher(harness.settings())
        .with_confirmer(move |prompt: &str| {
            seen.lock().expect("lock").push(prompt.to_string());
            true
        })
        .execute(options)
        .await?;
    assert!(result.dry_run);
    assert_eq!(result.return_code, None);
    let prompts = prompts.lock().expect("lock").clone();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains("--dry-run"));

    assert!(harness.fake.runs()?.is_empty());
    Ok(())
}

#[tokio::test]
async fn declined_auto_run_is_cancelled() -> anyhow::Result<()> {
    let harness = Harness::new(Behavior::default())?;
    let prompts = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&prompts);
    let launcher = harness
        .launcher(harness.settings())
        .with_confirmer(move |prompt: &str| {
            seen.lock().expect("lock").push(prompt.to_string());
            false
        });

    let err = launcher
        .execute(RunOptions {
            mode: Some("auto".to_string()),
            approve: false,
            ..harness.options()
        })
        .await
        .expect_err("operator declined");

    assert!(err.is_cancelled(), "{err:?}");
    let prompts = prompts.lock().expect("lock").clone();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].starts_with("Codex will run in AUTO mode. Proceed?"));
    assert!(prompts[0].contains("--mode auto"));
    assert!(harness.fake.runs()?.is_empty());
    Ok(())
}

#[tokio::test]
async fn confirmed_run_proceeds() -> anyhow::Result<()> {
    let harness = Harness::new(Behavior::default())?;
    let launcher = harness
        .launcher(harness.settings())
        .with_confirmer(|prompt: &str| prompt.starts_with("Execute Codex in SUGGEST mode?"));

    let result = launcher
        .execute(RunOptions {
            approve: false,
            ..harness.options()
        })
        .await?;

    assert_eq!(result.return_code, Some(0));
    assert_eq!(harness.fake.runs()?.len(), 1);
    Ok(())
}

#[tokio::test]
async fn invalid_mode_is_rejected_before_spawn() -> anyhow::Result<()> {
    let harness = Harness::new(Behavior::default())?;
    let launcher = harness.launcher(harness.settings());

    let err = launcher
        .execute(RunOptions {
            mode: Some("yolo".to_string()),
            ..harness.options()
        })
        .await
        .expect_err("mode is not supported");

    let LaunchError::Execution(err) = err else {
        panic!("unexpected error: {err:?}");
    };
    assert_eq!(err.return_code, -1);
    assert_eq!(err.command.args(), [harness.fake.path_string()]);
    assert_eq!(err.to_string(), "unsupported Codex mode 'yolo'");
    assert!(harness.fake.runs()?.is_empty());
    Ok(())
}

#[tokio::test]
async fn settings_supply_mode_and_timeout() -> anyhow::Result<()> {
    let harness = Harness::new(Behavior::default())?;
    let launcher = harness.launcher(Settings {
        default_mode: "auto".to_string(),
        default_timeout: Some(60),
        ..harness.settings()
    });

    let result = launcher
        .execute(RunOptions {
            mode: None,
            ..harness.options()
        })
        .await?;
    let args = args(&result);
    assert_eq!(args[3], "auto");
    assert_eq!(&args[6..], ["--timeout", "60"]);

    let result = launcher
        .execute(RunOptions {
            mode: None,
            timeout: Some(30),
            context: Some("tidy up".to_string()),
            ..harness.options()
        })
        .await?;
    assert_eq!(
        &result.command.args()[6..],
        ["--context", "tidy up", "--timeout", "30"]
    );
    assert_eq!(harness.fake.self_checks()?, 1);
    Ok(())
}

#[tokio::test]
async fn invalid_configured_mode_is_rejected() -> anyhow::Result<()> {
    let harness = Harness::new(Behavior::default())?;
    let launcher = harness.launcher(Settings {
        default_mode: "full-auto".to_string(),
        ..harness.settings()
    });

    let err = launcher
        .execute(RunOptions {
            mode: None,
            ..harness.options()
        })
        .await
        .expect_err("configured mode is not supported");

    assert!(matches!(err, LaunchError::Execution(_)), "{err:?}");
    assert!(harness.fake.runs()?.is_empty());
    Ok(())
}

#[tokio::test]
async fn non_zero_exit_carries_streams() -> anyhow::Result<()> {
    let harness = Harness::new(Behavior {
        stdout: "partial".to_string(),
        stderr: "model refused".to_string(),
        exit: 3,
        ..Behavior::default()
    })?;
    let launcher = harness.launcher(harness.settings());

    let err = launcher
        .execute(harness.options())
        .await
        .expect_err("codex exits non-zero");

    let LaunchError::Execution(err) = err else {
        panic!("unexpected error: {err:?}");
    };
    assert_eq!(err.return_code, 3);
    assert_eq!(err.stdout, "partial");
    assert_eq!(err.stderr, "model refused");
    assert_eq!(err.message, None);
    assert_eq!(err.command.args()[1], "run");
    Ok(())
}

#[tokio::test]
async fn timeout_kills_the_process() -> anyhow::Result<()> {
    let harness = Harness::new(Behavior {
        stdout: "started".to_string(),
        hang_secs: Some(10),
        ..Behavior::default()
    })?;
    let launcher = harness.launcher(Settings {
        default_timeout: Some(1),
        ..harness.settings()
    });

    let started = Instant::now();
    let err = launcher
        .execute(harness.options())
        .await
        .expect_err("codex should time out");

    assert!(started.elapsed() < Duration::from_secs(8));
    let LaunchError::Execution(err) = err else {
        panic!("unexpected error: {err:?}");
    };
    assert_eq!(err.return_code, -1);
    assert_eq!(err.stdout, "started");
    assert_eq!(err.message.as_deref(), Some("codex timed out after 1s"));
    assert_eq!(&err.command.args()[6..], ["--timeout", "1"]);
    Ok(())
}

#[tokio::test]
async fn binary_removed_after_verification_is_unavailable() -> anyhow::Result<()> {
    let harness = Harness::new(Behavior::default())?;
    let launcher = harness.launcher(harness.settings());

    launcher.resolve_binary().await?;
    std::fs::remove_file(harness.fake.path())?;
    let err = launcher
        .execute(harness.options())
        .await
        .expect_err("binary is gone");

    assert!(
        matches!(err, LaunchError::Unavailable(UnavailableError::Launch { .. })),
        "{err:?}"
    );
    Ok(())
}

#[tokio::test]
async fn unavailable_binary_leaves_sandbox_untouched() -> anyhow::Result<()> {
    let harness = Harness::new(Behavior {
        version_exit: 2,
        ..Behavior::default()
    })?;
    let launcher = harness.launcher(harness.settings());

    let err = launcher
        .execute(harness.options())
        .await
        .expect_err("no usable binary");

    assert!(matches!(err, LaunchError::Unavailable(_)), "{err:?}");
    assert!(!harness.sandbox().exists());
    assert!(harness.fake.runs()?.is_empty());
    Ok(())
}

#[tokio::test]
async fn missing_sandbox_configuration_fails() -> anyhow::Result<()> {
    let harness = Harness::new(Behavior::default())?;
    let launcher = harness.launcher(harness.settings());

    let err = launcher
        .execute(RunOptions {
            sandbox_override: None,
            ..harness.options()
        })
        .await
        .expect_err("no sandbox configured");

    assert!(
        matches!(err, LaunchError::Sandbox(SandboxError::NotConfigured)),
        "{err:?}"
    );
    assert!(harness.fake.runs()?.is_empty());
    Ok(())
}
