//! Settings for launching the Codex CLI from the host application.
//!
//! Values come from `AMPLIFIER_CODEX_*` environment variables and an optional
//! `.env` file in the working directory. Real environment variables win over
//! the `.env` file, which wins over the built-in defaults. Defaults are chosen
//! so that hosts keep working when Codex is not installed at all.

use std::collections::HashMap;
use std::ffi::OsString;
use std::path::Path;
use std::path::PathBuf;

use thiserror::Error;
use tracing::debug;

/// Prefix shared by every environment variable read by [`Settings::load`].
pub const ENV_PREFIX: &str = "AMPLIFIER_CODEX_";

/// Environment variable naming an explicit path or command name for Codex.
pub const BIN_ENV_VAR: &str = "AMPLIFIER_CODEX_BIN";

/// Environment variable naming the default sandbox directory.
pub const SANDBOX_ENV_VAR: &str = "AMPLIFIER_CODEX_SANDBOX";

pub const DEFAULT_MODE: &str = "suggest";

const DOTENV_FILENAME: &str = ".env";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}")]
    InvalidValue { key: String, value: String },
    #[error("failed to read {path}")]
    DotEnv {
        path: PathBuf,
        #[source]
        source: dotenvy::Error,
    },
}

/// Immutable configuration consumed by the launcher.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Settings {
    /// Explicit path or command name for the Codex binary.
    pub binary: Option<String>,
    /// Sandbox directory used when a run does not name one.
    pub sandbox: Option<PathBuf>,
    /// Mode used when a run does not name one. Validated at run time.
    pub default_mode: String,
    /// Timeout in seconds used when a run does not name one.
    pub default_timeout: Option<u64>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            binary: None,
            sandbox: default_sandbox_dir(),
            default_mode: DEFAULT_MODE.to_string(),
            default_timeout: None,
        }
    }
}

impl Settings {
    /// Load settings from `./.env` (when present) and the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        let dotenv = Path::new(DOTENV_FILENAME);
        let dotenv = dotenv.is_file().then_some(dotenv);
        Self::from_sources(dotenv, utf8_env(std::env::vars_os())?)
    }

    /// Build settings from an optional `.env` file and a set of environment
    /// variables. Entries in `env` override entries from the file.
    pub fn from_sources<I, K, V>(dotenv: Option<&Path>, env: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut values = HashMap::new();
        if let Some(path) = dotenv {
            for (key, value) in read_dotenv(path)? {
                insert_prefixed(&mut values, &key, value);
            }
        }
        for (key, value) in env {
            insert_prefixed(&mut values, key.as_ref(), value.into());
        }

        let mut settings = Self::default();
        if let Some(binary) = values.remove("BIN") {
            settings.binary = Some(binary);
        }
        if let Some(sandbox) = values.remove("SANDBOX") {
            settings.sandbox = Some(PathBuf::from(sandbox));
        }
        if let Some(mode) = values.remove("DEFAULT_MODE") {
            settings.default_mode = mode;
        }
        if let Some(raw) = values.remove("DEFAULT_TIMEOUT") {
            let timeout = raw
                .trim()
                .parse::<u64>()
                .map_err(|_| ConfigError::InvalidValue {
                    key: format!("{ENV_PREFIX}DEFAULT_TIMEOUT"),
                    value: raw.clone(),
                })?;
            settings.default_timeout = Some(timeout);
        }
        Ok(settings)
    }
}

/// `<data dir>/amplifier/codex/sandbox`, or `None` on platforms without a data
/// directory.
pub fn default_sandbox_dir() -> Option<PathBuf> {
    dirs::data_dir().map(|dir| dir.join("amplifier").join("codex").join("sandbox"))
}

fn read_dotenv(path: &Path) -> Result<Vec<(String, String)>, ConfigError> {
    let to_error = |source| ConfigError::DotEnv {
        path: path.to_path_buf(),
        source,
    };
    let entries = dotenvy::from_path_iter(path)
        .map_err(to_error)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(to_error)?;
    debug!("read {} entries from {}", entries.len(), path.display());
    Ok(entries)
}

/// Keep the environment entries that are valid UTF-8. Non-UTF-8 values are
/// only an error for `AMPLIFIER_CODEX_*` keys.
fn utf8_env<I>(vars: I) -> Result<Vec<(String, String)>, ConfigError>
where
    I: IntoIterator<Item = (OsString, OsString)>,
{
    let mut env = Vec::new();
    for (key, value) in vars {
        let Ok(key) = key.into_string() else {
            continue;
        };
        match value.into_string() {
            Ok(value) => env.push((key, value)),
            Err(raw) if key.to_ascii_uppercase().starts_with(ENV_PREFIX) => {
                return Err(ConfigError::InvalidValue {
                    key,
                    value: raw.to_string_lossy().into_owned(),
                });
            }
            Err(_) => debug!("ignoring non-UTF-8 environment variable {key}"),
        }
    }
    Ok(env)
}

/// Record `value` under the prefix-stripped, upper-cased key. Keys without the
/// prefix and empty values are ignored.
fn insert_prefixed(values: &mut HashMap<String, String>, key: &str, value: String) {
    let upper = key.to_ascii_uppercase();
    let Some(name) = upper.strip_prefix(ENV_PREFIX) else {
        return;
    };
    if value.trim().is_empty() {
        values.remove(name);
        return;
    }
    values.insert(name.to_string(), value);
}
