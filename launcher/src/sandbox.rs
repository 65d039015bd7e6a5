use std::path::Component;
use std::path::Path;
use std::path::PathBuf;

use tracing::info;

use crate::error::SandboxError;

/// Resolve the directory Codex is confined to, creating it when missing.
///
/// `override_dir` wins over `default_dir`. The returned path is absolute,
/// canonical and known to be a directory. Nothing here ever deletes the
/// sandbox.
pub fn resolve_sandbox(
    override_dir: Option<&Path>,
    default_dir: Option<&Path>,
) -> Result<PathBuf, SandboxError> {
    let source = override_dir
        .or(default_dir)
        .ok_or(SandboxError::NotConfigured)?;
    let path = absolutize(&expand_home(source)?);

    if let Err(source) = std::fs::create_dir_all(&path) {
        if path.exists() && !path.is_dir() {
            return Err(SandboxError::NotADirectory { path });
        }
        return Err(SandboxError::Create { path, source });
    }

    let path = dunce::canonicalize(&path)
        .map_err(|source| SandboxError::Canonicalize { path, source })?;
    if !path.is_dir() {
        return Err(SandboxError::NotADirectory { path });
    }
    info!("sandbox ready at {}", path.display());
    Ok(path)
}

/// Expand a leading `~` to the current user's home directory. `~user` is
/// rejected rather than created as a relative directory named `~user`.
fn expand_home(path: &Path) -> Result<PathBuf, SandboxError> {
    let mut components = path.components();
    let Some(Component::Normal(first)) = components.next() else {
        return Ok(path.to_path_buf());
    };
    if first == "~" {
        return Ok(match dirs::home_dir() {
            Some(home) => home.join(components.as_path()),
            None => path.to_path_buf(),
        });
    }
    if first.to_string_lossy().starts_with('~') {
        return Err(SandboxError::OtherUserHome {
            path: path.to_path_buf(),
        });
    }
    Ok(path.to_path_buf())
}

fn absolutize(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}
