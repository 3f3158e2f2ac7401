use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use chrono::Local;
use tempfile::TempDir;

use crate::error::{EngineError, Result};

// Workspace root permissions
const WORKSPACE_ROOT_PERMISSIONS: u32 = 0o700;

/// Scratch directory exclusively owned by one submission
///
/// The directory is removed when the value is released or dropped, so every
/// exit path of the orchestration (early return, `?`, panic, cancelled
/// future) cleans up. Removal failures are logged and never raised.
#[derive(Debug)]
pub struct Workspace {
    dir: Option<TempDir>,
    path: PathBuf,
}

impl Workspace {
    /// Creates a uniquely named directory under `root`
    pub fn acquire(root: &Path) -> Result<Self> {
        let prefix = format!("oj-{}-", Local::now().format("%y%m%d-%H%M%S"));
        let dir = tempfile::Builder::new()
            .prefix(&prefix)
            .tempdir_in(root)
            .map_err(|e| {
                EngineError::io(format!("failed to create workspace in {}", root.display()), e)
            })?;
        let path = dir.path().to_path_buf();

        log::debug!("Acquired workspace {}", path.display());
        Ok(Self {
            dir: Some(dir),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn join(&self, name: impl AsRef<Path>) -> PathBuf {
        self.path.join(name)
    }

    /// Recursively deletes the directory
    pub fn release(mut self) {
        self.remove();
    }

    fn remove(&mut self) {
        let Some(dir) = self.dir.take() else {
            return;
        };
        match dir.close() {
            Ok(()) => log::debug!("Released workspace {}", self.path.display()),
            Err(e) => log::error!("Failed to remove workspace {}: {e}", self.path.display()),
        }
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        self.remove();
    }
}

/// Resolves and creates the directory that holds all workspaces
pub(crate) fn prepare_root(configured: Option<&Path>) -> Result<PathBuf> {
    let root = match configured {
        Some(path) => path.to_path_buf(),
        None => default_root(),
    };

    fs::create_dir_all(&root).map_err(|e| {
        EngineError::io(format!("failed to create workspace root {}", root.display()), e)
    })?;
    fs::set_permissions(&root, fs::Permissions::from_mode(WORKSPACE_ROOT_PERMISSIONS)).map_err(
        |e| EngineError::io(format!("failed to restrict workspace root {}", root.display()), e),
    )?;

    Ok(root)
}

fn default_root() -> PathBuf {
    use directories::ProjectDirs;

    match ProjectDirs::from("", "", "oj-runner") {
        Some(dirs) => dirs.cache_dir().join("workspaces"),
        None => {
            log::warn!("Unable to find user cache directory, using the system temp dir");
            std::env::temp_dir().join("oj-runner")
        }
    }
}
