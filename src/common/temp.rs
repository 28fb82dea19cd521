//! Scoped working directory for a single run.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Prefix of the per-run directory under `$TMPDIR`.
const WORK_DIR_PREFIX: &str = "lxc-local.";

/// Ephemeral directory holding the extracted metadata.
///
/// Removed when dropped, so every return path (success or `?`) cleans up.
/// Interrupts bypass drop; see [`cleanup_on_interrupt`].
#[derive(Debug)]
pub struct WorkDir {
    dir: TempDir,
}

impl WorkDir {
    /// Create a fresh work directory under the system temp dir.
    pub fn new() -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix(WORK_DIR_PREFIX)
            .tempdir()
            .context("Failed to create working directory")?;
        Ok(Self { dir })
    }

    /// Create a fresh work directory below `parent`.
    pub fn new_in(parent: &Path) -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix(WORK_DIR_PREFIX)
            .tempdir_in(parent)
            .with_context(|| {
                format!("Failed to create working directory in {}", parent.display())
            })?;
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Prepare an empty subdirectory, removing leftovers from a previous use.
    pub fn subdir(&self, name: &str) -> Result<PathBuf> {
        let sub = self.path().join(name);

        if sub.exists() {
            fs::remove_dir_all(&sub)
                .with_context(|| format!("Failed to clear {}", sub.display()))?;
        }
        fs::create_dir_all(&sub).with_context(|| format!("Failed to create {}", sub.display()))?;

        Ok(sub)
    }
}

/// Clean up a work directory after use.
///
/// Idempotent: a directory that is already gone is not an error.
pub fn cleanup_work_dir(path: &Path) {
    let _ = fs::remove_dir_all(path);
}

/// Remove `path` and exit with status 130 on SIGINT/SIGTERM/SIGHUP.
///
/// Can only be installed once per process.
pub fn cleanup_on_interrupt(path: PathBuf) -> Result<()> {
    ctrlc::set_handler(move || {
        cleanup_work_dir(&path);
        std::process::exit(130);
    })
    .context("setting up signal handler")
}
