//! Per-session scratch directory with guaranteed cleanup.
//!
//! A [`WorkDir`] is removed when dropped unless it was handed off with
//! [`WorkDir::keep`]. That covers every early return, error, timeout and
//! cancelled future in the session without explicit cleanup calls.

use std::path::{Path, PathBuf};

/// Prefix of every session directory under the work root
pub const WORK_DIR_PREFIX: &str = "clipgrab-";

#[derive(Debug)]
pub struct WorkDir {
    path: PathBuf,
    armed: bool,
}

impl WorkDir {
    /// Creates a fresh, uniquely named directory under `root`.
    pub async fn create(root: &Path) -> std::io::Result<Self> {
        let path = root.join(format!("{}{}", WORK_DIR_PREFIX, uuid::Uuid::new_v4().simple()));
        fs_err::tokio::create_dir_all(&path).await?;
        tracing::debug!(dir = %path.display(), "Work dir created");
        Ok(Self { path, armed: true })
    }

    /// Takes ownership of an existing directory (e.g. one handed back by the registry).
    pub fn adopt(path: PathBuf) -> Self {
        Self { path, armed: true }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Disarms the guard and returns the path; the caller now owns cleanup.
    pub fn keep(mut self) -> PathBuf {
        self.armed = false;
        std::mem::take(&mut self.path)
    }
}

impl Drop for WorkDir {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let path = std::mem::take(&mut self.path);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn_blocking(move || remove_dir_logged(&path));
            }
            Err(_) => remove_dir_logged(&path),
        }
    }
}

/// Best-effort recursive removal; failures are logged, never returned.
pub fn remove_dir_logged(path: &Path) {
    match std::fs::remove_dir_all(path) {
        Ok(()) => tracing::debug!(dir = %path.display(), "Work dir removed"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(dir = %path.display(), error = %e, "Failed to remove work dir"),
    }
}
