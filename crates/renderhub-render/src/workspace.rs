//! Job-exclusive working directories.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tracing::{debug, warn};
use uuid::Uuid;

use renderhub_core::types::id::DesignId;

/// Prefix of every working directory name under the working root.
pub const WORKDIR_PREFIX: &str = "render-";

/// A per-attempt directory that is removed when the attempt ends.
///
/// Call [`WorkingDirectory::cleanup`] on the normal path. If the guard is
/// dropped without it (panic, cancelled future) the directory is removed
/// synchronously in `Drop`.
#[derive(Debug)]
pub struct WorkingDirectory {
    path: PathBuf,
    removed: bool,
}

impl WorkingDirectory {
    /// Create `<root>/render-<designId>-<uuidv7>`.
    pub async fn create(root: &Path, design_id: DesignId) -> std::io::Result<Self> {
        let name = format!("{WORKDIR_PREFIX}{design_id}-{}", Uuid::now_v7().simple());
        let path = root.join(name);
        tokio::fs::create_dir_all(&path).await?;
        debug!(path = %path.display(), "Created working directory");
        Ok(Self {
            path,
            removed: false,
        })
    }

    /// Directory path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the directory and everything in it.
    pub async fn cleanup(mut self) -> std::io::Result<()> {
        self.removed = true;
        match tokio::fs::remove_dir_all(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}

impl Drop for WorkingDirectory {
    fn drop(&mut self) {
        if self.removed {
            return;
        }
        if let Err(e) = std::fs::remove_dir_all(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %self.path.display(), error = %e, "Failed to remove working directory on drop");
            }
        }
    }
}

/// Remove working directories under `root` last modified more than
/// `max_age` ago. Returns how many were removed.
///
/// Only entries carrying [`WORKDIR_PREFIX`] are considered.
pub async fn sweep_orphans(root: &Path, max_age: Duration) -> std::io::Result<usize> {
    let mut entries = match tokio::fs::read_dir(root).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e),
    };

    let now = SystemTime::now();
    let mut removed = 0;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name();
        if !name.to_string_lossy().starts_with(WORKDIR_PREFIX) {
            continue;
        }
        let meta = match entry.metadata().await {
            Ok(meta) if meta.is_dir() => meta,
            _ => continue,
        };
        let age = meta
            .modified()
            .ok()
            .and_then(|modified| now.duration_since(modified).ok())
            .unwrap_or_default();
        if age < max_age {
            continue;
        }

        match tokio::fs::remove_dir_all(entry.path()).await {
            Ok(()) => {
                debug!(path = %entry.path().display(), age_s = age.as_secs(), "Swept orphan working directory");
                removed += 1;
            }
            Err(e) => {
                warn!(path = %entry.path().display(), error = %e, "Failed to sweep working directory");
            }
        }
    }
    Ok(removed)
}
