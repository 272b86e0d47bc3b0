//! Files and directories that are removed unless explicitly kept
//!
//! Cleanup runs on drop, so an upload abandoned mid-stream (error or
//! cancelled future) never leaves staged data behind.

use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::warn;

#[derive(Debug, Clone, Copy)]
enum Kind {
    File,
    Dir,
}

pub(crate) struct Staged {
    path: PathBuf,
    kind: Kind,
    armed: bool,
}

impl Staged {
    pub(crate) fn file(path: PathBuf) -> Self {
        Self {
            path,
            kind: Kind::File,
            armed: true,
        }
    }

    pub(crate) fn dir(path: PathBuf) -> Self {
        Self {
            path,
            kind: Kind::Dir,
            armed: true,
        }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    /// Rename the staged file onto `dest`. On failure the staged file is
    /// still removed when `self` drops.
    pub(crate) async fn persist(mut self, dest: &Path) -> io::Result<()> {
        fs::rename(&self.path, dest).await?;
        self.armed = false;
        Ok(())
    }

    /// Keep the path as it is
    pub(crate) fn keep(mut self) {
        self.armed = false;
    }
}

impl Drop for Staged {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let result = match self.kind {
            Kind::File => std::fs::remove_file(&self.path),
            Kind::Dir => std::fs::remove_dir_all(&self.path),
        };
        match result {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = ?self.path, error = %e, "Failed to clean up staged upload"),
        }
    }
}

/// Write `value` as pretty JSON into `staging_dir`, ready to be persisted
pub(crate) async fn stage_json<T: serde::Serialize>(
    staging_dir: &Path,
    value: &T,
) -> io::Result<Staged> {
    let data = serde_json::to_vec_pretty(value)?;
    let staged = Staged::file(staging_dir.join(format!("{}.json.tmp", uuid::Uuid::new_v4())));
    fs::write(staged.path(), data).await?;
    Ok(staged)
}
