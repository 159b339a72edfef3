//! File system utilities for stapling.
//!
//! Provides the per-run scratch directory, the executable-bit predicate and
//! the atomic replacement of the user's artifact.

use crate::error::{ErrorExt, Result, StapleError};
use std::{
    io,
    path::{Path, PathBuf},
};
use tokio::fs;

/// Prefix of every scratch directory name.
pub const SCRATCH_PREFIX: &str = "kodegen-staple-";

/// Temporary working directory owned by a single pipeline run.
///
/// Call [`release`](Self::release) on every path out of the run; if the
/// value is dropped instead, removal still happens but errors are lost.
#[derive(Debug)]
pub struct ScratchDir {
    dir: tempfile::TempDir,
}

impl ScratchDir {
    /// Creates a fresh, empty scratch directory under `parent` (or the system temp dir).
    pub fn acquire(parent: Option<&Path>) -> Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(SCRATCH_PREFIX);
        let dir = match parent {
            Some(parent) => builder
                .tempdir_in(parent)
                .fs_context("creating scratch directory in", parent)?,
            None => builder
                .tempdir()
                .fs_context("creating scratch directory in", std::env::temp_dir())?,
        };
        log::debug!("Acquired scratch directory {}", dir.path().display());
        Ok(Self { dir })
    }

    /// Path of the scratch directory.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Removes the scratch directory and everything in it.
    pub fn release(self) -> Result<()> {
        let path = self.dir.path().to_path_buf();
        self.dir
            .close()
            .fs_context("removing scratch directory", &path)?;
        log::debug!("Released scratch directory {}", path.display());
        Ok(())
    }
}

/// True when `metadata` describes a regular file with any execute bit set.
#[cfg(unix)]
pub fn is_executable(metadata: &std::fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    metadata.is_file() && metadata.permissions().mode() & 0o111 != 0
}

/// True when `metadata` describes a regular file; there are no execute bits to check.
#[cfg(not(unix))]
pub fn is_executable(metadata: &std::fs::Metadata) -> bool {
    metadata.is_file()
}

/// True when `path` exists and is an executable regular file.
pub fn is_executable_file(path: &Path) -> bool {
    std::fs::metadata(path)
        .map(|metadata| is_executable(&metadata))
        .unwrap_or(false)
}

/// Removes the file at `path`, succeeding if it does not exist.
pub async fn remove_file_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()), // Idempotent
        Err(e) => Err(StapleError::Fs {
            action: "removing stale".to_string(),
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// Atomically replaces `original` with the file at `replacement`.
///
/// A plain rename is tried first. When the two paths live on different file
/// systems the replacement is copied next to `original` and renamed from
/// there, so `original` is never observed half-written. In that case the
/// file at `replacement` is left for the caller's scratch cleanup.
pub async fn replace_file(replacement: &Path, original: &Path) -> Result<()> {
    match fs::rename(replacement, original).await {
        Ok(()) => return Ok(()),
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
            log::debug!(
                "{} and {} are on different devices, staging copy next to target",
                replacement.display(),
                original.display()
            );
        }
        Err(e) => {
            return Err(StapleError::Fs {
                action: format!("renaming {} over", replacement.display()),
                path: original.to_path_buf(),
                source: e,
            });
        }
    }

    let replacement = replacement.to_path_buf();
    let original = original.to_path_buf();

    // Offload blocking work to dedicated thread pool
    tokio::task::spawn_blocking(move || stage_and_persist(&replacement, &original))
        .await
        .map_err(|e| {
            StapleError::Io(io::Error::other(format!(
                "Artifact replacement task panicked: {e}"
            )))
        })?
}

fn stage_and_persist(replacement: &Path, original: &Path) -> Result<()> {
    let parent = parent_dir(original);
    let mut staged =
        tempfile::NamedTempFile::new_in(&parent).fs_context("staging replacement in", &parent)?;
    let mut source =
        std::fs::File::open(replacement).fs_context("opening replacement", replacement)?;
    io::copy(&mut source, staged.as_file_mut()).fs_context("copying replacement to", staged.path())?;
    staged
        .as_file()
        .sync_all()
        .fs_context("flushing", staged.path())?;
    staged
        .persist(original)
        .map_err(|e| StapleError::Fs {
            action: "persisting replacement over".to_string(),
            path: original.to_path_buf(),
            source: e.error,
        })?;
    // Nothing may fail past this point; `replacement` goes away with its scratch directory.
    Ok(())
}

/// Parent directory of `path`, `.` for bare file names.
pub fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}
