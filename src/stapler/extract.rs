//! Materializing an archive into a working directory, and the reverse.
//!
//! After decompression the top level of the output directory must hold
//! exactly one `.app` directory or exactly one extensionless executable;
//! everything else is rejected as ambiguous.

use super::toolchain::Toolchain;
use crate::error::{ErrorExt, Result, StapleError};
use crate::payload::{ARCHIVE_EXTENSION, BUNDLE_EXTENSION, payload_extension};
use crate::utils::fs::{is_executable, parent_dir, remove_file_if_exists};
use path_absolutize::Absolutize;
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};

/// What an archive turned out to contain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractedPayload {
    /// A single application bundle directory
    Bundle(PathBuf),
    /// A single command line executable
    Executable(PathBuf),
}

impl ExtractedPayload {
    /// Path of the bundle or executable.
    pub fn path(&self) -> &Path {
        match self {
            Self::Bundle(path) | Self::Executable(path) => path,
        }
    }
}

/// Result of [`unzip_payload`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    root: PathBuf,
    payload: ExtractedPayload,
}

impl Extraction {
    /// Directory the archive was extracted into.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The classified payload.
    pub fn payload(&self) -> &ExtractedPayload {
        &self.payload
    }

    /// The bundle directory, when the payload is one.
    pub fn bundle(&self) -> Option<&Path> {
        match &self.payload {
            ExtractedPayload::Bundle(path) => Some(path),
            ExtractedPayload::Executable(_) => None,
        }
    }

    /// Only bundles can carry a notarization ticket.
    pub fn staple_eligible(&self) -> bool {
        self.bundle().is_some()
    }
}

/// A top-level entry of an extraction directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildEntry {
    /// File name
    pub name: String,
    /// Resolves to a directory
    pub is_dir: bool,
    /// Resolves to a regular file with an execute bit
    pub is_executable: bool,
}

impl ChildEntry {
    fn has_extension(&self, extension: &str) -> bool {
        payload_extension(Path::new(&self.name)) == extension
    }

    fn is_bundle(&self) -> bool {
        self.is_dir && self.has_extension(BUNDLE_EXTENSION)
    }

    fn is_bare_executable(&self) -> bool {
        self.is_executable && self.has_extension("")
    }
}

/// Classifies the top-level entries of `dir`.
pub fn classify_children(dir: &Path, children: &[ChildEntry]) -> Result<ExtractedPayload> {
    match children {
        [only] if only.is_bundle() => Ok(ExtractedPayload::Bundle(dir.join(&only.name))),
        [only] if only.is_bare_executable() => {
            Ok(ExtractedPayload::Executable(dir.join(&only.name)))
        }
        _ => Err(StapleError::AmbiguousPayload {
            dir: dir.to_path_buf(),
            entries: children.iter().map(|child| child.name.clone()).collect(),
        }),
    }
}

/// Lists the immediate children of `dir`, sorted by name.
///
/// Symlinks are followed when deciding directory and executable status.
pub async fn list_children(dir: &Path) -> Result<Vec<ChildEntry>> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .fs_context("listing", dir)?;
    let mut children = Vec::new();
    while let Some(entry) = entries.next_entry().await.fs_context("listing", dir)? {
        let path = entry.path();
        let metadata = tokio::fs::metadata(&path)
            .await
            .fs_context("inspecting", &path)?;
        children.push(ChildEntry {
            name: entry.file_name().to_string_lossy().into_owned(),
            is_dir: metadata.is_dir(),
            is_executable: is_executable(&metadata),
        });
    }
    children.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(children)
}

/// Decompresses `archive` into `output_dir` and classifies what came out.
pub async fn unzip_payload<T: Toolchain>(
    toolchain: &T,
    archive: &Path,
    output_dir: &Path,
) -> Result<Extraction> {
    // The tool runs inside output_dir, so a relative archive path would dangle.
    let archive = archive.absolutize().fs_context("resolving", archive)?;
    log::info!("Extracting {} into {}", archive.display(), output_dir.display());
    toolchain.decompress(&archive, output_dir).await?;

    let children = list_children(output_dir).await?;
    let payload = classify_children(output_dir, &children)?;
    log::debug!("Extracted payload: {:?}", payload);
    Ok(Extraction {
        root: output_dir.to_path_buf(),
        payload,
    })
}

/// Compresses `bundle_dir` into a sibling `<stem>.zip` and returns its path.
///
/// The archive is built under a hidden staging name and renamed over
/// `<stem>.zip` only once compression succeeded, so an existing archive of
/// that name survives a failed run.
pub async fn make_app_zip<T: Toolchain>(toolchain: &T, bundle_dir: &Path) -> Result<PathBuf> {
    let (Some(entry_name), Some(stem)) = (bundle_dir.file_name(), bundle_dir.file_stem()) else {
        return Err(StapleError::Fs {
            action: "compressing".to_string(),
            path: bundle_dir.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "path has no file name"),
        });
    };
    let mut archive_name = OsString::from(stem);
    archive_name.push(".");
    archive_name.push(ARCHIVE_EXTENSION);
    let staging_name = staging_archive_name(stem);

    let working_dir = parent_dir(bundle_dir);
    let archive_path = working_dir.join(&archive_name);
    let staging_path = working_dir.join(&staging_name);

    // `zip` appends to an existing archive, so never start from a leftover one
    remove_file_if_exists(&staging_path).await?;

    log::info!(
        "compressing {} to {}",
        bundle_dir.display(),
        archive_path.display()
    );
    if let Err(e) = toolchain
        .compress(&working_dir, &staging_name, entry_name)
        .await
    {
        if let Err(cleanup) = remove_file_if_exists(&staging_path).await {
            log::warn!("{cleanup}");
        }
        return Err(e);
    }

    tokio::fs::rename(&staging_path, &archive_path)
        .await
        .fs_context("renaming compressed bundle to", &archive_path)?;
    Ok(archive_path)
}

/// `.<stem>.staging.zip`, the name an archive is built under before it is renamed into place.
pub fn staging_archive_name(stem: &OsStr) -> OsString {
    let mut name = OsString::from(".");
    name.push(stem);
    name.push(".staging.");
    name.push(ARCHIVE_EXTENSION);
    name
}
