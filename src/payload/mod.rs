//! Payload classification and read-only archive introspection.
//!
//! A payload is whatever the user hands to `staple`: a `.zip` archive, an
//! `.app` bundle directory, or an extensionless path. Archives are read
//! through the [`PayloadReader`] trait; the concrete reader is chosen by
//! extension in [`open_payload_reader`], so supporting another container
//! format means adding a variant there, not touching the resolver.

mod identity;
mod zip_reader;

pub use identity::{
    BUNDLE_EXTENSION, PLACEHOLDER_BUNDLE_PREFIX, find_primary_bundle_id, is_bundle_descriptor,
    resolve_bundle_id, single_file_placeholder,
};
pub use zip_reader::ZipPayloadReader;

use crate::error::{Result, StapleError};
use crate::utils::fs::is_executable_file;
use std::io::Read;
use std::path::{Path, PathBuf};

/// Archive extension accepted by the pipeline.
pub const ARCHIVE_EXTENSION: &str = "zip";

/// Sequential, forward-only cursor over the entries of an archive.
///
/// Open a fresh reader to start over. Dropping the reader closes the
/// underlying file.
pub trait PayloadReader {
    /// Advances to the next entry and returns its name, or `None` once the
    /// archive is exhausted.
    fn next_entry(&mut self) -> Result<Option<String>>;

    /// Streams the entry most recently returned by [`next_entry`](Self::next_entry).
    ///
    /// Fails with [`StapleError::NoCurrentEntry`] before the first advance or
    /// after the end of the archive.
    fn open_entry(&mut self) -> Result<Box<dyn Read + '_>>;
}

/// Payload form, inferred from the path's extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadFormat {
    /// `.zip` archive
    Archive,
    /// `.app` bundle directory, or an extensionless path that is not an executable file
    BundleDirectory,
    /// Extensionless regular file marked executable
    BareExecutable,
    /// Anything else
    Unsupported,
}

/// A payload path together with its classified format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadArtifact {
    path: PathBuf,
    format: PayloadFormat,
}

impl PayloadArtifact {
    /// Classifies `path`.
    pub fn classify(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let format = match payload_extension(&path).as_str() {
            ARCHIVE_EXTENSION => PayloadFormat::Archive,
            BUNDLE_EXTENSION => PayloadFormat::BundleDirectory,
            "" if is_executable_file(&path) => PayloadFormat::BareExecutable,
            "" => PayloadFormat::BundleDirectory,
            _ => PayloadFormat::Unsupported,
        };
        Self { path, format }
    }

    /// The payload path as given.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The classified format.
    pub fn format(&self) -> PayloadFormat {
        self.format
    }

    /// Error describing this payload as unsupported.
    pub fn unsupported(&self) -> StapleError {
        StapleError::UnsupportedFormat {
            path: self.path.clone(),
            extension: raw_extension(&self.path),
        }
    }
}

/// Opens the archive reader matching `path`'s extension.
pub fn open_payload_reader(path: &Path) -> Result<Box<dyn PayloadReader>> {
    match payload_extension(path).as_str() {
        ARCHIVE_EXTENSION => Ok(Box::new(ZipPayloadReader::open(path)?)),
        _ => Err(StapleError::UnsupportedFormat {
            path: path.to_path_buf(),
            extension: raw_extension(path),
        }),
    }
}

/// Lowercased extension without the dot; empty when there is none.
pub(crate) fn payload_extension(path: &Path) -> String {
    raw_extension(path).to_lowercase()
}

fn raw_extension(path: &Path) -> String {
    path.extension()
        .map(|ext| ext.to_string_lossy().into_owned())
        .unwrap_or_default()
}
