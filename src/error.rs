//! Error types for staple operations.
//!
//! Every failure in the pipeline is propagated to the caller immediately;
//! nothing here is retried in-process.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type alias for staple operations
pub type Result<T> = std::result::Result<T, StapleError>;

/// Main error type for all staple operations
#[derive(Error, Debug)]
pub enum StapleError {
    /// Payload extension is not one we know how to handle
    #[error("can't handle payload {path} with extension {extension:?}")]
    UnsupportedFormat {
        /// Offending payload
        path: PathBuf,
        /// Extension as found on the path (empty when absent)
        extension: String,
    },

    /// Archive could not be opened, enumerated or streamed
    #[error("failed to read archive {path}: {source}")]
    ArchiveRead {
        /// Archive being read
        path: PathBuf,
        /// Underlying ZIP error
        #[source]
        source: zip::result::ZipError,
    },

    /// `open_entry` was called before the first `next_entry` or after the last
    #[error("no current archive entry to open")]
    NoCurrentEntry,

    /// Info.plist could not be parsed
    #[error("invalid property list: {0}")]
    Plist(#[from] plist::Error),

    /// Info.plist parsed but carries no CFBundleIdentifier
    #[error("{descriptor} has no CFBundleIdentifier")]
    MissingBundleIdentifier {
        /// Archive entry name of the descriptor
        descriptor: String,
    },

    /// No bundle descriptor and the single-file heuristic does not apply
    #[error("could not find Info.plist in {path}")]
    DescriptorNotFound {
        /// Archive that was scanned
        path: PathBuf,
    },

    /// Extraction produced neither a single bundle nor a single executable
    #[error("couldn't find any .app directories at {dir} (top-level entries: {entries:?})")]
    AmbiguousPayload {
        /// Directory the archive was extracted into
        dir: PathBuf,
        /// Names of the top-level entries that were found
        entries: Vec<String>,
    },

    /// External tool is not installed or not on PATH
    #[error("{program} not found in PATH: {source}")]
    ToolNotFound {
        /// Program that was looked up
        program: String,
        /// Lookup failure
        #[source]
        source: which::Error,
    },

    /// External tool could not be started
    #[error("failed to run {command}: {source}")]
    CommandSpawn {
        /// Masked command line
        command: String,
        /// Spawn failure
        #[source]
        source: std::io::Error,
    },

    /// External tool exited unsuccessfully
    #[error("{command} failed with exit code {code:?}")]
    CommandFailed {
        /// Masked command line
        command: String,
        /// Exit code, `None` if terminated by a signal
        code: Option<i32>,
    },

    /// A configured tool command has no program
    #[error("tools.{key} must name a program")]
    EmptyToolCommand {
        /// Settings key under `[tools]`
        key: &'static str,
    },

    /// Signature verification rejected the payload
    #[error("signature verification failed for {path}\n{output}")]
    VerificationFailed {
        /// Bundle or executable that was verified
        path: PathBuf,
        /// Captured verifier output
        output: String,
    },

    /// Filesystem operation failed
    #[error("{action} {path}: {source}")]
    Fs {
        /// What was being done
        action: String,
        /// Path it was done to
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Settings file could not be parsed
    #[error("invalid settings in {path}: {source}")]
    Config {
        /// Settings file
        path: PathBuf,
        /// TOML parse error
        #[source]
        source: toml::de::Error,
    },
}

impl StapleError {
    /// Actionable hint for errors caused by the host environment rather than the payload
    pub fn recovery_suggestion(&self) -> Option<&'static str> {
        match self {
            Self::ToolNotFound { .. } | Self::CommandSpawn { .. } => {
                Some("Install the Xcode command line tools (xcode-select --install) or point [tools] at the right programs")
            }
            Self::Config { .. } | Self::EmptyToolCommand { .. } => {
                Some("Fix the settings file or unset KODEGEN_STAPLE_CONFIG")
            }
            Self::AmbiguousPayload { .. } => {
                Some("The archive must contain exactly one .app directory or one executable at its top level")
            }
            _ => None,
        }
    }
}

/// Attaches filesystem context to IO results.
pub trait ErrorExt<T> {
    /// Wraps the error as [`StapleError::Fs`] describing `action` on `path`.
    fn fs_context(self, action: &str, path: impl AsRef<Path>) -> Result<T>;
}

impl<T> ErrorExt<T> for std::io::Result<T> {
    fn fs_context(self, action: &str, path: impl AsRef<Path>) -> Result<T> {
        self.map_err(|source| StapleError::Fs {
            action: action.to_string(),
            path: path.as_ref().to_path_buf(),
            source,
        })
    }
}
