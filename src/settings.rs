//! Stapler configuration.
//!
//! Settings come from an optional TOML file; every field has a default so an
//! empty (or absent) file yields the stock macOS toolchain.
//!
//! ```toml
//! scratch_dir = "/var/tmp"
//!
//! [tools]
//! unzip = "unzip"
//! zip = "zip"
//! stapler = ["xcrun", "stapler", "staple"]
//! verifier = ["codesign", "--verify", "--deep", "--strict", "--verbose=2"]
//! ```

use crate::error::{ErrorExt, Result, StapleError};
use std::path::{Path, PathBuf};

/// Top-level stapler settings.
#[derive(Clone, Debug, Default, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StapleSettings {
    /// Parent directory for per-run scratch directories.
    ///
    /// Default: None (system temporary directory)
    #[serde(default)]
    pub scratch_dir: Option<PathBuf>,

    /// External programs used by the pipeline.
    #[serde(default)]
    pub tools: ToolSettings,
}

/// External tool configuration.
#[derive(Clone, Debug, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToolSettings {
    /// Decompression program, invoked as `<unzip> <archive>`.
    pub unzip: String,

    /// Compression program, invoked as `<zip> -9 -X -y -r <archive> <dir>`.
    pub zip: String,

    /// Stapling command prefix; the bundle path is appended.
    pub stapler: Vec<String>,

    /// Verification command prefix; the bundle or executable path is appended.
    pub verifier: Vec<String>,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            unzip: "unzip".to_string(),
            zip: "zip".to_string(),
            stapler: ["xcrun", "stapler", "staple"].map(String::from).to_vec(),
            verifier: ["codesign", "--verify", "--deep", "--strict", "--verbose=2"]
                .map(String::from)
                .to_vec(),
        }
    }
}

impl StapleSettings {
    /// Parses settings from TOML text; `origin` is only used in error messages.
    pub fn from_toml(text: &str, origin: &Path) -> Result<Self> {
        toml::from_str(text).map_err(|source| StapleError::Config {
            path: origin.to_path_buf(),
            source,
        })
    }

    /// Loads settings from `path`, or returns defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            log::debug!("No settings file given, using defaults");
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path).fs_context("reading settings file", path)?;
        let settings = Self::from_toml(&text, path)?;
        log::debug!("Loaded settings from {}: {:?}", path.display(), settings);
        Ok(settings)
    }
}
