//! External tool contracts used by the pipeline.

use crate::error::{Result, StapleError};
use crate::process::{CommandRunner, ToolCommand};
use crate::settings::ToolSettings;
use std::ffi::OsStr;
use std::path::Path;

/// The four external operations the pipeline depends on.
///
/// [`SystemToolchain`] drives the real macOS tools; tests substitute an
/// in-process implementation.
#[allow(async_fn_in_trait)]
pub trait Toolchain {
    /// Decompresses `archive` (an absolute path) into `output_dir`.
    async fn decompress(&self, archive: &Path, output_dir: &Path) -> Result<()>;

    /// Compresses `entry_name` into `archive_name`, both relative to `working_dir`.
    ///
    /// Compression is maximal, recursive and preserves symlinks.
    async fn compress(
        &self,
        working_dir: &Path,
        archive_name: &OsStr,
        entry_name: &OsStr,
    ) -> Result<()>;

    /// Attaches the notarization ticket to the bundle at `bundle`.
    async fn staple(&self, bundle: &Path) -> Result<()>;

    /// Verifies the code signature of `path`.
    ///
    /// A rejection is [`StapleError::VerificationFailed`] carrying the tool output.
    async fn verify(&self, path: &Path) -> Result<()>;
}

/// Toolchain backed by external programs, configured through [`ToolSettings`].
#[derive(Debug, Clone)]
pub struct SystemToolchain {
    runner: CommandRunner,
    unzip: ToolCommand,
    zip: ToolCommand,
    stapler: ToolCommand,
    verifier: ToolCommand,
}

impl SystemToolchain {
    /// Builds the toolchain, rejecting tool entries without a program.
    pub fn new(runner: CommandRunner, tools: &ToolSettings) -> Result<Self> {
        Ok(Self {
            runner,
            unzip: program(&tools.unzip, "unzip")?,
            zip: program(&tools.zip, "zip")?,
            stapler: ToolCommand::from_argv(&tools.stapler)
                .ok_or(StapleError::EmptyToolCommand { key: "stapler" })?,
            verifier: ToolCommand::from_argv(&tools.verifier)
                .ok_or(StapleError::EmptyToolCommand { key: "verifier" })?,
        })
    }
}

fn program(name: &str, key: &'static str) -> Result<ToolCommand> {
    if name.trim().is_empty() {
        return Err(StapleError::EmptyToolCommand { key });
    }
    Ok(ToolCommand::new(name))
}

impl Toolchain for SystemToolchain {
    async fn decompress(&self, archive: &Path, output_dir: &Path) -> Result<()> {
        let command = self.unzip.clone().arg(archive).current_dir(output_dir);
        self.runner.run(&command).await
    }

    async fn compress(
        &self,
        working_dir: &Path,
        archive_name: &OsStr,
        entry_name: &OsStr,
    ) -> Result<()> {
        let command = self
            .zip
            .clone()
            .args(["-9", "-X", "-y", "-r"])
            .arg(archive_name)
            .arg(entry_name)
            .current_dir(working_dir);
        self.runner.run(&command).await
    }

    async fn staple(&self, bundle: &Path) -> Result<()> {
        let command = self.stapler.clone().arg(bundle);
        self.runner.run(&command).await
    }

    async fn verify(&self, path: &Path) -> Result<()> {
        let command = self.verifier.clone().arg(path);
        let mut output = Vec::new();
        match self.runner.run_captured(&command, &mut output).await {
            Ok(()) => Ok(()),
            Err(StapleError::CommandFailed { .. }) => Err(StapleError::VerificationFailed {
                path: path.to_path_buf(),
                output: String::from_utf8_lossy(&output).into_owned(),
            }),
            Err(e) => Err(e),
        }
    }
}
