//! Staple, verify and repackage orchestration.
//!
//! This module provides the [`Stapler`] orchestrator that drives one payload
//! through extraction, stapling, verification and, when a ticket was
//! attached, atomic replacement of the original archive.

use super::{
    checksum::calculate_sha256,
    extract::{ExtractedPayload, make_app_zip, unzip_payload},
    toolchain::{SystemToolchain, Toolchain},
};
use crate::{
    error::{ErrorExt, Result},
    payload::{PayloadArtifact, PayloadFormat},
    process::CommandRunner,
    settings::StapleSettings,
    utils::fs::{ScratchDir, replace_file},
};
use std::fmt;
use std::path::{Path, PathBuf};

/// Position of a run in the linear pipeline.
///
/// `Start → Extracted → (Stapled | StapleSkipped) → Verified → (Repackaged → Swapped | Done)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    /// Nothing done yet
    Start,
    /// Archive extracted and classified
    Extracted,
    /// Ticket attached to the bundle
    Stapled,
    /// Payload is a bare executable; nothing to staple
    StapleSkipped,
    /// Signature verified
    Verified,
    /// Stapled bundle recompressed in the scratch directory
    Repackaged,
    /// Original archive replaced
    Swapped,
    /// Finished without touching the original archive
    Done,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Start => "start",
            Self::Extracted => "extracted",
            Self::Stapled => "stapled",
            Self::StapleSkipped => "staple-skipped",
            Self::Verified => "verified",
            Self::Repackaged => "repackaged",
            Self::Swapped => "swapped",
            Self::Done => "done",
        };
        f.write_str(name)
    }
}

/// The single user-facing input: a payload in any supported form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StapleRequest {
    /// `.zip` archive, `.app` bundle directory or extensionless executable
    pub app_path: PathBuf,
}

impl StapleRequest {
    /// Creates a request for `app_path`.
    pub fn new(app_path: impl Into<PathBuf>) -> Self {
        Self {
            app_path: app_path.into(),
        }
    }
}

/// Size and digest of a rebuilt archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactChecksum {
    /// File size in bytes
    pub size: u64,
    /// Hex-encoded SHA-256 digest
    pub sha256: String,
}

/// Result of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StapleOutcome {
    /// Archive the pipeline ran on
    pub artifact: PathBuf,
    /// Final stage: [`PipelineStage::Swapped`] or [`PipelineStage::Done`]
    pub stage: PipelineStage,
    /// Whether a ticket was attached
    pub stapled: bool,
    /// Present only when the archive was replaced
    pub checksum: Option<ArtifactChecksum>,
}

/// Staple/verify/repackage orchestrator.
///
/// Runs are sequential and share no state; each one gets its own
/// [`ScratchDir`], released on every exit path.
///
/// # Examples
///
/// ```no_run
/// use kodegen_bundler_staple::{StapleRequest, StapleSettings, Stapler};
///
/// # async fn example() -> kodegen_bundler_staple::Result<()> {
/// let stapler = Stapler::from_settings(&StapleSettings::default())?;
/// let outcome = stapler.staple_file(&StapleRequest::new("dist/Kodegen.zip")).await?;
/// println!("{} ended at {}", outcome.artifact.display(), outcome.stage);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Stapler<T> {
    toolchain: T,
    scratch_root: Option<PathBuf>,
}

impl Stapler<SystemToolchain> {
    /// Creates a stapler driving the configured system tools, echoing invocations to stdout.
    pub fn from_settings(settings: &StapleSettings) -> Result<Self> {
        let toolchain = SystemToolchain::new(CommandRunner::default(), &settings.tools)?;
        Ok(Self::new(toolchain).with_scratch_root(settings.scratch_dir.clone()))
    }
}

impl<T: Toolchain> Stapler<T> {
    /// Creates a stapler over `toolchain`, using the system temp dir for scratch space.
    pub fn new(toolchain: T) -> Self {
        Self {
            toolchain,
            scratch_root: None,
        }
    }

    /// Sets the parent directory for scratch directories.
    pub fn with_scratch_root(mut self, scratch_root: Option<PathBuf>) -> Self {
        self.scratch_root = scratch_root;
        self
    }

    /// The toolchain in use.
    pub fn toolchain(&self) -> &T {
        &self.toolchain
    }

    /// Staples the payload named by `request`.
    ///
    /// Archives go straight to [`staple_and_verify`](Self::staple_and_verify).
    /// Bundle directories and bare executables are first compressed into a
    /// sibling `.zip`, which is then processed and left in place.
    pub async fn staple_file(&self, request: &StapleRequest) -> Result<StapleOutcome> {
        let artifact = PayloadArtifact::classify(&request.app_path);
        log::debug!("{} classified as {:?}", artifact.path().display(), artifact.format());

        match artifact.format() {
            PayloadFormat::Archive => self.staple_and_verify(artifact.path()).await,
            PayloadFormat::BundleDirectory | PayloadFormat::BareExecutable => {
                let archive = make_app_zip(&self.toolchain, artifact.path()).await?;
                self.staple_and_verify(&archive).await
            }
            PayloadFormat::Unsupported => Err(artifact.unsupported()),
        }
    }

    /// Runs the pipeline on the archive at `archive`.
    ///
    /// `archive` is replaced only after verification succeeds, and only when
    /// a ticket was attached. On any failure it is left byte-identical.
    pub async fn staple_and_verify(&self, archive: &Path) -> Result<StapleOutcome> {
        let scratch = ScratchDir::acquire(self.scratch_root.as_deref())?;
        let result = self.run_pipeline(archive, scratch.path()).await;
        if let Err(e) = scratch.release() {
            log::warn!("Failed to clean up after {}: {}", archive.display(), e);
        }
        result
    }

    async fn run_pipeline(&self, archive: &Path, scratch: &Path) -> Result<StapleOutcome> {
        let mut stage = Progress::new(archive);

        let extraction = unzip_payload(&self.toolchain, archive, scratch).await?;
        stage.advance(PipelineStage::Extracted);

        match extraction.payload() {
            ExtractedPayload::Bundle(bundle) => {
                log::info!("Stapling {}", bundle.display());
                self.toolchain.staple(bundle).await?;
                stage.advance(PipelineStage::Stapled);
            }
            ExtractedPayload::Executable(executable) => {
                log::info!(
                    "{} is a command line tool, skipping staple",
                    executable.display()
                );
                stage.advance(PipelineStage::StapleSkipped);
            }
        }

        log::info!("Verifying {}", extraction.payload().path().display());
        self.toolchain.verify(extraction.payload().path()).await?;
        stage.advance(PipelineStage::Verified);

        let Some(bundle) = extraction.bundle() else {
            stage.advance(PipelineStage::Done);
            return Ok(StapleOutcome {
                artifact: archive.to_path_buf(),
                stage: stage.current,
                stapled: false,
                checksum: None,
            });
        };

        let rebuilt = make_app_zip(&self.toolchain, bundle).await?;
        stage.advance(PipelineStage::Repackaged);

        let size = tokio::fs::metadata(&rebuilt)
            .await
            .fs_context("reading artifact metadata", &rebuilt)?
            .len();
        let sha256 = calculate_sha256(&rebuilt).await?;

        replace_file(&rebuilt, archive).await?;
        stage.advance(PipelineStage::Swapped);
        log::info!("Stapled {} ({} bytes, sha256 {})", archive.display(), size, sha256);

        Ok(StapleOutcome {
            artifact: archive.to_path_buf(),
            stage: stage.current,
            stapled: true,
            checksum: Some(ArtifactChecksum { size, sha256 }),
        })
    }
}

/// Stage tracker that logs every transition.
struct Progress<'a> {
    archive: &'a Path,
    current: PipelineStage,
}

impl<'a> Progress<'a> {
    fn new(archive: &'a Path) -> Self {
        Self {
            archive,
            current: PipelineStage::Start,
        }
    }

    fn advance(&mut self, next: PipelineStage) {
        log::debug!("{}: {} -> {}", self.archive.display(), self.current, next);
        self.current = next;
    }
}
