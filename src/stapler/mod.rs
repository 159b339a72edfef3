//! Notarization ticket stapling pipeline.
//!
//! [`Stapler`] sequences extraction, stapling, verification and repackaging
//! through a [`Toolchain`].

pub mod checksum;
pub mod extract;
pub mod orchestrator;
pub mod toolchain;

pub use extract::{
    ChildEntry, ExtractedPayload, Extraction, classify_children, make_app_zip, unzip_payload,
};
pub use orchestrator::{ArtifactChecksum, PipelineStage, StapleOutcome, StapleRequest, Stapler};
pub use toolchain::{SystemToolchain, Toolchain};
