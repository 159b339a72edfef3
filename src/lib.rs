//! Notarization ticket stapler for macOS artifacts
//!
//! This library attaches a previously issued notarization ticket to:
//! - `.zip` archives holding a single `.app` bundle
//! - `.app` bundle directories
//! - bare command line executables (verified only)
//!
//! It verifies the result and replaces the original archive atomically,
//! and can resolve an archive's bundle identifier without extracting it.
//! It can be used both as a CLI tool and as a library dependency.

pub mod cli;
pub mod error;
pub mod payload;
pub mod process;
pub mod settings;
pub mod stapler;
pub mod utils;

// Re-export commonly used types
pub use error::{Result, StapleError};
pub use payload::{PayloadArtifact, PayloadFormat, find_primary_bundle_id};
pub use settings::StapleSettings;
pub use stapler::{StapleOutcome, StapleRequest, Stapler, SystemToolchain, Toolchain};
