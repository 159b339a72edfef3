//! Command line argument parsing.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Notarization ticket stapler for macOS artifacts
#[derive(Parser, Debug)]
#[command(
    name = "kodegen_staple",
    version,
    about = "Staples notarization tickets to macOS artifacts",
    long_about = "Attaches a notarization ticket to a macOS artifact, verifies the signature and repackages it.

The artifact is extracted into a scratch directory and only replaced after verification succeeds.

Usage:
  kodegen_staple staple dist/Kodegen.zip
  kodegen_staple staple dist/Kodegen.app
  kodegen_staple bundle-id dist/Kodegen.zip

Exit code 0 = the artifact at PATH is stapled and verified."
)]
pub struct Args {
    /// Settings file (TOML); stock macOS tools are used when absent
    #[arg(long, global = true, env = "KODEGEN_STAPLE_CONFIG", value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands
#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Staple, verify and repackage a .zip archive, .app bundle or executable
    Staple {
        /// Artifact to staple
        #[arg(value_name = "PATH")]
        path: PathBuf,
    },

    /// Print the bundle identifier of the application inside a .zip archive
    BundleId {
        /// Archive to inspect
        #[arg(value_name = "PAYLOAD")]
        payload: PathBuf,
    },
}

impl Args {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
