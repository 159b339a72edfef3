//! Command line interface for the stapler.

mod args;

pub use args::{Args, Command};

use crate::{
    error::StapleError,
    payload::find_primary_bundle_id,
    settings::StapleSettings,
    stapler::{StapleRequest, Stapler},
};
use anyhow::Context;
use std::path::Path;

/// Main CLI entry point
///
/// Pipeline failures are reported here and mapped to exit code 1; only
/// settings problems escape as errors.
pub async fn run() -> anyhow::Result<i32> {
    let args = Args::parse_args();
    let settings = StapleSettings::load(args.config.as_deref()).context("loading settings")?;

    let code = match args.command {
        Command::Staple { path } => staple(&settings, &path).await,
        Command::BundleId { payload } => bundle_id(&payload),
    };
    Ok(code)
}

async fn staple(settings: &StapleSettings, path: &Path) -> i32 {
    let result = match Stapler::from_settings(settings) {
        Ok(stapler) => stapler.staple_file(&StapleRequest::new(path)).await,
        Err(e) => Err(e),
    };
    match result {
        Ok(outcome) => {
            log::info!(
                "{} finished ({}, stapled: {})",
                outcome.artifact.display(),
                outcome.stage,
                outcome.stapled
            );
            0
        }
        Err(e) => {
            report(&format!("error stapling {}", path.display()), &e);
            1
        }
    }
}

fn bundle_id(payload: &Path) -> i32 {
    match find_primary_bundle_id(payload) {
        Ok(id) => {
            println!("{id}");
            0
        }
        Err(e) => {
            report(&format!("error reading {}", payload.display()), &e);
            1
        }
    }
}

/// Prints `err` to stderr with its recovery hint, if any.
pub fn report(prefix: &str, err: &StapleError) {
    eprintln!("{prefix}: {err}");
    if let Some(hint) = err.recovery_suggestion() {
        eprintln!("hint: {hint}");
    }
}
