//! Kodegen Staple - notarization ticket stapler for macOS artifacts.
//!
//! This binary staples, verifies and repackages a `.zip`, `.app` or bare
//! executable, replacing the original only after verification succeeds.

use kodegen_bundler_staple::{StapleError, cli};
use std::process;

#[tokio::main]
async fn main() {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // Run CLI and get exit code
    let exit_code = match cli::run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            if let Some(hint) = e
                .downcast_ref::<StapleError>()
                .and_then(StapleError::recovery_suggestion)
            {
                eprintln!("hint: {hint}");
            }
            1
        }
    };

    process::exit(exit_code);
}
