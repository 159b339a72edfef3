//! Observers notified before each external tool invocation.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Receives the masked command line of every tool invocation before it runs.
pub trait CommandObserver: Send + Sync {
    /// Called with the working directory (if one was set) and the masked command line.
    fn command_started(&self, dir: Option<&Path>, command_line: &str);
}

/// Echoes invocations to stdout as `(dir) @command` or `@command`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleObserver;

impl CommandObserver for ConsoleObserver {
    fn command_started(&self, dir: Option<&Path>, command_line: &str) {
        match dir {
            Some(dir) => println!("({}) @{}", dir.display(), command_line),
            None => println!("@{}", command_line),
        }
    }
}

/// Keeps every invocation in memory instead of printing it.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    commands: Mutex<Vec<(Option<PathBuf>, String)>>,
}

impl RecordingObserver {
    /// Invocations seen so far, oldest first.
    pub fn commands(&self) -> Vec<(Option<PathBuf>, String)> {
        self.commands
            .lock()
            .map(|commands| commands.clone())
            .unwrap_or_default()
    }
}

impl CommandObserver for RecordingObserver {
    fn command_started(&self, dir: Option<&Path>, command_line: &str) {
        log::debug!("recorded invocation: {}", command_line);
        if let Ok(mut commands) = self.commands.lock() {
            commands.push((dir.map(Path::to_path_buf), command_line.to_string()));
        }
    }
}
