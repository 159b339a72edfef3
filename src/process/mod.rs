//! External tool execution.
//!
//! Every tool the stapler drives (unzip, zip, stapler, codesign) runs through
//! [`CommandRunner`]. Before spawning, the runner hands the masked command
//! line to a [`CommandObserver`]; the child inherits stdin and its output is
//! mirrored to our own stdout/stderr, optionally also into a capture buffer.

mod observer;

pub use observer::{CommandObserver, ConsoleObserver, RecordingObserver};

use crate::error::{Result, StapleError};
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::process::Command;

/// Rendering used in place of a sensitive argument.
pub const MASKED_ARGUMENT: &str = "XxXxXxXxXxXxXxXxX";

/// A fully specified external tool invocation.
#[derive(Debug, Clone)]
pub struct ToolCommand {
    argv: Vec<OsString>,
    current_dir: Option<PathBuf>,
    sensitive_flags: Vec<String>,
}

impl ToolCommand {
    /// Creates a command for `program` with no arguments.
    pub fn new(program: impl AsRef<OsStr>) -> Self {
        Self {
            argv: vec![program.as_ref().to_os_string()],
            current_dir: None,
            sensitive_flags: Vec::new(),
        }
    }

    /// Creates a command from a configured argv prefix such as `["xcrun", "stapler", "staple"]`.
    ///
    /// Returns `None` for an empty argv.
    pub fn from_argv<S: AsRef<OsStr>>(argv: &[S]) -> Option<Self> {
        let (program, rest) = argv.split_first()?;
        Some(Self::new(program).args(rest))
    }

    /// Appends one argument.
    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.argv.push(arg.as_ref().to_os_string());
        self
    }

    /// Appends several arguments.
    pub fn args<S: AsRef<OsStr>>(mut self, args: impl IntoIterator<Item = S>) -> Self {
        self.argv
            .extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    /// Runs the command with `dir` as its working directory.
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    /// Marks the argument that follows `flag` as sensitive so it is masked in diagnostics.
    pub fn sensitive_flag(mut self, flag: impl Into<String>) -> Self {
        self.sensitive_flags.push(flag.into());
        self
    }

    /// Program name (first argv element).
    pub fn program(&self) -> &OsStr {
        &self.argv[0]
    }

    /// Working directory, if one was set.
    pub fn dir(&self) -> Option<&Path> {
        self.current_dir.as_deref()
    }

    /// Space-joined command line with sensitive arguments masked.
    pub fn debug_string(&self) -> String {
        let flags: Vec<&str> = self.sensitive_flags.iter().map(String::as_str).collect();
        command_debug_string(&self.argv, &flags)
    }
}

/// Renders `args` space-joined, masking each argument that directly follows
/// one of `sensitive_flags`.
pub fn command_debug_string<S: AsRef<OsStr>>(args: &[S], sensitive_flags: &[&str]) -> String {
    let mut values = Vec::with_capacity(args.len());
    let mut expect_secret = false;
    for arg in args {
        let arg = arg.as_ref().to_string_lossy();
        if expect_secret {
            values.push(MASKED_ARGUMENT.to_string());
            expect_secret = false;
            continue;
        }
        expect_secret = sensitive_flags.contains(&arg.as_ref());
        values.push(arg.into_owned());
    }
    values.join(" ")
}

/// Runs external tools, reporting each invocation to an observer.
#[derive(Clone)]
pub struct CommandRunner {
    observer: Arc<dyn CommandObserver>,
}

impl std::fmt::Debug for CommandRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandRunner")
            .field("observer", &"<dyn CommandObserver>")
            .finish()
    }
}

impl Default for CommandRunner {
    fn default() -> Self {
        Self::new(Arc::new(ConsoleObserver))
    }
}

impl CommandRunner {
    /// Creates a runner that reports invocations to `observer`.
    pub fn new(observer: Arc<dyn CommandObserver>) -> Self {
        Self { observer }
    }

    /// Runs `command` to completion, failing on a nonzero exit.
    pub async fn run(&self, command: &ToolCommand) -> Result<()> {
        let status = self.status(command, None).await?;
        check_status(command, status)
    }

    /// Runs `command`, mirroring its output into `capture` as well as our own streams.
    ///
    /// Fails on a nonzero exit; `capture` holds whatever the tool wrote either way.
    pub async fn run_captured(&self, command: &ToolCommand, capture: &mut Vec<u8>) -> Result<()> {
        let status = self.status(command, Some(capture)).await?;
        check_status(command, status)
    }

    /// Runs `command` and returns its exit status without judging it.
    ///
    /// Only failures to locate or start the program are errors here.
    pub async fn status(
        &self,
        command: &ToolCommand,
        capture: Option<&mut Vec<u8>>,
    ) -> Result<ExitStatus> {
        let command_line = command.debug_string();
        self.observer.command_started(command.dir(), &command_line);

        let program = which::which(command.program()).map_err(|source| {
            StapleError::ToolNotFound {
                program: command.program().to_string_lossy().into_owned(),
                source,
            }
        })?;
        log::debug!("Resolved {} to {}", command.program().to_string_lossy(), program.display());

        let mut cmd = Command::new(&program);
        cmd.args(&command.argv[1..]).stdin(Stdio::inherit());
        if let Some(dir) = command.dir() {
            cmd.current_dir(dir);
        }

        let spawn_error = |source: std::io::Error| StapleError::CommandSpawn {
            command: command_line.clone(),
            source,
        };

        let Some(capture) = capture else {
            return cmd
                .stdout(Stdio::inherit())
                .stderr(Stdio::inherit())
                .status()
                .await
                .map_err(spawn_error);
        };

        let mut child = cmd
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(spawn_error)?;

        // Both streams land in one buffer in arrival order.
        let shared = Mutex::new(std::mem::take(capture));
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let (out_result, err_result) = tokio::join!(
            tee(stdout, tokio::io::stdout(), &shared),
            tee(stderr, tokio::io::stderr(), &shared),
        );
        *capture = shared.into_inner().unwrap_or_else(|poisoned| poisoned.into_inner());

        let status = child.wait().await.map_err(spawn_error)?;
        out_result.map_err(spawn_error)?;
        err_result.map_err(spawn_error)?;
        Ok(status)
    }
}

fn check_status(command: &ToolCommand, status: ExitStatus) -> Result<()> {
    if status.success() {
        Ok(())
    } else {
        Err(StapleError::CommandFailed {
            command: command.debug_string(),
            code: status.code(),
        })
    }
}

/// Copies `source` into `sink` chunk by chunk, appending every chunk to `capture`.
async fn tee<R, W>(source: Option<R>, mut sink: W, capture: &Mutex<Vec<u8>>) -> std::io::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let Some(mut source) = source else {
        return Ok(());
    };
    let mut buffer = vec![0u8; 8192];
    loop {
        let n = source.read(&mut buffer).await?;
        if n == 0 {
            break;
        }
        // Mirror failures are ignored; the capture must stay complete.
        let _ = sink.write_all(&buffer[..n]).await;
        if let Ok(mut captured) = capture.lock() {
            captured.extend_from_slice(&buffer[..n]);
        }
    }
    let _ = sink.flush().await;
    Ok(())
}
