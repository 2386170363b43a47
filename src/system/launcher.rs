// EN: src/system/launcher.rs

use crate::constants::INTERRUPTED_EXIT_CODE;
use std::collections::HashMap;
use std::fmt;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use thiserror::Error;

/// The reasons an interpreter could not be brought up.
///
/// These are the only failures a caller ever sees; everything that goes wrong
/// after a successful launch degrades into "stream ended" or
/// [`ExitOutcome::Unknown`].
#[derive(Error, Debug)]
pub enum ShellError {
    #[error("Interpreter '{program}' could not be executed: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("Interpreter '{0}' was started without a piped {1} stream.")]
    MissingStream(String, &'static str),
    #[error("Could not attach a reader to the interpreter's {stream}: {source}")]
    AttachStreams {
        stream: &'static str,
        #[source]
        source: io::Error,
    },
}

/// How a launched interpreter ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitOutcome {
    /// The process exited normally with this code.
    Exited(i32),
    /// The process was killed by this signal number (Unix only).
    Signaled(i32),
    /// The exit status could not be determined, usually because the wait was interrupted.
    Unknown,
}

impl ExitOutcome {
    /// Returns the numeric exit code.
    ///
    /// Signal deaths map to `128 + signal` like POSIX shells report them, and
    /// [`ExitOutcome::Unknown`] maps to [`INTERRUPTED_EXIT_CODE`].
    pub fn code(&self) -> i32 {
        match *self {
            Self::Exited(code) => code,
            Self::Signaled(signal) => signal.saturating_add(128),
            Self::Unknown => INTERRUPTED_EXIT_CODE,
        }
    }

    /// `false` when the outcome says nothing about success or failure.
    pub fn is_conclusive(&self) -> bool {
        !matches!(self, Self::Unknown)
    }

    /// `true` only for a normal exit with code 0.
    pub fn success(&self) -> bool {
        matches!(self, Self::Exited(0))
    }
}

impl From<ExitStatus> for ExitOutcome {
    fn from(status: ExitStatus) -> Self {
        if let Some(code) = status.code() {
            return Self::Exited(code);
        }
        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            if let Some(signal) = status.signal() {
                return Self::Signaled(signal);
            }
        }
        Self::Unknown
    }
}

impl fmt::Display for ExitOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exited(code) => write!(f, "exited with code {code}"),
            Self::Signaled(signal) => write!(f, "killed by signal {signal}"),
            Self::Unknown => write!(f, "exit status unknown"),
        }
    }
}

/// A waitable handle on a launched process.
pub trait ChildHandle: Send {
    /// The OS process id, if there is one.
    fn id(&self) -> Option<u32>;

    /// Returns the outcome if the process has exited, without blocking.
    fn try_wait(&mut self) -> io::Result<Option<ExitOutcome>>;

    /// Forcibly terminates the process.
    fn kill(&mut self) -> io::Result<()>;

    /// Blocks until the process has exited.
    fn wait(&mut self) -> io::Result<ExitOutcome>;
}

impl ChildHandle for Child {
    fn id(&self) -> Option<u32> {
        Some(Child::id(self))
    }

    fn try_wait(&mut self) -> io::Result<Option<ExitOutcome>> {
        Ok(Child::try_wait(self)?.map(ExitOutcome::from))
    }

    fn kill(&mut self) -> io::Result<()> {
        Child::kill(self)
    }

    fn wait(&mut self) -> io::Result<ExitOutcome> {
        Ok(Child::wait(self)?.into())
    }
}

/// The three channels and the handle of a freshly launched interpreter.
pub struct LaunchedProcess {
    /// The interpreter's standard input.
    pub stdin: Box<dyn Write + Send>,
    /// The interpreter's standard output.
    pub stdout: Box<dyn Read + Send>,
    /// The interpreter's standard error.
    pub stderr: Box<dyn Read + Send>,
    /// Handle used to wait for (or kill) the interpreter.
    pub child: Box<dyn ChildHandle>,
}

impl fmt::Debug for LaunchedProcess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LaunchedProcess")
            .field("pid", &self.child.id())
            .finish_non_exhaustive()
    }
}

/// Starts an interpreter given only the path to its executable.
///
/// A launch either yields all three channels plus a waitable handle, or fails
/// as a whole; there is no partial success.
pub trait Launcher: Send + Sync {
    /// Starts `program` with no arguments.
    ///
    /// # Errors
    /// Returns a [`ShellError`] if the OS refuses to start the program.
    fn launch(&self, program: &Path) -> Result<LaunchedProcess, ShellError>;
}

/// Launches real processes through `std::process::Command`.
#[derive(Debug, Clone, Default)]
pub struct SystemLauncher {
    cwd: Option<PathBuf>,
    env_vars: HashMap<String, String>,
}

impl SystemLauncher {
    /// Creates a launcher that inherits the current directory and environment.
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs the interpreter inside `dir` instead of the current directory.
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// Adds an environment variable on top of the inherited environment.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env_vars.insert(key.into(), value.into());
        self
    }
}

impl Launcher for SystemLauncher {
    fn launch(&self, program: &Path) -> Result<LaunchedProcess, ShellError> {
        let program_name = program.display().to_string();

        let mut command = Command::new(program);
        command
            .envs(&self.env_vars)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(cwd) = &self.cwd {
            command.current_dir(dunce::simplified(cwd));
        }

        let mut child = command.spawn().map_err(|source| ShellError::Spawn {
            program: program_name.clone(),
            source,
        })?;

        let stdin = child.stdin.take();
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        match (stdin, stdout, stderr) {
            (Some(stdin), Some(stdout), Some(stderr)) => Ok(LaunchedProcess {
                stdin: Box::new(stdin),
                stdout: Box::new(stdout),
                stderr: Box::new(stderr),
                child: Box::new(child),
            }),
            (stdin, stdout, _) => {
                let missing = if stdin.is_none() {
                    "stdin"
                } else if stdout.is_none() {
                    "stdout"
                } else {
                    "stderr"
                };
                if let Err(e) = child.kill() {
                    log::warn!("Failed to kill half-launched process {}: {}", child.id(), e);
                }
                child.wait().ok();
                Err(ShellError::MissingStream(program_name, missing))
            }
        }
    }
}
