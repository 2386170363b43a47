// src/core/hooks.rs

use crate::system::launcher::{ExitOutcome, ShellError};
use colored::Colorize;
use std::fmt;
use std::io::{self, Write};
use std::sync::{Arc, Mutex, PoisonError};

/// Callback points of a [`CommandShell`](crate::CommandShell) run.
///
/// Every method defaults to a no-op. For one run they are called in this order:
///
/// 1. [`before_execute`](Self::before_execute), before anything is spawned.
/// 2. Either [`on_execute_failed`](Self::on_execute_failed) (and nothing else),
///    or the remaining hooks below.
/// 3. [`on_cmd_started`](Self::on_cmd_started), once the command line has been
///    flushed and the interpreter's input closed.
/// 4. [`on_stdout`](Self::on_stdout) / [`on_stderr`](Self::on_stderr), from two
///    separate reader threads, possibly before step 3. The two may run
///    concurrently with each other but never with themselves, so state shared
///    between them needs synchronization.
/// 5. [`on_cmd_terminated`](Self::on_cmd_terminated), after both readers are done
///    and the interpreter has exited.
pub trait ShellHooks: Send + Sync {
    /// Runs before the interpreter is spawned.
    fn before_execute(&self) {}

    /// The interpreter could not be started. Ends the run.
    fn on_execute_failed(&self, _cause: &ShellError) {}

    /// One line from the interpreter's standard output, terminator stripped.
    fn on_stdout(&self, _line: &str) {}

    /// One line from the interpreter's standard error, terminator stripped.
    fn on_stderr(&self, _line: &str) {}

    /// The command line has been written and the input closed.
    fn on_cmd_started(&self) {}

    /// The interpreter is gone and all of its output has been delivered.
    fn on_cmd_terminated(&self, _exit: ExitOutcome) {}
}

impl<H: ShellHooks + ?Sized> ShellHooks for Arc<H> {
    fn before_execute(&self) {
        (**self).before_execute();
    }

    fn on_execute_failed(&self, cause: &ShellError) {
        (**self).on_execute_failed(cause);
    }

    fn on_stdout(&self, line: &str) {
        (**self).on_stdout(line);
    }

    fn on_stderr(&self, line: &str) {
        (**self).on_stderr(line);
    }

    fn on_cmd_started(&self) {
        (**self).on_cmd_started();
    }

    fn on_cmd_terminated(&self, exit: ExitOutcome) {
        (**self).on_cmd_terminated(exit);
    }
}

/// Hooks that ignore everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHooks;

impl ShellHooks for NoopHooks {}

type LineFn = Box<dyn Fn(&str) + Send + Sync>;
type EventFn = Box<dyn Fn() + Send + Sync>;

/// Hooks assembled from closures, one per callback point.
#[derive(Default)]
pub struct FnHooks {
    before_execute: Option<EventFn>,
    on_execute_failed: Option<Box<dyn Fn(&ShellError) + Send + Sync>>,
    on_stdout: Option<LineFn>,
    on_stderr: Option<LineFn>,
    on_cmd_started: Option<EventFn>,
    on_cmd_terminated: Option<Box<dyn Fn(ExitOutcome) + Send + Sync>>,
}

impl FnHooks {
    /// Creates hooks with every callback unset.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the `before_execute` callback.
    pub fn before_execute(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.before_execute = Some(Box::new(f));
        self
    }

    /// Sets the `on_execute_failed` callback.
    pub fn on_execute_failed(mut self, f: impl Fn(&ShellError) + Send + Sync + 'static) -> Self {
        self.on_execute_failed = Some(Box::new(f));
        self
    }

    /// Sets the `on_stdout` callback.
    pub fn on_stdout(mut self, f: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_stdout = Some(Box::new(f));
        self
    }

    /// Sets the `on_stderr` callback.
    pub fn on_stderr(mut self, f: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_stderr = Some(Box::new(f));
        self
    }

    /// Sets the `on_cmd_started` callback.
    pub fn on_cmd_started(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_cmd_started = Some(Box::new(f));
        self
    }

    /// Sets the `on_cmd_terminated` callback.
    pub fn on_cmd_terminated(mut self, f: impl Fn(ExitOutcome) + Send + Sync + 'static) -> Self {
        self.on_cmd_terminated = Some(Box::new(f));
        self
    }
}

impl fmt::Debug for FnHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnHooks")
            .field("before_execute", &self.before_execute.is_some())
            .field("on_execute_failed", &self.on_execute_failed.is_some())
            .field("on_stdout", &self.on_stdout.is_some())
            .field("on_stderr", &self.on_stderr.is_some())
            .field("on_cmd_started", &self.on_cmd_started.is_some())
            .field("on_cmd_terminated", &self.on_cmd_terminated.is_some())
            .finish()
    }
}

impl ShellHooks for FnHooks {
    fn before_execute(&self) {
        if let Some(f) = &self.before_execute {
            f();
        }
    }

    fn on_execute_failed(&self, cause: &ShellError) {
        if let Some(f) = &self.on_execute_failed {
            f(cause);
        }
    }

    fn on_stdout(&self, line: &str) {
        if let Some(f) = &self.on_stdout {
            f(line);
        }
    }

    fn on_stderr(&self, line: &str) {
        if let Some(f) = &self.on_stderr {
            f(line);
        }
    }

    fn on_cmd_started(&self) {
        if let Some(f) = &self.on_cmd_started {
            f();
        }
    }

    fn on_cmd_terminated(&self, exit: ExitOutcome) {
        if let Some(f) = &self.on_cmd_terminated {
            f(exit);
        }
    }
}

/// What a [`ConsoleHooks`] run ended with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleResult {
    /// The interpreter never started.
    LaunchFailed,
    /// The interpreter ran and ended this way.
    Finished(ExitOutcome),
}

/// Mirrors the interpreter's output onto this process's stdout/stderr and
/// remembers how the run ended.
#[derive(Debug, Default)]
pub struct ConsoleHooks {
    show_status: bool,
    result: Mutex<Option<ConsoleResult>>,
}

impl ConsoleHooks {
    /// Creates console hooks. With `show_status`, lifecycle milestones are
    /// printed (dimmed) to stderr as well.
    pub fn new(show_status: bool) -> Self {
        Self {
            show_status,
            result: Mutex::new(None),
        }
    }

    /// How the run ended, once it has.
    pub fn result(&self) -> Option<ConsoleResult> {
        *self.result.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, result: ConsoleResult) {
        *self.result.lock().unwrap_or_else(PoisonError::into_inner) = Some(result);
    }
}

/// Writes one line to `out`. A closed pipe on the other end (`cmdshell ... | head`)
/// is not an error; the remaining output is simply dropped.
fn emit(mut out: impl Write, text: impl fmt::Display) {
    if let Err(e) = writeln!(out, "{}", text) {
        if e.kind() != io::ErrorKind::BrokenPipe {
            log::debug!("Failed to write console output: {}", e);
        }
    }
}

impl ShellHooks for ConsoleHooks {
    fn on_execute_failed(&self, cause: &ShellError) {
        emit(io::stderr().lock(), format!("{}: {}", "Error".red().bold(), cause));
        self.record(ConsoleResult::LaunchFailed);
    }

    fn on_stdout(&self, line: &str) {
        emit(io::stdout().lock(), line);
    }

    fn on_stderr(&self, line: &str) {
        emit(io::stderr().lock(), line.red());
    }

    fn on_cmd_started(&self) {
        if self.show_status {
            emit(io::stderr().lock(), "--- command sent ---".dimmed());
        }
    }

    fn on_cmd_terminated(&self, exit: ExitOutcome) {
        if self.show_status {
            emit(
                io::stderr().lock(),
                format!("--- interpreter {} ---", exit).dimmed(),
            );
        }
        self.record(ConsoleResult::Finished(exit));
    }
}
