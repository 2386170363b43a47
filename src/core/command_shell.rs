// EN: src/core/command_shell.rs

use crate::{
    CancellationToken,
    constants::EXIT_POLL_INTERVAL,
    core::{
        hooks::ShellHooks,
        lifecycle::{Lifecycle, ShellState},
        line_reader::{LineReader, ReaderHandle},
    },
    system::{
        launcher::{ChildHandle, ExitOutcome, LaunchedProcess, Launcher, ShellError, SystemLauncher},
        resolver::{BinaryResolver, InterpreterPaths},
    },
};
use std::fmt;
use std::io::{self, Read, Write};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::thread::{self, JoinHandle};

const DEFAULT_TAG: &str = "shell";

/// Runs one command line through an interpreter and reports back through [`ShellHooks`].
///
/// The interpreter is started with no arguments; the command line is written
/// to its standard input followed by a newline, and the input is then closed.
/// The interpreter therefore parses the line itself, so pipes, redirections and
/// `;`-separated statements all work.
///
/// Standard output and standard error are each drained by their own
/// [`LineReader`] thread, so a chatty channel can never stall the other one.
/// The run ends only when both streams are exhausted *and* the interpreter has
/// exited.
///
/// A `CommandShell` is single-use: [`execute`](Self::execute) consumes it.
pub struct CommandShell {
    tag: String,
    command: String,
    elevated: bool,
    interpreters: InterpreterPaths,
    hooks: Arc<dyn ShellHooks>,
    launcher: Arc<dyn Launcher>,
    interrupt: Option<CancellationToken>,
    log_lines: bool,
    lifecycle: Lifecycle,
}

impl CommandShell {
    /// Creates a shell that resolves `sh`/`su` against the default search directories.
    ///
    /// # Arguments
    /// * `tag` - Name used in log messages and thread names. An empty tag becomes `"shell"`.
    /// * `command` - The command line, passed verbatim to the interpreter.
    /// * `elevated` - Run the command through the privilege-elevating interpreter.
    /// * `hooks` - Receives every lifecycle event and output line.
    pub fn new(
        tag: impl Into<String>,
        command: impl Into<String>,
        elevated: bool,
        hooks: impl ShellHooks + 'static,
    ) -> Self {
        Self::with_resolver(tag, command, elevated, hooks, &BinaryResolver::default())
    }

    /// Like [`CommandShell::new`], resolving the interpreters with `resolver`.
    pub fn with_resolver(
        tag: impl Into<String>,
        command: impl Into<String>,
        elevated: bool,
        hooks: impl ShellHooks + 'static,
        resolver: &BinaryResolver,
    ) -> Self {
        let mut tag = tag.into();
        if tag.is_empty() {
            tag = DEFAULT_TAG.to_string();
        }
        let lifecycle = Lifecycle::new(&tag);
        Self {
            tag,
            command: command.into(),
            elevated,
            interpreters: InterpreterPaths::resolve_with(resolver),
            hooks: Arc::new(hooks),
            launcher: Arc::new(SystemLauncher::new()),
            interrupt: None,
            log_lines: true,
            lifecycle,
        }
    }

    /// Uses already-resolved interpreter paths.
    pub fn interpreters(mut self, interpreters: InterpreterPaths) -> Self {
        self.interpreters = interpreters;
        self
    }

    /// Replaces the process launcher.
    pub fn launcher(mut self, launcher: impl Launcher + 'static) -> Self {
        self.launcher = Arc::new(launcher);
        self
    }

    /// Sets a token that, once raised, cuts the wait for the interpreter short.
    ///
    /// An interrupted run still calls `on_cmd_terminated`, with
    /// [`ExitOutcome::Unknown`]. The interpreter itself is left running.
    ///
    /// A line that is already being delivered is allowed to finish first, so
    /// the interrupt takes effect only once any running `on_stdout`/`on_stderr`
    /// call returns. A hook that never returns keeps the run from ending.
    pub fn interrupt(mut self, token: CancellationToken) -> Self {
        self.interrupt = Some(token);
        self
    }

    /// Whether the readers echo every line to the `debug` log. On by default.
    pub fn log_lines(mut self, log_lines: bool) -> Self {
        self.log_lines = log_lines;
        self
    }

    /// The tag used for logging and thread names.
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// The command line that will be sent.
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Whether the elevated interpreter is used.
    pub fn is_elevated(&self) -> bool {
        self.elevated
    }

    /// The interpreter that will be launched.
    pub fn interpreter(&self) -> &Path {
        self.interpreters.select(self.elevated)
    }

    pub(crate) fn state(&self) -> ShellState {
        self.lifecycle.state()
    }

    /// Runs the full lifecycle on the calling thread. Outcomes arrive only through the hooks.
    pub fn execute(mut self) {
        self.hooks.before_execute();
        self.lifecycle.advance(ShellState::BeforeExecuteHookRun);

        let Some(process) = self.launch() else {
            return;
        };
        let LaunchedProcess {
            stdin,
            stdout,
            stderr,
            mut child,
        } = process;

        let readers = match self.attach_streams(stdout, stderr) {
            Ok(readers) => readers,
            Err(e) => {
                self.abort_launch(child.as_mut(), e);
                return;
            }
        };

        self.send_command(stdin);

        let exit = self.await_termination(child.as_mut(), readers);
        self.lifecycle.advance(ShellState::Terminated);
        log::debug!("[{}] interpreter {}", self.tag, exit);
        self.hooks.on_cmd_terminated(exit);
    }

    /// Runs [`execute`](Self::execute) on a new thread named `<tag>-stdin`.
    ///
    /// # Errors
    /// Returns the OS error if the thread could not be created; no hook has run in that case.
    pub fn spawn(self) -> io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name(format!("{}-stdin", self.tag))
            .spawn(move || self.execute())
    }

    fn launch(&mut self) -> Option<LaunchedProcess> {
        self.lifecycle.advance(ShellState::Launching);
        let program = self.interpreters.select(self.elevated).to_path_buf();
        log::debug!("[{}] invoking external process: {}", self.tag, program.display());

        match self.launcher.launch(&program) {
            Ok(process) => {
                self.lifecycle.advance(ShellState::Launched);
                Some(process)
            }
            Err(e) => {
                log::error!(
                    "[{}] invoking external process {} failed: {}",
                    self.tag,
                    program.display(),
                    e
                );
                self.lifecycle.advance(ShellState::LaunchFailed);
                self.hooks.on_execute_failed(&e);
                None
            }
        }
    }

    /// Starts both readers held, so nothing is delivered unless both exist.
    fn attach_streams(
        &mut self,
        stdout: Box<dyn Read + Send>,
        stderr: Box<dyn Read + Send>,
    ) -> Result<[ReaderHandle; 2], ShellError> {
        let hooks = Arc::clone(&self.hooks);
        let stdout_reader = LineReader::new(format!("{}-stdout", self.tag))
            .log_lines(self.log_lines)
            .held(true)
            .start(stdout, move |line| hooks.on_stdout(line))
            .map_err(|source| ShellError::AttachStreams {
                stream: "stdout",
                source,
            })?;

        let hooks = Arc::clone(&self.hooks);
        let stderr_reader = match LineReader::new(format!("{}-stderr", self.tag))
            .log_lines(self.log_lines)
            .held(true)
            .start(stderr, move |line| hooks.on_stderr(line))
        {
            Ok(reader) => reader,
            Err(source) => {
                stdout_reader.detach();
                return Err(ShellError::AttachStreams {
                    stream: "stderr",
                    source,
                });
            }
        };

        stdout_reader.release();
        stderr_reader.release();
        self.lifecycle.advance(ShellState::StreamsAttached);
        Ok([stdout_reader, stderr_reader])
    }

    /// The interpreter is up but unusable: take it down and report a launch failure.
    fn abort_launch(&mut self, child: &mut dyn ChildHandle, cause: ShellError) {
        log::error!("[{}] {}", self.tag, cause);
        if let Err(e) = child.kill() {
            log::warn!("[{}] failed to kill interpreter: {}", self.tag, e);
        }
        child.wait().ok();
        self.lifecycle.advance(ShellState::LaunchFailed);
        self.hooks.on_execute_failed(&cause);
    }

    /// Writes the command line once and closes the interpreter's input, whatever happens.
    /// A failed write is logged and otherwise ignored; the exit code tells the story.
    fn send_command(&mut self, stdin: Box<dyn Write + Send>) {
        log::debug!("[{}] invoking command line: {}", self.tag, self.command);

        let tag = &self.tag;
        let written = {
            let mut stdin = scopeguard::guard(stdin, |stdin| {
                drop(stdin);
                log::debug!("[{}] interpreter input closed", tag);
            });
            writeln!(stdin, "{}", self.command).and_then(|()| stdin.flush())
        };

        match written {
            Ok(()) => {
                self.lifecycle.advance(ShellState::CommandFlushed);
                self.hooks.on_cmd_started();
            }
            Err(e) => {
                log::warn!("[{}] writing command to interpreter failed: {}", self.tag, e);
            }
        }
    }

    fn await_termination(
        &mut self,
        child: &mut dyn ChildHandle,
        readers: [ReaderHandle; 2],
    ) -> ExitOutcome {
        self.lifecycle.advance(ShellState::AwaitingTermination);
        if !self.join_readers(readers) {
            return ExitOutcome::Unknown;
        }
        self.wait_for_exit(child)
    }

    fn is_interrupted(&self) -> bool {
        self.interrupt
            .as_ref()
            .is_some_and(|token| token.load(Ordering::SeqCst))
    }

    /// Returns `false` if the interrupt fired first; the readers are detached then.
    fn join_readers(&self, readers: [ReaderHandle; 2]) -> bool {
        if self.interrupt.is_some() {
            while !readers.iter().all(ReaderHandle::is_finished) {
                if self.is_interrupted() {
                    log::warn!("[{}] interrupted while joining readers", self.tag);
                    for reader in readers {
                        reader.detach();
                    }
                    return false;
                }
                thread::sleep(EXIT_POLL_INTERVAL);
            }
        }

        for reader in readers {
            let name = reader.name().to_string();
            if reader.join().is_err() {
                log::warn!("[{}] reader '{}' panicked", self.tag, name);
            }
        }
        true
    }

    fn wait_for_exit(&self, child: &mut dyn ChildHandle) -> ExitOutcome {
        if self.interrupt.is_none() {
            return child.wait().unwrap_or_else(|e| {
                log::warn!("[{}] waiting for interpreter failed: {}", self.tag, e);
                ExitOutcome::Unknown
            });
        }

        // Non-blocking wait loop to allow for interruption.
        loop {
            match child.try_wait() {
                Ok(Some(outcome)) => return outcome,
                Ok(None) => {
                    if self.is_interrupted() {
                        log::warn!(
                            "[{}] interrupted while waiting for interpreter (pid {:?})",
                            self.tag,
                            child.id()
                        );
                        return ExitOutcome::Unknown;
                    }
                    thread::sleep(EXIT_POLL_INTERVAL);
                }
                Err(e) => {
                    log::warn!("[{}] waiting for interpreter failed: {}", self.tag, e);
                    return ExitOutcome::Unknown;
                }
            }
        }
    }
}

impl fmt::Debug for CommandShell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandShell")
            .field("tag", &self.tag)
            .field("command", &self.command)
            .field("elevated", &self.elevated)
            .field("interpreters", &self.interpreters)
            .field("interrupt", &self.interrupt)
            .field("log_lines", &self.log_lines)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
