//! # cmdshell
//!
//! Launches an external command interpreter (optionally a privilege-elevating
//! one), feeds it a single command line on its standard input and streams the
//! interpreter's standard output and standard error back, line by line, to a
//! caller-supplied [`ShellHooks`] implementation.
//!
//! ```no_run
//! use cmdshell::{CommandShell, ExitOutcome, FnHooks};
//!
//! let hooks = FnHooks::new()
//!     .on_stdout(|line| println!("out: {line}"))
//!     .on_cmd_terminated(|exit: ExitOutcome| println!("exit: {}", exit.code()));
//!
//! CommandShell::new("listing", "ls -la | head -n 3", false, hooks).execute();
//! ```

use std::sync::Arc;
use std::sync::atomic::AtomicBool;

/// A shared flag that, once set, interrupts a running wait.
pub type CancellationToken = Arc<AtomicBool>;

pub mod cli;
pub mod constants;
pub mod core;
pub mod system;

pub use crate::core::command_shell::CommandShell;
pub use crate::core::hooks::{ConsoleHooks, ConsoleResult, FnHooks, NoopHooks, ShellHooks};
pub use crate::core::line_reader::{LineReader, ReaderHandle};
pub use crate::system::launcher::{
    ChildHandle, ExitOutcome, LaunchedProcess, Launcher, ShellError, SystemLauncher,
};
pub use crate::system::resolver::{BinaryResolver, InterpreterPaths};
