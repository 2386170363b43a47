//! # Command Execution Core
//!
//! - **`command_shell`**: the orchestrator. Launches the interpreter, attaches
//!   one reader per output channel, writes the command line and waits for both
//!   readers and the process before reporting the exit outcome.
//! - **`line_reader`**: drains one byte stream on its own thread and delivers
//!   it line by line.
//! - **`hooks`**: the callback surface through which callers observe a run.
//! - **`lifecycle`**: the forward-only state machine of a run.

pub mod command_shell;
pub mod hooks;
pub mod lifecycle;
pub mod line_reader;

#[cfg(test)]
pub(crate) mod test_support;
