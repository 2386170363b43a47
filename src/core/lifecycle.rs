// src/core/lifecycle.rs

use std::fmt;

/// The stages a [`CommandShell`](crate::CommandShell) run moves through.
///
/// A run consumes its shell, so callers never hold one mid-run; the stages
/// show up in the `debug` log as `[tag] <from> -> <to>` lines.
///
/// Variants are declared in lifecycle order and every legal transition goes
/// to a later variant.
/// `LaunchFailed` and `Terminated` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ShellState {
    /// Constructed, nothing has run yet.
    Created,
    /// `before_execute` has returned.
    BeforeExecuteHookRun,
    /// The interpreter is being spawned.
    Launching,
    /// The interpreter process exists.
    Launched,
    /// The interpreter could not be brought up.
    LaunchFailed,
    /// Both line readers are running.
    StreamsAttached,
    /// The command line was written and the input closed.
    CommandFlushed,
    /// Waiting for the readers and the interpreter to finish.
    AwaitingTermination,
    /// `on_cmd_terminated` is being delivered.
    Terminated,
}

impl ShellState {
    /// `true` for states a run never leaves.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::LaunchFailed | Self::Terminated)
    }

    /// Whether `next` is a legal successor of `self`.
    ///
    /// `Launching` branches into either `LaunchFailed` or `Launched`, and a
    /// launch whose streams cannot be attached still ends in `LaunchFailed`.
    pub fn can_advance_to(self, next: Self) -> bool {
        use ShellState::*;
        matches!(
            (self, next),
            (Created, BeforeExecuteHookRun)
                | (BeforeExecuteHookRun, Launching)
                | (Launching, LaunchFailed)
                | (Launching, Launched)
                // Attaching the readers is the last step of a launch.
                | (Launched, LaunchFailed)
                | (Launched, StreamsAttached)
                | (StreamsAttached, CommandFlushed)
                // A failed write still moves on: the interpreter decides the outcome.
                | (StreamsAttached, AwaitingTermination)
                | (CommandFlushed, AwaitingTermination)
                | (AwaitingTermination, Terminated)
        )
    }
}

impl fmt::Display for ShellState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Tracks the current [`ShellState`] of one run and logs every transition.
#[derive(Debug)]
pub(crate) struct Lifecycle {
    tag: String,
    state: ShellState,
}

impl Lifecycle {
    pub(crate) fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
            state: ShellState::Created,
        }
    }

    pub(crate) fn state(&self) -> ShellState {
        self.state
    }

    /// Moves to `next`. Illegal transitions are a programming error and are
    /// caught in debug builds; release builds log them and still move.
    pub(crate) fn advance(&mut self, next: ShellState) {
        let legal = self.state.can_advance_to(next);
        debug_assert!(legal, "illegal transition {} -> {}", self.state, next);
        if !legal {
            log::error!("[{}] illegal transition {} -> {}", self.tag, self.state, next);
        }
        log::debug!("[{}] {} -> {}", self.tag, self.state, next);
        self.state = next;
    }
}
