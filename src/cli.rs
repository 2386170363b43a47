// src/cli.rs

use crate::{
    CancellationToken,
    core::{
        command_shell::CommandShell,
        hooks::{ConsoleHooks, ConsoleResult},
    },
    system::{
        interpreters_config::{self, InterpretersConfig},
        launcher::{ExitOutcome, SystemLauncher},
    },
};
use anyhow::{Context, Result, anyhow};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

/// Exit status used when the interpreter could not be started.
pub const LAUNCH_FAILED_EXIT_STATUS: i32 = 127;

/// Exit status used when the run was interrupted (Ctrl+C).
pub const INTERRUPTED_EXIT_STATUS: i32 = 130;

/// cmdshell: run one command line through `sh` (or `su`) and stream its output.
///
/// The words after `--` are joined into a single command line and written to
/// the interpreter's standard input, so pipes, redirections and `;` work as
/// they would in an interactive shell, e.g. `cmdshell -- 'ls | grep toml; echo done'`.
#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about,
    long_about = None,
    styles = clap::builder::Styles::styled()
        .header(clap::builder::styling::AnsiColor::Yellow.on_default().bold())
        .usage(clap::builder::styling::AnsiColor::Yellow.on_default().bold())
        .literal(clap::builder::styling::AnsiColor::Cyan.on_default().bold())
        .placeholder(clap::builder::styling::AnsiColor::Green.on_default()),
)]
#[command(disable_help_subcommand = true)]
pub struct Cli {
    /// Run the command through the privilege-elevating interpreter.
    #[arg(long, short = 'e')]
    pub elevated: bool,

    /// Tag used in log messages and thread names.
    #[arg(long, short = 't', default_value = "cmdshell")]
    pub tag: String,

    /// Read interpreter settings from this file instead of `~/.config/cmdshell/interpreters.toml`.
    #[arg(long, short = 'c')]
    pub config: Option<PathBuf>,

    /// Run the interpreter in this directory.
    #[arg(long)]
    pub cwd: Option<PathBuf>,

    /// Do not echo every output line to the debug log.
    #[arg(long)]
    pub no_line_log: bool,

    /// Print lifecycle milestones to stderr.
    #[arg(long, short = 's')]
    pub status: bool,

    /// The command line. Several words are shell-quoted and joined with spaces.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, required = true)]
    pub command: Vec<String>,
}

impl Cli {
    /// Builds the single line that is sent to the interpreter.
    ///
    /// One word is sent verbatim, so `cmdshell -- 'a | b'` keeps its pipe.
    /// Several words are quoted individually, so `cmdshell -- echo "a b"`
    /// prints `a b`.
    pub fn command_line(&self) -> Result<String> {
        match self.command.as_slice() {
            [] => Err(anyhow!("No command specified to run.")),
            [single] => Ok(single.clone()),
            words => shlex::try_join(words.iter().map(String::as_str))
                .map_err(|e| anyhow!("Command could not be quoted: {}", e)),
        }
    }

    /// Loads the interpreter settings, from `--config` if given.
    pub fn interpreters_config(&self) -> Result<InterpretersConfig> {
        match &self.config {
            Some(path) => interpreters_config::load_from_path(path).with_context(|| {
                format!(
                    "Failed to load interpreter config '{}'",
                    dunce::simplified(path).display()
                )
            }),
            None => interpreters_config::load_interpreters_config()
                .context("Failed to load the default interpreter config"),
        }
    }
}

/// Maps how a console run ended to the process exit status of `cmdshell`.
pub fn exit_status(result: Option<ConsoleResult>) -> i32 {
    match result {
        Some(ConsoleResult::LaunchFailed) => LAUNCH_FAILED_EXIT_STATUS,
        Some(ConsoleResult::Finished(ExitOutcome::Unknown)) => INTERRUPTED_EXIT_STATUS,
        Some(ConsoleResult::Finished(outcome)) => outcome.code(),
        None => 1,
    }
}

/// Runs the command described by `cli` on the calling thread and returns the
/// exit status `cmdshell` should end with.
pub fn run(cli: &Cli, cancellation_token: &CancellationToken) -> Result<i32> {
    log::debug!("CLI args parsed: {:?}", cli);

    let command_line = cli.command_line()?;
    let config = cli.interpreters_config()?;
    let interpreters = config.interpreter_paths()?;

    let mut launcher = SystemLauncher::new();
    if let Some(cwd) = &cli.cwd {
        launcher = launcher.current_dir(cwd);
    }

    let hooks = Arc::new(ConsoleHooks::new(cli.status));
    CommandShell::new(&cli.tag, command_line, cli.elevated, hooks.clone())
        .interpreters(interpreters)
        .launcher(launcher)
        .interrupt(cancellation_token.clone())
        .log_lines(!cli.no_line_log)
        .execute();

    Ok(exit_status(hooks.result()))
}
