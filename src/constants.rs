// src/constants.rs

use std::time::Duration;

/// Logical name of the unprivileged interpreter.
pub const SHELL_BINARY: &str = "sh";

/// Logical name of the privilege-elevating interpreter.
pub const ELEVATED_SHELL_BINARY: &str = "su";

/// Directories probed, in order, when resolving an interpreter name to a path.
pub const DEFAULT_SEARCH_DIRS: &[&str] = &["/system/bin", "/system/xbin"];

/// Exit code reported when the wait for the interpreter was interrupted.
///
/// On Unix no process can exit with this value, but on Windows an exit code of
/// `0x80000000` reads the same. Check [`ExitOutcome::is_conclusive`](crate::ExitOutcome::is_conclusive)
/// rather than comparing codes.
pub const INTERRUPTED_EXIT_CODE: i32 = i32::MIN;

/// Delay between two exit-status polls of a running interpreter.
pub const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// The name of the interpreter configuration file (in ~/.config/cmdshell/).
pub const INTERPRETERS_CONFIG_FILENAME: &str = "interpreters.toml";

/// The name of the configuration directory below the system config directory.
pub const CONFIG_DIR_NAME: &str = "cmdshell";
