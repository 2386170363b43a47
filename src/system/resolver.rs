// src/system/resolver.rs

use crate::constants::{DEFAULT_SEARCH_DIRS, ELEVATED_SHELL_BINARY, SHELL_BINARY};
use std::path::{Path, PathBuf};

/// Maps a logical executable name to a concrete path by probing a fixed,
/// ordered table of directories.
///
/// The table is handed in at construction and never changes afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryResolver {
    search_dirs: Vec<PathBuf>,
}

impl Default for BinaryResolver {
    fn default() -> Self {
        Self::new(DEFAULT_SEARCH_DIRS.iter().map(PathBuf::from))
    }
}

impl BinaryResolver {
    /// Creates a resolver probing `search_dirs` in the given order.
    pub fn new<I, P>(search_dirs: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            search_dirs: search_dirs.into_iter().map(Into::into).collect(),
        }
    }

    /// The directories probed, in order.
    pub fn search_dirs(&self) -> &[PathBuf] {
        &self.search_dirs
    }

    /// Returns the first `<dir>/<name>` that exists, or `name` itself when
    /// none does. Never fails: a bare name is left for the OS to look up.
    pub fn resolve(&self, name: &str) -> PathBuf {
        self.search_dirs
            .iter()
            .map(|dir| dir.join(name))
            .find(|candidate| candidate.exists())
            .unwrap_or_else(|| {
                log::debug!("'{}' not found in search dirs, falling back to bare name", name);
                PathBuf::from(name)
            })
    }

    /// Resolves both interpreters in one go.
    pub fn resolve_interpreters(&self, shell: &str, elevated_shell: &str) -> InterpreterPaths {
        InterpreterPaths {
            shell: self.resolve(shell),
            elevated_shell: self.resolve(elevated_shell),
        }
    }
}

/// The two candidate interpreters of a command shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterpreterPaths {
    /// The normal, unprivileged interpreter.
    pub shell: PathBuf,
    /// The interpreter that runs with elevated privileges.
    pub elevated_shell: PathBuf,
}

impl InterpreterPaths {
    /// Resolves the default `sh`/`su` pair with `resolver`.
    pub fn resolve_with(resolver: &BinaryResolver) -> Self {
        resolver.resolve_interpreters(SHELL_BINARY, ELEVATED_SHELL_BINARY)
    }

    /// Picks the interpreter for the given privilege mode.
    pub fn select(&self, elevated: bool) -> &Path {
        if elevated {
            &self.elevated_shell
        } else {
            &self.shell
        }
    }
}
