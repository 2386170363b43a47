// src/system/interpreters_config.rs

use crate::{
    constants::{
        CONFIG_DIR_NAME, DEFAULT_SEARCH_DIRS, ELEVATED_SHELL_BINARY, INTERPRETERS_CONFIG_FILENAME,
        SHELL_BINARY,
    },
    system::resolver::{BinaryResolver, InterpreterPaths},
};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Filesystem Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Could not find system config directory.")]
    ConfigDirNotFound,
    #[error("Failed to parse interpreters.toml: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Failed to serialize interpreters config to TOML: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
    #[error("Could not expand search directory '{entry}': {message}")]
    Expand { entry: String, message: String },
}

/// The contents of `interpreters.toml`: which interpreters to run and where to look for them.
///
/// Missing keys fall back to the built-in defaults, so a file containing only
/// `shell = "bash"` is valid.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct InterpretersConfig {
    /// Directories probed in order. `~` and `$VAR` are expanded.
    pub search_dirs: Vec<String>,
    /// Logical name of the normal interpreter.
    pub shell: String,
    /// Logical name of the elevated interpreter.
    pub elevated_shell: String,
}

impl Default for InterpretersConfig {
    fn default() -> Self {
        Self {
            search_dirs: DEFAULT_SEARCH_DIRS.iter().map(|d| d.to_string()).collect(),
            shell: SHELL_BINARY.to_string(),
            elevated_shell: ELEVATED_SHELL_BINARY.to_string(),
        }
    }
}

impl InterpretersConfig {
    /// Builds the resolver table, expanding `~` and environment variables in every entry.
    ///
    /// # Errors
    /// Returns [`ConfigError::Expand`] if an entry references an undefined variable.
    pub fn resolver(&self) -> Result<BinaryResolver, ConfigError> {
        let dirs = self
            .search_dirs
            .iter()
            .map(|entry| {
                shellexpand::full(entry)
                    .map(|expanded| PathBuf::from(expanded.into_owned()))
                    .map_err(|e| ConfigError::Expand {
                        entry: entry.clone(),
                        message: e.to_string(),
                    })
            })
            .collect::<Result<Vec<PathBuf>, ConfigError>>()?;
        Ok(BinaryResolver::new(dirs))
    }

    /// Resolves the configured interpreter pair.
    ///
    /// # Errors
    /// Same as [`InterpretersConfig::resolver`].
    pub fn interpreter_paths(&self) -> Result<InterpreterPaths, ConfigError> {
        Ok(self
            .resolver()?
            .resolve_interpreters(&self.shell, &self.elevated_shell))
    }
}

/// Returns the path to the cmdshell configuration directory (`~/.config/cmdshell`).
/// Creates it if it doesn't exist.
pub fn get_config_dir() -> Result<PathBuf, ConfigError> {
    let config_path = dirs::config_dir()
        .ok_or(ConfigError::ConfigDirNotFound)?
        .join(CONFIG_DIR_NAME);
    if !config_path.exists() {
        fs::create_dir_all(&config_path)?;
    }
    Ok(config_path)
}

/// Loads `~/.config/cmdshell/interpreters.toml`, writing the defaults there first if it is missing.
pub fn load_interpreters_config() -> Result<InterpretersConfig, ConfigError> {
    let config_path = get_config_dir()?.join(INTERPRETERS_CONFIG_FILENAME);
    load_or_create(&config_path)
}

/// Loads the configuration at `path`, creating it with the defaults if it doesn't exist.
pub fn load_or_create(path: &Path) -> Result<InterpretersConfig, ConfigError> {
    if !path.exists() {
        let default_config = InterpretersConfig::default();
        let toml_string = toml::to_string_pretty(&default_config)?;
        fs::write(path, toml_string)?;
        log::debug!("Default interpreters config written to '{}'", path.display());
        Ok(default_config)
    } else {
        load_from_path(path)
    }
}

/// Loads the configuration at `path`. The file must exist.
pub fn load_from_path(path: &Path) -> Result<InterpretersConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_or_create_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(INTERPRETERS_CONFIG_FILENAME);

        let config = load_or_create(&path).unwrap();
        assert_eq!(config, InterpretersConfig::default());
        assert!(path.exists());

        // Second load reads the file back.
        let reloaded = load_or_create(&path).unwrap();
        assert_eq!(reloaded, config);
    }

    #[test]
    fn test_partial_file_uses_defaults_for_missing_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partial.toml");
        fs::write(&path, "shell = \"bash\"\n").unwrap();

        let config = load_from_path(&path).unwrap();
        assert_eq!(config.shell, "bash");
        assert_eq!(config.elevated_shell, ELEVATED_SHELL_BINARY);
        assert_eq!(config.search_dirs.len(), DEFAULT_SEARCH_DIRS.len());
    }

    #[test]
    fn test_invalid_toml_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        fs::write(&path, "search_dirs = [unterminated").unwrap();

        let result = load_from_path(&path);
        assert!(matches!(result, Err(ConfigError::TomlParse(_))));
    }

    #[test]
    fn test_resolver_expands_home() {
        let config = InterpretersConfig {
            search_dirs: vec!["~/bin".to_string(), "/opt/bin".to_string()],
            ..Default::default()
        };
        let resolver = config.resolver().unwrap();
        let home = dirs::home_dir().unwrap();
        assert_eq!(resolver.search_dirs()[0], home.join("bin"));
        assert_eq!(resolver.search_dirs()[1], PathBuf::from("/opt/bin"));
    }

    #[test]
    fn test_resolver_rejects_undefined_variable() {
        let config = InterpretersConfig {
            search_dirs: vec!["$CMDSHELL_SURELY_UNDEFINED_VAR/bin".to_string()],
            ..Default::default()
        };
        assert!(matches!(
            config.resolver(),
            Err(ConfigError::Expand { entry, .. }) if entry.starts_with("$CMDSHELL")
        ));
    }

    #[test]
    fn test_interpreter_paths_from_config() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("mysh"), b"").unwrap();
        let config = InterpretersConfig {
            search_dirs: vec![dir.path().display().to_string()],
            shell: "mysh".to_string(),
            elevated_shell: "mysu".to_string(),
        };

        let paths = config.interpreter_paths().unwrap();
        assert_eq!(paths.shell, dir.path().join("mysh"));
        assert_eq!(paths.elevated_shell, PathBuf::from("mysu"));
    }
}
