//! # System Interaction Layer
//!
//! This module is the boundary between the execution core and the operating system.
//!
//! ## Modules
//!
//! - **`launcher`**: Spawns an interpreter with all three standard streams piped
//!   and hands back the channels plus a waitable handle.
//! - **`resolver`**: Maps a logical interpreter name (`sh`, `su`) to a concrete
//!   path by probing a fixed, ordered list of directories.
//! - **`interpreters_config`**: Handles the loading and parsing of the
//!   `interpreters.toml` file, which overrides the interpreter names and the
//!   directories they are looked up in.

pub mod interpreters_config;
pub mod launcher;
pub mod resolver;
