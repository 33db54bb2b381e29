// src/config.rs

//! Configuration loading utilities.
//!
//! Configuration is layered: built-in defaults, then an optional TOML file,
//! then environment variables. Command-line flags are applied on top by the
//! binary.

use std::path::Path;

use crate::error::Result;
use crate::models::Config;

/// Load configuration from an optional TOML file and the process environment.
///
/// A file that fails to load is reported and replaced by defaults.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let mut config = load_file(path);
    config.apply_env()?;
    Ok(config)
}

/// Same as [`load_config`], reading environment values through `lookup`.
pub fn load_config_with<F>(path: Option<&Path>, lookup: F) -> Result<Config>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = load_file(path);
    config.apply_env_with(lookup)?;
    Ok(config)
}

fn load_file(path: Option<&Path>) -> Config {
    match path {
        Some(path) => Config::load_or_default(path),
        None => Config::default(),
    }
}
