//! This module contains various utility modules and helper functions.

pub mod log;
pub mod table;

use crate::prelude::*;

/// Get the contents of a configuration file.
///
/// The file is looked up in the project configuration directory,
/// e.g. `~/.config/supergraph/` on Linux.
pub fn read_config_file(filename: &str) -> Result<serde_json::Value, Error> {
    let project_dirs = directories::ProjectDirs::from("", "", "supergraph")
        .context("Could not discern location of configuration files.")?;
    let config_dir = project_dirs.config_dir();
    let config_path = config_dir.join(filename);
    let config_file =
        std::fs::read_to_string(config_path).context("Could not read configuration file")?;
    Ok(serde_json::from_str(&config_file)?)
}

/// Deserialize the given JSON value into a configuration struct.
///
/// Exists so that callers holding a value from [`read_config_file`]
/// get a uniform error message on malformed configuration contents.
pub fn parse_config<T: serde::de::DeserializeOwned>(config: serde_json::Value) -> Result<T, Error> {
    serde_json::from_value(config).context("Malformed configuration file contents")
}
