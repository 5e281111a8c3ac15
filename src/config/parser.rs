//! TOML loading for check options

use crate::config::validation::validate;
use crate::config::CheckOptions;
use crate::ConfigResult;
use std::path::Path;

/// Loads check options from a TOML file and validates them
///
/// All fields are optional; missing keys fall back to their defaults, so an
/// empty file yields the default options.
///
/// # Arguments
///
/// * `path` - Path to the TOML file
///
/// # Returns
///
/// * `Ok(CheckOptions)` - Parsed and validated options
/// * `Err(ConfigError)` - Failed to read, parse, or validate
pub fn load_options(path: &Path) -> ConfigResult<CheckOptions> {
    let content = std::fs::read_to_string(path)?;
    let options: CheckOptions = toml::from_str(&content)?;
    validate(&options)?;
    Ok(options)
}
