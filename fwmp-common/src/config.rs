//! Configuration loading and setting resolution
//!
//! Settings resolve in priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Caller-supplied compiled default (fallback)

use crate::{Error, Result};
use std::path::{Path, PathBuf};

/// Resolve a single string setting following the priority order above.
///
/// Returns `None` when neither CLI, environment, nor config file carry the
/// setting; callers apply their compiled default then.
pub fn resolve_setting(
    cli_arg: Option<&str>,
    env_var_name: &str,
    toml_key: &str,
) -> Option<String> {
    // Priority 1: Command-line argument
    if let Some(value) = cli_arg {
        return Some(value.to_string());
    }

    // Priority 2: Environment variable
    if let Ok(value) = std::env::var(env_var_name) {
        return Some(value);
    }

    // Priority 3: TOML config file
    if let Ok(config_path) = locate_config_file() {
        if let Some(value) = read_config_key(&config_path, toml_key) {
            return Some(value);
        }
    }

    None
}

/// Read one top-level string key out of a TOML config file.
pub fn read_config_key(path: &Path, key: &str) -> Option<String> {
    let toml_content = std::fs::read_to_string(path).ok()?;
    let config = toml::from_str::<toml::Value>(&toml_content).ok()?;
    config
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
}

/// Locate the platform configuration file for FWMP services.
pub fn locate_config_file() -> Result<PathBuf> {
    if cfg!(target_os = "linux") {
        // Try ~/.config/fwmp/config.toml first, then /etc/fwmp/config.toml
        let user_config = dirs::config_dir().map(|d| d.join("fwmp").join("config.toml"));
        let system_config = PathBuf::from("/etc/fwmp/config.toml");

        if let Some(path) = user_config {
            if path.exists() {
                return Ok(path);
            }
        }
        if system_config.exists() {
            return Ok(system_config);
        }
        Err(Error::Config("No config file found".to_string()))
    } else {
        let config_path = dirs::config_dir()
            .map(|d| d.join("fwmp").join("config.toml"))
            .ok_or_else(|| Error::Config("Could not determine config directory".to_string()))?;

        if config_path.exists() {
            Ok(config_path)
        } else {
            Err(Error::Config(format!(
                "Config file not found: {:?}",
                config_path
            )))
        }
    }
}
