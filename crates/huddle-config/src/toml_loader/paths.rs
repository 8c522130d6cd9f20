//! Where the config lives, and writing the first one.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use huddle_common::ConfigError;
use tracing::info;

use super::template::default_config_toml;

/// Environment variable naming an alternative config file.
pub const CONFIG_ENV: &str = "HUDDLE_CONFIG";

/// `$HUDDLE_CONFIG` if set, else `<config dir>/huddle/config.toml`
/// (`~/.config` on Linux, `~/Library/Application Support` on macOS).
pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    resolve_config_path(std::env::var_os(CONFIG_ENV), dirs::config_dir())
}

pub(crate) fn resolve_config_path(
    env: Option<OsString>,
    config_dir: Option<PathBuf>,
) -> Result<PathBuf, ConfigError> {
    if let Some(path) = env.filter(|p| !p.is_empty()) {
        return Ok(PathBuf::from(path));
    }
    config_dir
        .map(|dir| dir.join("huddle").join("config.toml"))
        .ok_or_else(|| {
            ConfigError::ParseError(format!(
                "no config directory on this platform; set {CONFIG_ENV}"
            ))
        })
}

/// Write the commented template to `path`, creating parent directories.
pub fn create_default_config(path: &Path) -> Result<(), ConfigError> {
    let io_error = |what: &str, e: std::io::Error| {
        ConfigError::ParseError(format!("failed to {what} {}: {e}", path.display()))
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| io_error("create directory for", e))?;
    }
    std::fs::write(path, default_config_toml()).map_err(|e| io_error("write", e))?;

    info!(path = %path.display(), "wrote default config");
    Ok(())
}
