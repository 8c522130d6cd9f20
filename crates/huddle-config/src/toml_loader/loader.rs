//! Reading `config.toml`: an explicit file, or the default one created on
//! first run.

use std::io::ErrorKind;
use std::path::Path;

use huddle_common::ConfigError;
use tracing::{debug, info, warn};

use crate::schema::HuddleConfig;
use crate::validation;

use super::paths::{create_default_config, default_config_path};

/// Parse the config at `path`, filling absent fields from defaults.
///
/// Validation problems are only logged; `load_config_from` enforces them.
pub fn load_from_path(path: &Path) -> Result<HuddleConfig, ConfigError> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(ConfigError::FileNotFound(path.to_path_buf()))
        }
        Err(e) => {
            return Err(ConfigError::ParseError(format!(
                "failed to read {}: {e}",
                path.display()
            )))
        }
    };

    let config = parse(&content)?;
    if let Err(e) = validation::validate(&config) {
        warn!(path = %path.display(), error = %e, "config does not validate");
    }
    info!(path = %path.display(), "loaded config");
    Ok(config)
}

/// Load the config at `path`, writing the commented template there first
/// if no file exists yet. The returned config is always what is on disk.
pub fn load_or_create(path: &Path) -> Result<HuddleConfig, ConfigError> {
    match load_from_path(path) {
        Err(ConfigError::FileNotFound(_)) => {
            debug!(path = %path.display(), "no config yet");
            create_default_config(path)?;
            load_from_path(path)
        }
        other => other,
    }
}

/// Load from the resolved default location (see [`default_config_path`]).
pub fn load_default() -> Result<HuddleConfig, ConfigError> {
    load_or_create(&default_config_path()?)
}

fn parse(content: &str) -> Result<HuddleConfig, ConfigError> {
    toml::from_str(content).map_err(|e| ConfigError::ParseError(format!("invalid TOML: {e}")))
}
