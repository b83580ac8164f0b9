use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use std::path::Path;

use super::{types::Config, ConfigError};

/// Environment variables with this prefix override file values.
pub const ENV_PREFIX: &str = "TUNEHOUND_";

/// Read the TOML file at `path`, then apply `TUNEHOUND_*` overrides.
///
/// Sections nest with a double underscore, so `TUNEHOUND_SEARCH__DEADLINE_MS`
/// sets `search.deadline_ms` and `TUNEHOUND_SITES__RUTRACKER__PASSWORD` keeps
/// the forum password out of the file.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }

    Figment::new()
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))
}

/// Parse a config from TOML text, without environment overrides.
pub fn load_config_from_str(toml_str: &str) -> Result<Config, ConfigError> {
    toml::from_str(toml_str).map_err(|e| ConfigError::ParseError(e.to_string()))
}
