use super::{types::Config, ConfigError};

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    if config.fetch.max_redirects == 0 {
        return Err(ConfigError::ValidationError(
            "fetch.max_redirects cannot be 0".to_string(),
        ));
    }

    let search = &config.search;
    if search.deadline_ms == 0 {
        return Err(ConfigError::ValidationError(
            "search.deadline_ms cannot be 0".to_string(),
        ));
    }
    if !(search.resolve_fraction > 0.0 && search.resolve_fraction <= 1.0) {
        return Err(ConfigError::ValidationError(format!(
            "search.resolve_fraction must be in (0, 1], got {}",
            search.resolve_fraction
        )));
    }
    if search.resolve_min > search.resolve_max {
        return Err(ConfigError::ValidationError(format!(
            "search.resolve_min ({}) exceeds search.resolve_max ({})",
            search.resolve_min, search.resolve_max
        )));
    }
    if search.resolve_concurrency == 0 {
        return Err(ConfigError::ValidationError(
            "search.resolve_concurrency cannot be 0".to_string(),
        ));
    }
    if search.max_variants == 0 {
        return Err(ConfigError::ValidationError(
            "search.max_variants cannot be 0".to_string(),
        ));
    }

    if let Some(r) = &config.sites.rutracker {
        if r.enabled && (r.username.is_empty() || r.password.is_empty()) {
            return Err(ConfigError::ValidationError(
                "sites.rutracker is enabled but username/password is empty".to_string(),
            ));
        }
    }

    if let Some(j) = &config.sites.jackett {
        if j.enabled && (j.url.is_empty() || j.api_key.is_empty()) {
            return Err(ConfigError::ValidationError(
                "sites.jackett is enabled but url/api_key is empty".to_string(),
            ));
        }
    }

    Ok(())
}
