//! Built-in site plugins.

pub mod jackett;
pub mod leetx;
pub mod piratebay;
pub mod rutracker;
pub mod torrentapi;

use std::sync::Arc;

use crate::config::SitesConfig;
use crate::fetch::FetchClient;
use crate::plugin::ScrapeError;
use crate::registry::ScraperRegistry;

pub use jackett::JackettPlugin;
pub use torrentapi::TorrentApiPlugin;

/// Configured mirrors, or the built-in list when none are configured.
pub(crate) fn mirrors_or_default(configured: &[String], defaults: &[&str]) -> Vec<String> {
    if configured.is_empty() {
        defaults.iter().map(|m| m.to_string()).collect()
    } else {
        configured.to_vec()
    }
}

/// One search template per mirror base URL.
pub(crate) fn templates_for(mirrors: &[String], path: &str) -> Vec<String> {
    mirrors
        .iter()
        .map(|m| format!("{}{}", m.trim_end_matches('/'), path))
        .collect()
}

/// Register every configured built-in plugin. Returns how many were registered.
///
/// Sites without a config section are skipped. Disabled sites are still
/// registered so they show up in listings.
pub fn register_builtin(
    registry: &mut ScraperRegistry,
    config: &SitesConfig,
    fetch: &FetchClient,
) -> Result<usize, ScrapeError> {
    let before = registry.len();

    registry.register(Arc::new(leetx::build(&config.leetx, fetch.clone())?));
    registry.register(Arc::new(piratebay::build(&config.piratebay, fetch.clone())?));

    if let Some(rutracker) = &config.rutracker {
        registry.register(Arc::new(rutracker::build(rutracker, fetch.clone())?));
    }
    if let Some(torrentapi) = &config.torrentapi {
        registry.register(Arc::new(TorrentApiPlugin::new(
            torrentapi.clone(),
            fetch.clone(),
        )));
    }
    if let Some(jackett) = &config.jackett {
        registry.register(Arc::new(JackettPlugin::new(jackett.clone(), fetch.clone())));
    }

    Ok(registry.len() - before)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FetchConfig, SiteConfig};

    #[test]
    fn test_mirrors_or_default() {
        assert_eq!(
            mirrors_or_default(&[], &["https://a.example"]),
            vec!["https://a.example"]
        );
        assert_eq!(
            mirrors_or_default(&["https://b.example".to_string()], &["https://a.example"]),
            vec!["https://b.example"]
        );
    }

    #[test]
    fn test_templates_for() {
        let t = templates_for(&["https://a.example/".to_string()], "/search/{query}/");
        assert_eq!(t, vec!["https://a.example/search/{query}/"]);
    }

    #[tokio::test]
    async fn test_register_builtin_defaults() {
        let mut registry = ScraperRegistry::new();
        let fetch = FetchClient::new(&FetchConfig::default()).unwrap();
        let config = SitesConfig {
            piratebay: SiteConfig {
                enabled: false,
                mirrors: Vec::new(),
            },
            ..Default::default()
        };

        let count = register_builtin(&mut registry, &config, &fetch).unwrap();
        assert_eq!(count, 2);
        let ids: Vec<_> = registry.list().into_iter().map(|p| (p.id, p.enabled)).collect();
        assert_eq!(
            ids,
            vec![
                ("leetx".to_string(), true),
                ("piratebay".to_string(), false)
            ]
        );
    }
}
