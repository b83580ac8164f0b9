pub mod config;
pub mod dedup;
pub mod fetch;
pub mod magnet;
pub mod metrics;
pub mod orchestrator;
pub mod plugin;
pub mod query;
pub mod registry;
pub mod scoring;
pub mod sites;
pub mod testing;

pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, FetchConfig,
    SanitizedConfig, SearchConfig, ServerConfig, SitesConfig,
};
pub use dedup::deduplicate;
pub use fetch::{CookieJar, FetchClient, FetchError, FetchOptions, FetchResponse};
pub use orchestrator::SearchOrchestrator;
pub use plugin::{
    ExtractedRow, LoginRoutine, PluginInfo, PluginSession, RawCandidate, ResponseContext,
    RowExtractor, ScoredCandidate, ScrapeError, ScraperPlugin, SessionState, TemplatedScraper,
};
pub use query::{QueryExpander, QueryExpanderConfig, SearchRequest};
pub use registry::ScraperRegistry;
pub use sites::register_builtin;
