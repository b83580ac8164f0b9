use serde::{Deserialize, Serialize};
use std::net::IpAddr;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub sites: SitesConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_port() -> u16 {
    8080
}

/// Outbound HTTP behavior shared by all plugins.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FetchConfig {
    /// Redirect hops followed before giving up (default: 5)
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,
    /// Timeout for one mirror attempt in milliseconds (default: 4000)
    #[serde(default = "default_mirror_timeout_ms")]
    pub mirror_timeout_ms: u64,
    /// Whole-request timeout on the HTTP client in seconds (default: 15)
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_redirects: default_max_redirects(),
            mirror_timeout_ms: default_mirror_timeout_ms(),
            request_timeout_secs: default_request_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_max_redirects() -> usize {
    5
}

fn default_mirror_timeout_ms() -> u64 {
    4000
}

fn default_request_timeout_secs() -> u64 {
    15
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36"
        .to_string()
}

/// Fan-out, ranking and fallback tuning.
///
/// The selection constants were tuned empirically; they are exposed rather
/// than hard-coded.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SearchConfig {
    /// Harvest deadline for the plugin fan-out (default: 3000)
    #[serde(default = "default_deadline_ms")]
    pub deadline_ms: u64,
    /// Minimum score to keep a candidate (default: 1)
    #[serde(default = "default_min_score")]
    pub min_score: u8,
    /// Share of candidates sent to magnet resolution when none pass
    /// `min_score` (default: 0.25)
    #[serde(default = "default_resolve_fraction")]
    pub resolve_fraction: f32,
    #[serde(default = "default_resolve_min")]
    pub resolve_min: usize,
    #[serde(default = "default_resolve_max")]
    pub resolve_max: usize,
    /// Size of the last-resort pool when nothing passes the threshold
    #[serde(default = "default_fallback_limit")]
    pub fallback_limit: usize,
    /// Concurrent detail-page fetches during magnet resolution
    #[serde(default = "default_resolve_concurrency")]
    pub resolve_concurrency: usize,
    #[serde(default = "default_max_variants")]
    pub max_variants: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            deadline_ms: default_deadline_ms(),
            min_score: default_min_score(),
            resolve_fraction: default_resolve_fraction(),
            resolve_min: default_resolve_min(),
            resolve_max: default_resolve_max(),
            fallback_limit: default_fallback_limit(),
            resolve_concurrency: default_resolve_concurrency(),
            max_variants: default_max_variants(),
        }
    }
}

fn default_deadline_ms() -> u64 {
    3000
}

fn default_min_score() -> u8 {
    1
}

fn default_resolve_fraction() -> f32 {
    0.25
}

fn default_resolve_min() -> usize {
    5
}

fn default_resolve_max() -> usize {
    15
}

fn default_fallback_limit() -> usize {
    15
}

fn default_resolve_concurrency() -> usize {
    8
}

fn default_max_variants() -> usize {
    6
}

/// Per-site plugin settings.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SitesConfig {
    #[serde(default)]
    pub leetx: SiteConfig,
    #[serde(default)]
    pub piratebay: SiteConfig,
    #[serde(default)]
    pub rutracker: Option<RutrackerConfig>,
    #[serde(default)]
    pub torrentapi: Option<TorrentApiConfig>,
    #[serde(default)]
    pub jackett: Option<JackettConfig>,
}

/// Settings for a public HTML site.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SiteConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Base URLs to try in order; empty means the built-in list
    #[serde(default)]
    pub mirrors: Vec<String>,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            mirrors: Vec::new(),
        }
    }
}

fn default_true() -> bool {
    true
}

/// Login-gated forum tracker.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RutrackerConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub mirrors: Vec<String>,
    pub username: String,
    pub password: String,
    /// Consecutive failed logins before the plugin stops trying (default: 3)
    #[serde(default = "default_max_login_attempts")]
    pub max_login_attempts: u32,
}

fn default_max_login_attempts() -> u32 {
    3
}

/// Token-gated JSON API.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TorrentApiConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_torrentapi_url")]
    pub url: String,
    /// Application identifier sent with every request
    #[serde(default = "default_app_id")]
    pub app_id: String,
    #[serde(default = "default_max_login_attempts")]
    pub max_token_attempts: u32,
}

fn default_torrentapi_url() -> String {
    "https://torrentapi.org/pubapi_v2.php".to_string()
}

fn default_app_id() -> String {
    "tunehound".to_string()
}

/// Jackett aggregator configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct JackettConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Jackett server URL (e.g., "http://localhost:9117")
    pub url: String,
    /// Jackett API key
    pub api_key: String,
}

/// Sanitized config for API responses (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: ServerConfig,
    pub fetch: FetchConfig,
    pub search: SearchConfig,
    pub sites: Vec<SanitizedSiteConfig>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedSiteConfig {
    pub id: String,
    pub enabled: bool,
    pub credentials_configured: bool,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        let sites = &config.sites;
        let mut entries = vec![
            SanitizedSiteConfig {
                id: "leetx".to_string(),
                enabled: sites.leetx.enabled,
                credentials_configured: false,
            },
            SanitizedSiteConfig {
                id: "piratebay".to_string(),
                enabled: sites.piratebay.enabled,
                credentials_configured: false,
            },
        ];
        if let Some(r) = &sites.rutracker {
            entries.push(SanitizedSiteConfig {
                id: "rutracker".to_string(),
                enabled: r.enabled,
                credentials_configured: !r.username.is_empty() && !r.password.is_empty(),
            });
        }
        if let Some(t) = &sites.torrentapi {
            entries.push(SanitizedSiteConfig {
                id: "torrentapi".to_string(),
                enabled: t.enabled,
                credentials_configured: !t.app_id.is_empty(),
            });
        }
        if let Some(j) = &sites.jackett {
            entries.push(SanitizedSiteConfig {
                id: "jackett".to_string(),
                enabled: j.enabled,
                credentials_configured: !j.api_key.is_empty(),
            });
        }

        Self {
            server: config.server.clone(),
            fetch: config.fetch.clone(),
            search: config.search.clone(),
            sites: entries,
        }
    }
}
