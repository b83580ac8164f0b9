//! Candidate types flowing from plugins through ranking.

use serde::{Deserialize, Serialize};

/// What a row extractor produces for one result row.
///
/// The scraper tags it with source, query and plugin before it becomes a
/// [`RawCandidate`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedRow {
    pub title: String,
    /// Absolute detail-page URL.
    pub url: Option<String>,
    pub magnet_uri: Option<String>,
    /// Human-readable size as shown by the site ("1.2 GB").
    pub size: String,
    pub seeders: u32,
    pub leechers: u32,
}

impl ExtractedRow {
    pub fn into_candidate(self, source: &str, plugin_id: &str, query: &str) -> RawCandidate {
        RawCandidate {
            source: source.to_string(),
            title: self.title.trim().to_string(),
            url: self.url,
            magnet_uri: self.magnet_uri,
            size: self.size.trim().to_string(),
            seeders: self.seeders,
            leechers: self.leechers,
            query: query.to_string(),
            plugin_id: plugin_id.to_string(),
        }
    }
}

/// One unscored search result from one plugin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawCandidate {
    /// Display name of the plugin that produced it.
    pub source: String,
    pub title: String,
    pub url: Option<String>,
    pub magnet_uri: Option<String>,
    pub size: String,
    pub seeders: u32,
    pub leechers: u32,
    /// The query variant that produced it.
    pub query: String,
    /// Registry id of the originating plugin.
    pub plugin_id: String,
}

/// A candidate with its relevance score, as returned to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredCandidate {
    pub source: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(rename = "magnetURI")]
    pub magnet_uri: Option<String>,
    pub size: String,
    pub seeders: u32,
    pub leechers: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info_hash: Option<String>,
    /// 0..=100
    pub score: u8,
    #[serde(skip)]
    pub query: String,
    #[serde(skip)]
    pub plugin_id: String,
}

impl ScoredCandidate {
    pub fn new(raw: RawCandidate, score: u8) -> Self {
        Self {
            source: raw.source,
            title: raw.title,
            url: raw.url,
            magnet_uri: raw.magnet_uri,
            size: raw.size,
            seeders: raw.seeders,
            leechers: raw.leechers,
            info_hash: None,
            score: score.min(100),
            query: raw.query,
            plugin_id: raw.plugin_id,
        }
    }

    pub fn has_magnet(&self) -> bool {
        self.magnet_uri.as_deref().is_some_and(|m| !m.is_empty())
    }
}

/// Registry listing entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginInfo {
    pub id: String,
    pub name: String,
    pub enabled: bool,
}
