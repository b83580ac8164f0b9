//! Jackett aggregator: one API call fans out to every configured indexer.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::config::JackettConfig;
use crate::fetch::{FetchClient, FetchOptions};
use crate::magnet;
use crate::plugin::{
    format_size, ExtractedRow, PluginSession, RawCandidate, ScrapeError, ScraperPlugin,
};

pub const ID: &str = "jackett";
pub const NAME: &str = "Jackett";

/// Torznab audio category.
const AUDIO_CATEGORY: u32 = 3000;

// Jackett API response types
#[derive(Debug, Deserialize)]
#[allow(non_snake_case)]
struct JackettResponse {
    Results: Vec<JackettResult>,
}

#[derive(Debug, Deserialize)]
#[allow(non_snake_case)]
struct JackettResult {
    Title: String,
    MagnetUri: Option<String>,
    InfoHash: Option<String>,
    Size: Option<i64>,
    Seeders: Option<i32>,
    Peers: Option<i32>,
    Details: Option<String>,
    Tracker: Option<String>,
}

impl JackettResult {
    fn into_row(self) -> ExtractedRow {
        let magnet_uri = self.MagnetUri.filter(|m| !m.is_empty()).or_else(|| {
            self.InfoHash
                .as_deref()
                .and_then(|h| magnet::derive_from_info_hash(h, Some(&self.Title)))
        });
        let seeders = self.Seeders.unwrap_or(0).max(0);
        ExtractedRow {
            title: self.Title,
            url: self.Details,
            magnet_uri,
            size: self
                .Size
                .filter(|s| *s > 0)
                .map(|s| format_size(s as u64))
                .unwrap_or_default(),
            seeders: seeders as u32,
            leechers: self.Peers.unwrap_or(0).saturating_sub(seeders).max(0) as u32,
        }
    }
}

/// Custom-protocol plugin for a Jackett server.
pub struct JackettPlugin {
    config: JackettConfig,
    fetch: FetchClient,
    session: PluginSession,
}

impl JackettPlugin {
    pub fn new(config: JackettConfig, fetch: FetchClient) -> Self {
        Self {
            config,
            fetch,
            session: PluginSession::default(),
        }
    }

    fn search_url(&self, query: &str) -> String {
        format!(
            "{}/api/v2.0/indexers/all/results?apikey={}&Query={}&Category[]={}",
            self.config.url.trim_end_matches('/'),
            urlencoding::encode(&self.config.api_key),
            urlencoding::encode(query),
            AUDIO_CATEGORY
        )
    }
}

#[async_trait]
impl ScraperPlugin for JackettPlugin {
    fn id(&self) -> &str {
        ID
    }

    fn name(&self) -> &str {
        NAME
    }

    fn enabled(&self) -> bool {
        self.config.enabled
    }

    fn session(&self) -> &PluginSession {
        &self.session
    }

    async fn search(&self, query: &str, _page: u32) -> Result<Vec<RawCandidate>, ScrapeError> {
        let response = self
            .fetch
            .fetch(&self.search_url(query), &FetchOptions::get())
            .await?;

        if !response.ok() {
            return Err(ScrapeError::ApiError(format!(
                "HTTP {}: {}",
                response.status.as_u16(),
                response.body.chars().take(200).collect::<String>()
            )));
        }

        let parsed: JackettResponse = serde_json::from_str(&response.body)
            .map_err(|e| ScrapeError::Parse(format!("Failed to parse response: {}", e)))?;

        debug!(plugin = ID, query = %query, results = parsed.Results.len(), "Jackett search complete");

        Ok(parsed
            .Results
            .into_iter()
            .map(|r| {
                let source = r
                    .Tracker
                    .as_deref()
                    .map(|t| format!("{} ({})", NAME, t))
                    .unwrap_or_else(|| NAME.to_string());
                r.into_row().into_candidate(&source, ID, query)
            })
            .filter(|c| !c.title.is_empty())
            .collect())
    }
}
