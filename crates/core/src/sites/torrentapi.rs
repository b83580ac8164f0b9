//! Token-gated JSON torrent API.
//!
//! Every request carries a short-lived token from `get_token`. Tokens are
//! refreshed once they are 14 minutes old or the API rejects them.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use tracing::debug;

use crate::config::TorrentApiConfig;
use crate::fetch::FetchClient;
use crate::fetch::FetchOptions;
use crate::magnet;
use crate::plugin::{
    format_size, login_coalesced, ExtractedRow, PluginSession, RawCandidate, ScrapeError,
    ScraperPlugin, SessionState,
};

pub const ID: &str = "torrentapi";
pub const NAME: &str = "TorrentAPI";

/// Music categories (MP3, FLAC, lossless).
const MUSIC_CATEGORIES: &str = "23;24;25";
const RESULT_LIMIT: u32 = 100;

const ERROR_INVALID_TOKEN: i64 = 2;
const ERROR_EXPIRED_TOKEN: i64 = 4;
const ERROR_NO_RESULTS: i64 = 20;

fn token_ttl() -> Duration {
    Duration::minutes(14)
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    torrent_results: Option<Vec<ApiTorrent>>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_code: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct ApiTorrent {
    #[serde(alias = "filename")]
    title: String,
    #[serde(default)]
    download: Option<String>,
    #[serde(default)]
    seeders: Option<i64>,
    #[serde(default)]
    leechers: Option<i64>,
    #[serde(default)]
    size: Option<u64>,
    #[serde(default)]
    info_page: Option<String>,
}

impl ApiTorrent {
    fn into_row(self) -> ExtractedRow {
        let magnet_uri = self
            .download
            .filter(|d| d.starts_with("magnet:"))
            .or_else(|| {
                self.info_page
                    .as_deref()
                    .and_then(magnet::hash_in_url)
                    .and_then(|h| magnet::derive_from_info_hash(&h, Some(&self.title)))
            });
        ExtractedRow {
            title: self.title,
            url: self.info_page,
            magnet_uri,
            size: self.size.map(format_size).unwrap_or_default(),
            seeders: self.seeders.unwrap_or(0).max(0) as u32,
            leechers: self.leechers.unwrap_or(0).max(0) as u32,
        }
    }
}

enum Outcome {
    Results(Vec<ApiTorrent>),
    TokenRejected,
}

/// Custom-protocol plugin for the token API.
pub struct TorrentApiPlugin {
    config: TorrentApiConfig,
    fetch: FetchClient,
    session: PluginSession,
}

impl TorrentApiPlugin {
    pub fn new(config: TorrentApiConfig, fetch: FetchClient) -> Self {
        let session = PluginSession::new(SessionState {
            max_attempts: Some(config.max_token_attempts),
            ..Default::default()
        });
        Self {
            config,
            fetch,
            session,
        }
    }

    fn is_fresh(session: &SessionState, now: DateTime<Utc>) -> bool {
        match (&session.token, session.token_acquired_at) {
            (Some(token), Some(at)) => !token.is_empty() && now - at < token_ttl(),
            _ => false,
        }
    }

    async fn fresh_token(&self) -> Option<String> {
        let current = self.session.snapshot().await;
        if Self::is_fresh(&current, Utc::now()) {
            current.token
        } else {
            None
        }
    }

    /// A usable token, acquiring a new one when missing or stale.
    ///
    /// Concurrent callers share one acquisition. `Ok(None)` once the
    /// configured number of token attempts has failed.
    pub async fn get_token(&self) -> Result<Option<String>, ScrapeError> {
        if let Some(token) = self.fresh_token().await {
            return Ok(Some(token));
        }
        if self.session.snapshot().await.attempts_exhausted() {
            return Ok(None);
        }

        login_coalesced(self, |current| Self::is_fresh(current, Utc::now())).await;

        if let Some(token) = self.fresh_token().await {
            return Ok(Some(token));
        }
        if self.session.snapshot().await.attempts_exhausted() {
            Ok(None)
        } else {
            Err(ScrapeError::LoginFailed("no API token".to_string()))
        }
    }

    /// Drop `token` unless another task already replaced it.
    async fn invalidate(&self, token: &str) {
        if self.session.snapshot().await.token.as_deref() == Some(token) {
            self.session.reset_login().await;
        }
    }

    async fn acquire_token(&self) -> Result<SessionState, ScrapeError> {
        let url = format!(
            "{}?get_token=get_token&app_id={}",
            self.config.url,
            urlencoding::encode(&self.config.app_id)
        );
        let response = self.fetch.fetch(&url, &FetchOptions::get()).await?;
        if !response.ok() {
            return Err(ScrapeError::ApiError(format!(
                "get_token answered HTTP {}",
                response.status.as_u16()
            )));
        }
        let parsed: TokenResponse = serde_json::from_str(&response.body)
            .map_err(|e| ScrapeError::Parse(format!("token response: {}", e)))?;
        let token = parsed
            .token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ScrapeError::ApiError("get_token returned no token".to_string()))?;

        debug!(plugin = ID, "Acquired API token");
        let now = Utc::now();
        Ok(SessionState {
            token: Some(token),
            token_acquired_at: Some(now),
            last_login: Some(now),
            ..Default::default()
        })
    }

    async fn query(&self, token: &str, query: &str) -> Result<Outcome, ScrapeError> {
        let url = format!(
            "{}?mode=search&search_string={}&category={}&format=json_extended&ranked=0&limit={}&token={}&app_id={}",
            self.config.url,
            urlencoding::encode(query),
            urlencoding::encode(MUSIC_CATEGORIES),
            RESULT_LIMIT,
            urlencoding::encode(token),
            urlencoding::encode(&self.config.app_id),
        );
        let response = self.fetch.fetch(&url, &FetchOptions::get()).await?;
        if !response.ok() {
            return Err(ScrapeError::ApiError(format!(
                "search answered HTTP {}",
                response.status.as_u16()
            )));
        }
        let parsed: SearchResponse = serde_json::from_str(&response.body)
            .map_err(|e| ScrapeError::Parse(format!("search response: {}", e)))?;

        match parsed.error_code {
            Some(ERROR_INVALID_TOKEN) | Some(ERROR_EXPIRED_TOKEN) => Ok(Outcome::TokenRejected),
            Some(ERROR_NO_RESULTS) => Ok(Outcome::Results(Vec::new())),
            Some(code) => Err(ScrapeError::ApiError(format!(
                "error {}: {}",
                code,
                parsed.error.unwrap_or_default()
            ))),
            None => Ok(Outcome::Results(parsed.torrent_results.unwrap_or_default())),
        }
    }
}

#[async_trait]
impl ScraperPlugin for TorrentApiPlugin {
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
        let Some(token) = self.get_token().await? else {
            debug!(plugin = ID, "Token attempts exhausted, returning no results");
            return Ok(Vec::new());
        };
        let torrents = match self.query(&token, query).await? {
            Outcome::Results(torrents) => torrents,
            Outcome::TokenRejected => {
                debug!(plugin = ID, "Token rejected, acquiring a new one");
                self.invalidate(&token).await;
                let Some(token) = self.get_token().await? else {
                    return Ok(Vec::new());
                };
                match self.query(&token, query).await? {
                    Outcome::Results(torrents) => torrents,
                    Outcome::TokenRejected => {
                        self.invalidate(&token).await;
                        return Err(ScrapeError::ApiError("fresh token rejected".to_string()));
                    }
                }
            }
        };

        Ok(torrents
            .into_iter()
            .map(|t| t.into_row().into_candidate(NAME, ID, query))
            .filter(|c| !c.title.is_empty())
            .collect())
    }

    fn has_login(&self) -> bool {
        true
    }

    async fn login(&self) -> Result<SessionState, ScrapeError> {
        self.acquire_token().await
    }
}
