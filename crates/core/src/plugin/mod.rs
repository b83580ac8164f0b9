//! Scraper plugin contract.
//!
//! A plugin adapts one torrent index to [`RawCandidate`]s. Most sites are
//! described declaratively with [`TemplatedScraper`]; sites speaking a
//! JSON protocol implement [`ScraperPlugin`] directly.

mod detail;
mod extract;
mod login;
mod session;
mod templated;
mod types;

pub use detail::fetch_detail_page;
pub use extract::{format_size, parse_count, select_attr, select_text, selector, text_of};
pub use login::login_coalesced;
pub use session::{PluginSession, SessionState};
pub use templated::{
    fill_template, LoginRoutine, MagnetResolver, ResponseContext, RowExtractor, SearchUrl,
    SearchUrlContext, TemplatedScraper, TemplatedScraperBuilder,
};
pub use types::{ExtractedRow, PluginInfo, RawCandidate, ScoredCandidate};

use async_trait::async_trait;
use thiserror::Error;

use crate::fetch::FetchError;

/// Errors a plugin can raise. The orchestrator absorbs all of them.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("No mirror answered for {0}")]
    NoMirror(String),

    #[error("Invalid selector: {0}")]
    InvalidSelector(String),

    #[error("Login failed: {0}")]
    LoginFailed(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Unexpected payload: {0}")]
    Parse(String),

    #[error("Plugin misconfigured: {0}")]
    Config(String),

    #[error(transparent)]
    Fetch(#[from] FetchError),
}

/// One pluggable index adapter.
#[async_trait]
pub trait ScraperPlugin: Send + Sync {
    /// Stable registry key.
    fn id(&self) -> &str;

    /// Display name, reported as a candidate's `source`.
    fn name(&self) -> &str;

    fn enabled(&self) -> bool;

    /// The plugin's session. The registry merges login results into it.
    fn session(&self) -> &PluginSession;

    /// Search one page. Failing is allowed; the caller treats it as zero results.
    async fn search(&self, query: &str, page: u32) -> Result<Vec<RawCandidate>, ScrapeError>;

    fn has_login(&self) -> bool {
        false
    }

    /// Acquire a session, returning the patch to merge.
    async fn login(&self) -> Result<SessionState, ScrapeError> {
        Ok(SessionState::default())
    }

    fn has_magnet_resolver(&self) -> bool {
        false
    }

    /// Fetch a detail page and pull its magnet link. `None` leaves the
    /// candidate without one.
    async fn resolve_magnet(&self, _detail_url: &str) -> Option<String> {
        None
    }

    fn info(&self) -> PluginInfo {
        PluginInfo {
            id: self.id().to_string(),
            name: self.name().to_string(),
            enabled: self.enabled(),
        }
    }
}
