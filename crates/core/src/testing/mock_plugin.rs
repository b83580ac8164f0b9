//! Mock scraper plugin for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::plugin::{
    ExtractedRow, PluginSession, RawCandidate, ScrapeError, ScraperPlugin, SessionState,
};

/// How a mock search behaves.
#[derive(Debug, Clone)]
enum Behavior {
    Results,
    Fail(String),
    /// Never completes.
    Hang,
}

/// Mock implementation of [`ScraperPlugin`].
///
/// Provides controllable behavior for testing:
/// - Return configured rows for every query
/// - Fail, hang forever, or answer after a delay
/// - Log in with a cookie or fail to
/// - Resolve detail URLs from a fixed map
///
/// # Example
///
/// ```rust,ignore
/// use tunehound_core::testing::{fixtures, MockPlugin};
///
/// let plugin = MockPlugin::new("fast")
///     .with_rows(vec![fixtures::row("Abbey Road FLAC", "aaaa...")])
///     .with_delay(Duration::from_millis(100));
/// ```
pub struct MockPlugin {
    id: String,
    name: String,
    enabled: bool,
    rows: Vec<ExtractedRow>,
    behavior: Behavior,
    delay: Option<Duration>,
    login_result: Option<Result<String, String>>,
    login_delay: Option<Duration>,
    magnets: HashMap<String, String>,
    session: PluginSession,
    searches: Arc<RwLock<Vec<String>>>,
    login_calls: AtomicUsize,
    resolve_calls: AtomicUsize,
}

impl std::fmt::Debug for MockPlugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockPlugin")
            .field("id", &self.id)
            .field("enabled", &self.enabled)
            .field("rows", &self.rows.len())
            .field("behavior", &self.behavior)
            .finish()
    }
}

impl MockPlugin {
    /// An enabled plugin named after its id, returning nothing.
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            name: id.to_string(),
            enabled: true,
            rows: Vec::new(),
            behavior: Behavior::Results,
            delay: None,
            login_result: None,
            login_delay: None,
            magnets: HashMap::new(),
            session: PluginSession::default(),
            searches: Arc::new(RwLock::new(Vec::new())),
            login_calls: AtomicUsize::new(0),
            resolve_calls: AtomicUsize::new(0),
        }
    }

    pub fn named(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Rows returned for every query.
    pub fn with_rows(mut self, rows: Vec<ExtractedRow>) -> Self {
        self.rows = rows;
        self
    }

    /// Sleep before answering each search.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Every search fails with `message`.
    pub fn failing(mut self, message: &str) -> Self {
        self.behavior = Behavior::Fail(message.to_string());
        self
    }

    /// Every search hangs forever.
    pub fn never_resolving(mut self) -> Self {
        self.behavior = Behavior::Hang;
        self
    }

    /// Declare a login routine. `Ok(cookie)` logs in with that cookie string.
    pub fn with_login(mut self, result: Result<&str, &str>) -> Self {
        self.login_result = Some(result.map(str::to_string).map_err(str::to_string));
        self
    }

    pub fn with_login_delay(mut self, delay: Duration) -> Self {
        self.login_delay = Some(delay);
        self
    }

    /// Declare a magnet resolver answering from a fixed detail-URL map.
    pub fn with_magnet(mut self, detail_url: &str, magnet: &str) -> Self {
        self.magnets.insert(detail_url.to_string(), magnet.to_string());
        self
    }

    /// Queries searched so far, in call order.
    pub async fn recorded_queries(&self) -> Vec<String> {
        self.searches.read().await.clone()
    }

    pub async fn search_count(&self) -> usize {
        self.searches.read().await.len()
    }

    pub fn login_calls(&self) -> usize {
        self.login_calls.load(Ordering::SeqCst)
    }

    pub fn resolve_calls(&self) -> usize {
        self.resolve_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ScraperPlugin for MockPlugin {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn enabled(&self) -> bool {
        self.enabled
    }

    fn session(&self) -> &PluginSession {
        &self.session
    }

    async fn search(&self, query: &str, _page: u32) -> Result<Vec<RawCandidate>, ScrapeError> {
        self.searches.write().await.push(query.to_string());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match &self.behavior {
            Behavior::Results => Ok(self
                .rows
                .iter()
                .cloned()
                .map(|row| row.into_candidate(&self.name, &self.id, query))
                .collect()),
            Behavior::Fail(message) => Err(ScrapeError::ApiError(message.clone())),
            Behavior::Hang => std::future::pending().await,
        }
    }

    fn has_login(&self) -> bool {
        self.login_result.is_some()
    }

    async fn login(&self) -> Result<SessionState, ScrapeError> {
        self.login_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.login_delay {
            tokio::time::sleep(delay).await;
        }
        match &self.login_result {
            Some(Ok(cookies)) => Ok(SessionState {
                cookies: Some(cookies.clone()),
                ..Default::default()
            }),
            Some(Err(message)) => Err(ScrapeError::LoginFailed(message.clone())),
            None => Ok(SessionState::default()),
        }
    }

    fn has_magnet_resolver(&self) -> bool {
        !self.magnets.is_empty()
    }

    async fn resolve_magnet(&self, detail_url: &str) -> Option<String> {
        self.resolve_calls.fetch_add(1, Ordering::SeqCst);
        self.magnets.get(detail_url).cloned()
    }
}
