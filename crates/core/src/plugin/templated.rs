//! Declarative HTML scraper: URL template, row selector and row extractor.

use std::time::Duration;

use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;
use url::Url;

use crate::fetch::{origin_of, origin_of_str, FetchClient, FetchOptions, FetchResponse};

use super::detail::fetch_detail_page;
use super::extract::selector;
use super::{
    login_coalesced, ExtractedRow, PluginSession, RawCandidate, ScrapeError, ScraperPlugin,
    SessionState,
};

/// The final response a row is being extracted from.
#[derive(Debug, Clone)]
pub struct ResponseContext {
    /// Post-redirect URL.
    pub url: Url,
    pub status: u16,
}

impl ResponseContext {
    pub fn from_response(response: &FetchResponse) -> Self {
        Self {
            url: response.url.clone(),
            status: response.status.as_u16(),
        }
    }

    /// Resolve an href against the final URL.
    pub fn resolve(&self, href: &str) -> Option<String> {
        self.url.join(href.trim()).ok().map(|u| u.to_string())
    }
}

/// Turns one matched row into at most one result.
///
/// `Ok(None)` and `Err` both skip the row; neither stops the page.
pub trait RowExtractor: Send + Sync {
    fn extract(
        &self,
        document: &Html,
        row: ElementRef<'_>,
        response: &ResponseContext,
    ) -> Result<Option<ExtractedRow>, ScrapeError>;
}

/// Inputs available to a search-URL resolver.
#[derive(Debug, Clone, Copy)]
pub struct SearchUrlContext<'a> {
    pub query: &'a str,
    pub page: u32,
    pub session: &'a SessionState,
}

type UrlResolverFn = dyn Fn(&SearchUrlContext<'_>) -> Vec<String> + Send + Sync;
type RequestOptionsFn = dyn Fn(&SessionState) -> FetchOptions + Send + Sync;
type MagnetCallbackFn = dyn Fn(&Html, &ResponseContext) -> Option<String> + Send + Sync;

/// Where search pages live. Several URLs are mirrors, tried in order.
pub enum SearchUrl {
    /// Templates with `{query}` (URL-encoded) and `{page}` placeholders.
    Templates(Vec<String>),
    Resolver(Box<UrlResolverFn>),
}

impl SearchUrl {
    pub fn resolve(&self, ctx: &SearchUrlContext<'_>) -> Vec<String> {
        match self {
            SearchUrl::Templates(templates) => templates
                .iter()
                .map(|t| fill_template(t, ctx.query, ctx.page))
                .collect(),
            SearchUrl::Resolver(f) => f(ctx),
        }
    }
}

/// Substitute `{query}` and `{page}` in a URL template.
pub fn fill_template(template: &str, query: &str, page: u32) -> String {
    template
        .replace("{query}", &urlencoding::encode(query))
        .replace("{page}", &page.to_string())
}

/// How to find a magnet link on a detail page.
pub enum MagnetResolver {
    /// `href` of the first match.
    Selector(Selector),
    Callback(Box<MagnetCallbackFn>),
}

impl MagnetResolver {
    pub fn selector(css: &str) -> Result<Self, ScrapeError> {
        Ok(MagnetResolver::Selector(selector(css)?))
    }

    pub fn evaluate(&self, document: &Html, ctx: &ResponseContext) -> Option<String> {
        match self {
            MagnetResolver::Selector(sel) => {
                let href = document
                    .select(sel)
                    .next()
                    .and_then(|e| e.value().attr("href"))?
                    .trim();
                if href.is_empty() {
                    None
                } else if href.starts_with("magnet:") {
                    Some(href.to_string())
                } else {
                    ctx.resolve(href)
                }
            }
            MagnetResolver::Callback(f) => f(document, ctx),
        }
    }
}

/// Acquires a session for a login-gated site.
#[async_trait]
pub trait LoginRoutine: Send + Sync {
    /// Returns the session patch to merge on success.
    async fn login(
        &self,
        fetch: &FetchClient,
        session: &SessionState,
    ) -> Result<SessionState, ScrapeError>;
}

/// A scraper assembled from declarative parts.
pub struct TemplatedScraper {
    id: String,
    name: String,
    enabled: bool,
    fetch: FetchClient,
    search_url: SearchUrl,
    row_selector: Selector,
    wrap_rows: bool,
    extractor: Box<dyn RowExtractor>,
    magnet: Option<MagnetResolver>,
    request_options: Option<Box<RequestOptionsFn>>,
    login: Option<Box<dyn LoginRoutine>>,
    remember_mirror: bool,
    mirror_timeout: Duration,
    session: PluginSession,
}

impl TemplatedScraper {
    pub fn builder(id: &str, name: &str) -> TemplatedScraperBuilder {
        TemplatedScraperBuilder::new(id, name)
    }

    /// Parse a page and run the extractor over every matching row.
    fn extract_rows(&self, response: &FetchResponse, query: &str) -> Vec<RawCandidate> {
        let document = if self.wrap_rows {
            Html::parse_document(&format!("<table>{}</table>", response.body))
        } else {
            Html::parse_document(&response.body)
        };
        let ctx = ResponseContext::from_response(response);

        let mut candidates = Vec::new();
        for (index, row) in document.select(&self.row_selector).enumerate() {
            match self.extractor.extract(&document, row, &ctx) {
                Ok(Some(extracted)) if !extracted.title.trim().is_empty() => {
                    candidates.push(extracted.into_candidate(&self.name, &self.id, query));
                }
                Ok(_) => debug!(plugin = %self.id, row = index, "Row skipped: no title"),
                Err(e) => debug!(plugin = %self.id, row = index, error = %e, "Row extraction failed"),
            }
        }
        candidates
    }

    fn evaluate_magnet(&self, resolver: &MagnetResolver, response: &FetchResponse) -> Option<String> {
        let document = Html::parse_document(&response.body);
        resolver.evaluate(&document, &ResponseContext::from_response(response))
    }
}

#[async_trait]
impl ScraperPlugin for TemplatedScraper {
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

    async fn search(&self, query: &str, page: u32) -> Result<Vec<RawCandidate>, ScrapeError> {
        let mut session = self.session.snapshot().await;
        if self.login.is_some() && !session.is_logged_in() {
            if session.attempts_exhausted() {
                debug!(plugin = %self.id, "Login attempts exhausted, returning no results");
                return Ok(Vec::new());
            }
            if !login_coalesced(self, SessionState::is_logged_in).await {
                debug!(plugin = %self.id, "No session, returning no results");
                return Ok(Vec::new());
            }
            session = self.session.snapshot().await;
        }

        let urls = self.search_url.resolve(&SearchUrlContext {
            query,
            page,
            session: &session,
        });
        if urls.is_empty() {
            return Err(ScrapeError::NoMirror(self.id.clone()));
        }

        let mut options = FetchOptions::get().browser_like();
        if let Some(provider) = &self.request_options {
            options = options.merge(provider(&session));
        }
        if let Some(referer) = origin_of_str(&urls[0]) {
            options = options.default_referer(&referer);
        }

        let response = self
            .fetch
            .try_fetch_any(&urls, &options, self.mirror_timeout)
            .await
            .ok_or_else(|| ScrapeError::NoMirror(self.id.clone()))?;

        if self.remember_mirror {
            let answered = origin_of(&response.url);
            if session.base_url.as_deref() != Some(answered.as_str()) {
                self.session
                    .merge(SessionState {
                        base_url: Some(answered),
                        ..Default::default()
                    })
                    .await;
            }
        }

        let candidates = self.extract_rows(&response, query);
        debug!(
            plugin = %self.id,
            query = %query,
            url = %response.url,
            results = candidates.len(),
            "Page scraped"
        );
        Ok(candidates)
    }

    fn has_login(&self) -> bool {
        self.login.is_some()
    }

    async fn login(&self) -> Result<SessionState, ScrapeError> {
        match &self.login {
            Some(routine) => {
                let session = self.session.snapshot().await;
                routine.login(&self.fetch, &session).await
            }
            None => Ok(SessionState::default()),
        }
    }

    fn has_magnet_resolver(&self) -> bool {
        self.magnet.is_some()
    }

    async fn resolve_magnet(&self, detail_url: &str) -> Option<String> {
        let resolver = self.magnet.as_ref()?;
        let session = self.session.snapshot().await;
        let mut options = FetchOptions::get();
        if let Some(provider) = &self.request_options {
            options = options.merge(provider(&session));
        }
        let response = fetch_detail_page(&self.fetch, detail_url, options).await?;
        self.evaluate_magnet(resolver, &response)
    }
}

/// Builder for [`TemplatedScraper`].
pub struct TemplatedScraperBuilder {
    id: String,
    name: String,
    enabled: bool,
    search_url: Option<SearchUrl>,
    row_selector: Option<String>,
    wrap_rows: bool,
    extractor: Option<Box<dyn RowExtractor>>,
    magnet_css: Option<String>,
    magnet_callback: Option<Box<MagnetCallbackFn>>,
    request_options: Option<Box<RequestOptionsFn>>,
    login: Option<Box<dyn LoginRoutine>>,
    remember_mirror: bool,
    mirror_timeout: Option<Duration>,
    session: SessionState,
}

impl TemplatedScraperBuilder {
    fn new(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            enabled: true,
            search_url: None,
            row_selector: None,
            wrap_rows: false,
            extractor: None,
            magnet_css: None,
            magnet_callback: None,
            request_options: None,
            login: None,
            remember_mirror: false,
            mirror_timeout: None,
            session: SessionState::default(),
        }
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// One template per mirror, tried in order.
    pub fn search_templates<I, S>(mut self, templates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.search_url = Some(SearchUrl::Templates(
            templates.into_iter().map(Into::into).collect(),
        ));
        self
    }

    pub fn search_resolver<F>(mut self, resolver: F) -> Self
    where
        F: Fn(&SearchUrlContext<'_>) -> Vec<String> + Send + Sync + 'static,
    {
        self.search_url = Some(SearchUrl::Resolver(Box::new(resolver)));
        self
    }

    pub fn rows(mut self, css: &str) -> Self {
        self.row_selector = Some(css.to_string());
        self
    }

    /// The endpoint returns bare `<tr>` fragments; wrap them in a table
    /// before parsing.
    pub fn wrap_row_fragments(mut self) -> Self {
        self.wrap_rows = true;
        self
    }

    pub fn extractor<E: RowExtractor + 'static>(mut self, extractor: E) -> Self {
        self.extractor = Some(Box::new(extractor));
        self
    }

    pub fn magnet_selector(mut self, css: &str) -> Self {
        self.magnet_css = Some(css.to_string());
        self
    }

    pub fn magnet_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(&Html, &ResponseContext) -> Option<String> + Send + Sync + 'static,
    {
        self.magnet_callback = Some(Box::new(callback));
        self
    }

    pub fn request_options<F>(mut self, provider: F) -> Self
    where
        F: Fn(&SessionState) -> FetchOptions + Send + Sync + 'static,
    {
        self.request_options = Some(Box::new(provider));
        self
    }

    pub fn login<L: LoginRoutine + 'static>(mut self, routine: L) -> Self {
        self.login = Some(Box::new(routine));
        self
    }

    /// Record the origin of the mirror that answered as `base_url`.
    pub fn remember_mirror(mut self) -> Self {
        self.remember_mirror = true;
        self
    }

    pub fn mirror_timeout(mut self, timeout: Duration) -> Self {
        self.mirror_timeout = Some(timeout);
        self
    }

    pub fn initial_session(mut self, session: SessionState) -> Self {
        self.session = session;
        self
    }

    pub fn build(self, fetch: FetchClient) -> Result<TemplatedScraper, ScrapeError> {
        let search_url = self
            .search_url
            .ok_or_else(|| ScrapeError::Config(format!("{}: no search URL", self.id)))?;
        let row_css = self
            .row_selector
            .ok_or_else(|| ScrapeError::Config(format!("{}: no row selector", self.id)))?;
        let extractor = self
            .extractor
            .ok_or_else(|| ScrapeError::Config(format!("{}: no row extractor", self.id)))?;

        let magnet = match (self.magnet_css, self.magnet_callback) {
            (_, Some(callback)) => Some(MagnetResolver::Callback(callback)),
            (Some(css), None) => Some(MagnetResolver::selector(&css)?),
            (None, None) => None,
        };

        let mirror_timeout = self.mirror_timeout.unwrap_or_else(|| fetch.mirror_timeout());

        Ok(TemplatedScraper {
            id: self.id,
            name: self.name,
            enabled: self.enabled,
            fetch,
            search_url,
            row_selector: selector(&row_css)?,
            wrap_rows: self.wrap_rows,
            extractor,
            magnet,
            request_options: self.request_options,
            login: self.login,
            remember_mirror: self.remember_mirror,
            mirror_timeout,
            session: PluginSession::new(self.session),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fill_template_encodes_query() {
        assert_eq!(
            fill_template("https://s.example/search/{query}/{page}/", "abbey road & co", 2),
            "https://s.example/search/abbey%20road%20%26%20co/2/"
        );
    }

    #[test]
    fn test_search_url_resolver_sees_session() {
        fn base_first(ctx: &SearchUrlContext<'_>) -> Vec<String> {
            let base = ctx.session.base_url.clone().unwrap_or_default();
            vec![format!("{}q={}", base, ctx.query)]
        }
        let url = SearchUrl::Resolver(Box::new(base_first));
        let session = SessionState {
            base_url: Some("https://m.example/?".to_string()),
            ..Default::default()
        };
        let urls = url.resolve(&SearchUrlContext {
            query: "x",
            page: 1,
            session: &session,
        });
        assert_eq!(urls, vec!["https://m.example/?q=x"]);
    }

    #[test]
    fn test_magnet_selector_returns_first_href() {
        let doc = Html::parse_document(
            r#"<html><body>
                <a href="/download/1">Download</a>
                <a class="m" href="magnet:?xt=urn:btih:aaa">Magnet</a>
                <a class="m" href="magnet:?xt=urn:btih:bbb">Magnet 2</a>
            </body></html>"#,
        );
        let ctx = ResponseContext {
            url: Url::parse("https://site.example/t/1").unwrap(),
            status: 200,
        };

        let resolver = MagnetResolver::selector("a[href^='magnet:']").unwrap();
        assert_eq!(
            resolver.evaluate(&doc, &ctx).as_deref(),
            Some("magnet:?xt=urn:btih:aaa")
        );

        let relative = MagnetResolver::selector("a").unwrap();
        assert_eq!(
            relative.evaluate(&doc, &ctx).as_deref(),
            Some("https://site.example/download/1")
        );

        let missing = MagnetResolver::selector("a.nope").unwrap();
        assert!(missing.evaluate(&doc, &ctx).is_none());
    }

    #[test]
    fn test_response_context_resolves_against_final_url() {
        let ctx = ResponseContext {
            url: Url::parse("https://mirror2.example/search/x/1/").unwrap(),
            status: 200,
        };
        assert_eq!(
            ctx.resolve("/torrent/42/name/").as_deref(),
            Some("https://mirror2.example/torrent/42/name/")
        );
        assert_eq!(
            ctx.resolve("https://other.example/a").as_deref(),
            Some("https://other.example/a")
        );
    }
}
