//! RuTracker: forum tracker behind a cookie login.
//!
//! Searches need the `bb_session` cookie obtained by posting the login
//! form. Until a login succeeds the plugin returns no results.

use async_trait::async_trait;
use chrono::Utc;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use crate::config::RutrackerConfig;
use crate::fetch::{FetchClient, FetchOptions};
use crate::plugin::{
    fill_template, format_size, parse_count, select_attr, select_text, ExtractedRow,
    LoginRoutine, ResponseContext, RowExtractor, ScrapeError, SearchUrlContext, SessionState,
    TemplatedScraper,
};

use super::mirrors_or_default;

pub const ID: &str = "rutracker";
pub const NAME: &str = "RuTracker";

/// Cookie whose presence marks a successful login.
pub const SESSION_COOKIE: &str = "bb_session";

const DEFAULT_MIRRORS: &[&str] = &["https://rutracker.org", "https://rutracker.net"];
const SEARCH_PATH: &str = "/forum/tracker.php?nm={query}&start={page}";
const LOGIN_PATH: &str = "/forum/login.php";
const PAGE_SIZE: u32 = 50;

static TITLE_LINK: Lazy<Selector> =
    Lazy::new(|| Selector::parse("a.tLink, td.t-title a[href*='viewtopic']").unwrap());
static SIZE_CELL: Lazy<Selector> = Lazy::new(|| Selector::parse("td.tor-size").unwrap());
static SEEDS: Lazy<Selector> = Lazy::new(|| Selector::parse("b.seedmed, td.seedmed").unwrap());
static LEECHES: Lazy<Selector> = Lazy::new(|| Selector::parse("td.leechmed").unwrap());

struct RutrackerRow;

impl RowExtractor for RutrackerRow {
    fn extract(
        &self,
        _document: &Html,
        row: ElementRef<'_>,
        response: &ResponseContext,
    ) -> Result<Option<ExtractedRow>, ScrapeError> {
        let Some(title) = select_text(row, &TITLE_LINK) else {
            return Ok(None);
        };

        // `data-ts_text` carries the exact byte count.
        let size = select_attr(row, &SIZE_CELL, "data-ts_text")
            .and_then(|bytes| bytes.parse::<u64>().ok())
            .map(format_size)
            .or_else(|| {
                select_text(row, &SIZE_CELL).map(|t| t.trim_end_matches('↓').trim().to_string())
            })
            .unwrap_or_default();

        Ok(Some(ExtractedRow {
            title,
            url: select_attr(row, &TITLE_LINK, "href").and_then(|href| response.resolve(&href)),
            magnet_uri: None,
            size,
            seeders: select_text(row, &SEEDS).map(|t| parse_count(&t)).unwrap_or(0),
            leechers: select_text(row, &LEECHES).map(|t| parse_count(&t)).unwrap_or(0),
        }))
    }
}

/// Posts the login form and keeps the session cookie.
struct RutrackerLogin {
    mirrors: Vec<String>,
    username: String,
    password: String,
}

#[async_trait]
impl LoginRoutine for RutrackerLogin {
    async fn login(
        &self,
        fetch: &FetchClient,
        session: &SessionState,
    ) -> Result<SessionState, ScrapeError> {
        let form = FetchOptions::post_form(&[
            ("login_username", self.username.as_str()),
            ("login_password", self.password.as_str()),
            ("login", "Вход"),
        ]);

        let mut last_error = String::from("no mirror configured");
        for base in mirror_order(&self.mirrors, session.base_url.as_deref()) {
            let url = format!("{}{}", base, LOGIN_PATH);
            let response = match fetch.fetch(&url, &form).await {
                Ok(r) => r,
                Err(e) => {
                    debug!(url = %url, error = %e, "Login request failed");
                    last_error = e.to_string();
                    continue;
                }
            };

            match response.cookies.get(SESSION_COOKIE) {
                Some(value) if !value.is_empty() => {
                    return Ok(SessionState {
                        cookies: Some(format!("{}={}", SESSION_COOKIE, value)),
                        base_url: Some(format!("{}/", base)),
                        last_login: Some(Utc::now()),
                        ..Default::default()
                    });
                }
                _ => {
                    last_error = format!(
                        "{} answered {} without a {} cookie",
                        base,
                        response.status.as_u16(),
                        SESSION_COOKIE
                    );
                }
            }
        }
        Err(ScrapeError::LoginFailed(last_error))
    }
}

/// Mirrors without trailing slash, the known-good one first.
fn mirror_order(mirrors: &[String], known: Option<&str>) -> Vec<String> {
    let mut ordered: Vec<String> = Vec::with_capacity(mirrors.len() + 1);
    for m in known.into_iter().chain(mirrors.iter().map(String::as_str)) {
        let m = m.trim_end_matches('/').to_string();
        if !ordered.contains(&m) {
            ordered.push(m);
        }
    }
    ordered
}

fn search_urls(mirrors: &[String], ctx: &SearchUrlContext<'_>) -> Vec<String> {
    let offset = ctx.page.saturating_sub(1) * PAGE_SIZE;
    let path = fill_template(SEARCH_PATH, ctx.query, offset);
    mirror_order(mirrors, ctx.session.base_url.as_deref())
        .into_iter()
        .map(|b| format!("{}{}", b, path))
        .collect()
}

pub fn build(config: &RutrackerConfig, fetch: FetchClient) -> Result<TemplatedScraper, ScrapeError> {
    let mirrors = mirrors_or_default(&config.mirrors, DEFAULT_MIRRORS);
    let login = RutrackerLogin {
        mirrors: mirrors.clone(),
        username: config.username.clone(),
        password: config.password.clone(),
    };

    TemplatedScraper::builder(ID, NAME)
        .enabled(config.enabled)
        .search_resolver(move |ctx| search_urls(&mirrors, ctx))
        .rows("table#tor-tbl tbody tr")
        .extractor(RutrackerRow)
        .request_options(|session| {
            FetchOptions::get().cookies(session.cookies.as_deref().unwrap_or_default())
        })
        .login(login)
        .initial_session(SessionState {
            max_attempts: Some(config.max_login_attempts),
            ..Default::default()
        })
        .magnet_selector("a.magnet-link[href^='magnet:'], a[href^='magnet:']")
        .build(fetch)
}
