//! Built-in and declarative scrapers against a local fake site.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Form, Path, Query};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{Html as HtmlResponse, IntoResponse};
use axum::routing::{get, post};
use axum::{Json, Router};
use scraper::{ElementRef, Html};
use serde_json::json;

use tunehound_core::config::{RutrackerConfig, SiteConfig, TorrentApiConfig};
use tunehound_core::plugin::{select_text, selector};
use tunehound_core::sites::{leetx, piratebay, rutracker, TorrentApiPlugin};
use tunehound_core::{
    ExtractedRow, FetchClient, FetchConfig, FetchOptions, LoginRoutine, ResponseContext,
    RowExtractor, ScrapeError, ScraperPlugin, ScraperRegistry, SessionState, TemplatedScraper,
};

const DEAD_MIRROR: &str = "http://127.0.0.1:1";
const HASH: &str = "0123456789abcdef0123456789abcdef01234567";

async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

fn fetch() -> FetchClient {
    FetchClient::new(&FetchConfig {
        mirror_timeout_ms: 1000,
        ..FetchConfig::default()
    })
    .unwrap()
}

fn cookie(headers: &HeaderMap) -> String {
    headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

// -----------------------------------------------------------------------------
// 1337x-shaped site with a bot check on detail pages
// -----------------------------------------------------------------------------

fn leetx_site() -> Router {
    Router::new()
        .route(
            "/search/{query}/{page}/",
            get(|Path((query, page)): Path<(String, u32)>| async move {
                HtmlResponse(format!(
                    r#"<table class="table-list"><tbody>
                      <tr>
                        <td class="coll-1"><a href="/torrent/1/abbey/">{query} FLAC</a></td>
                        <td class="coll-2">40</td><td class="coll-3">4</td>
                        <td class="coll-4">310.2 MB<span>40</span></td>
                      </tr>
                      <tr><td class="coll-1">page {page} footer</td></tr>
                    </tbody></table>"#
                ))
            }),
        )
        .route(
            "/",
            get(|| async {
                ([(header::SET_COOKIE, "cf_clearance=ok; Path=/")], "home")
            }),
        )
        .route(
            "/torrent/1/abbey/",
            get(|headers: HeaderMap| async move {
                let c = cookie(&headers);
                let referer = headers
                    .get(header::REFERER)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default()
                    .to_string();
                if !c.contains("cf_clearance=ok") || referer.is_empty() {
                    return StatusCode::FORBIDDEN.into_response();
                }
                HtmlResponse(format!(
                    r#"<ul><li><a href="magnet:?xt=urn:btih:{HASH}&amp;dn=Abbey">Magnet</a></li></ul>"#
                ))
                .into_response()
            }),
        )
}

#[tokio::test]
async fn test_leetx_search_falls_back_to_live_mirror() {
    let base = serve(leetx_site()).await;
    let plugin = leetx::build(
        &SiteConfig {
            enabled: true,
            mirrors: vec![DEAD_MIRROR.to_string(), base.clone()],
        },
        fetch(),
    )
    .unwrap();

    let results = plugin.search("Abbey Road", 1).await.unwrap();
    assert_eq!(results.len(), 1);
    let first = &results[0];
    assert_eq!(first.title, "Abbey Road FLAC");
    assert_eq!(first.source, "1337x");
    assert_eq!(first.plugin_id, "leetx");
    assert_eq!(first.query, "Abbey Road");
    assert_eq!(first.seeders, 40);
    assert_eq!(first.size, "310.2 MB");
    assert_eq!(first.url.as_deref(), Some(format!("{}/torrent/1/abbey/", base).as_str()));
}

#[tokio::test]
async fn test_detail_magnet_retries_after_cookie_preflight() {
    let base = serve(leetx_site()).await;
    let plugin = leetx::build(
        &SiteConfig {
            enabled: true,
            mirrors: vec![base.clone()],
        },
        fetch(),
    )
    .unwrap();

    assert!(plugin.has_magnet_resolver());
    let magnet = plugin
        .resolve_magnet(&format!("{}/torrent/1/abbey/", base))
        .await
        .unwrap();
    assert_eq!(magnet, format!("magnet:?xt=urn:btih:{}&dn=Abbey", HASH));

    assert!(plugin
        .resolve_magnet(&format!("{}/torrent/404/", base))
        .await
        .is_none());
}

#[tokio::test]
async fn test_all_mirrors_down_is_an_error() {
    let plugin = leetx::build(
        &SiteConfig {
            enabled: true,
            mirrors: vec![DEAD_MIRROR.to_string()],
        },
        fetch(),
    )
    .unwrap();
    assert!(matches!(
        plugin.search("x", 1).await,
        Err(ScrapeError::NoMirror(_))
    ));
}

// -----------------------------------------------------------------------------
// Pirate Bay-shaped site: inline magnets, mirror memory
// -----------------------------------------------------------------------------

#[tokio::test]
async fn test_piratebay_remembers_answering_mirror() {
    let base = serve(Router::new().route(
        "/search/{query}/{page}/99/100",
        get(|| async {
            HtmlResponse(format!(
                r#"<table id="searchResult">
                  <tr>
                    <td>Audio</td>
                    <td><a class="detLink" href="/torrent/5/x">Abbey Road MP3</a>
                        <a href="magnet:?xt=urn:btih:{HASH}">m</a>
                        <font class="detDesc">Uploaded 01-01 2020, Size 95.1 MiB, ULed by y</font></td>
                    <td>9</td><td>1</td>
                  </tr>
                </table>"#
            ))
        }),
    ))
    .await;

    let plugin = piratebay::build(
        &SiteConfig {
            enabled: true,
            mirrors: vec![DEAD_MIRROR.to_string(), base.clone()],
        },
        fetch(),
    )
    .unwrap();

    let results = plugin.search("abbey road", 1).await.unwrap();
    assert_eq!(results.len(), 1);
    assert!(results[0].magnet_uri.is_some());
    assert_eq!(results[0].size, "95.1 MiB");

    let session = plugin.session().snapshot().await;
    assert_eq!(session.base_url, Some(format!("{}/", base)));
}

// -----------------------------------------------------------------------------
// RuTracker-shaped forum: login form, session cookie
// -----------------------------------------------------------------------------

fn forum() -> Router {
    Router::new()
        .route(
            "/forum/login.php",
            post(|Form(form): Form<HashMap<String, String>>| async move {
                let ok = form.get("login_username").map(String::as_str) == Some("alice")
                    && form.get("login_password").map(String::as_str) == Some("secret");
                if ok {
                    (
                        StatusCode::FOUND,
                        [
                            (header::LOCATION, "/forum/index.php".to_string()),
                            (header::SET_COOKIE, "bb_session=0-42-xyz; Path=/forum/".to_string()),
                        ],
                    )
                        .into_response()
                } else {
                    (
                        StatusCode::FOUND,
                        [
                            (header::LOCATION, "/forum/login.php?error=1".to_string()),
                            (
                                header::SET_COOKIE,
                                "bb_session=deleted; expires=Thu, 01-Jan-1970 00:00:01 GMT; Max-Age=0; path=/forum/"
                                    .to_string(),
                            ),
                        ],
                    )
                        .into_response()
                }
            })
            .get(|| async { "login form" }),
        )
        .route("/forum/index.php", get(|| async { "index" }))
        .route(
            "/forum/tracker.php",
            get(
                |headers: HeaderMap, Query(q): Query<HashMap<String, String>>| async move {
                    if !cookie(&headers).contains("bb_session=0-42-xyz") {
                        return HtmlResponse("<p>login required</p>".to_string()).into_response();
                    }
                    let nm = q.get("nm").cloned().unwrap_or_default();
                    HtmlResponse(format!(
                        r#"<table id="tor-tbl"><tbody><tr>
                          <td><a class="tLink" href="viewtopic.php?t=7">{nm} 1969 FLAC</a></td>
                          <td class="tor-size" data-ts_text="1048576">1 MB</td>
                          <td><b class="seedmed">3</b></td><td class="leechmed">0</td>
                        </tr></tbody></table>"#
                    ))
                    .into_response()
                },
            ),
        )
        .route(
            "/forum/viewtopic.php",
            get(|headers: HeaderMap| async move {
                if !cookie(&headers).contains("bb_session") {
                    return StatusCode::FORBIDDEN.into_response();
                }
                HtmlResponse(format!(
                    r#"<a class="magnet-link" href="magnet:?xt=urn:btih:{HASH}">magnet</a>"#
                ))
                .into_response()
            }),
        )
}

fn rutracker_config(base: &str, password: &str) -> RutrackerConfig {
    RutrackerConfig {
        enabled: true,
        mirrors: vec![base.to_string()],
        username: "alice".to_string(),
        password: password.to_string(),
        max_login_attempts: 2,
    }
}

#[tokio::test]
async fn test_rutracker_login_then_search() {
    let base = serve(forum()).await;
    let plugin = Arc::new(rutracker::build(&rutracker_config(&base, "secret"), fetch()).unwrap());

    let mut registry = ScraperRegistry::new();
    registry.register(plugin.clone());
    assert_eq!(registry.wait_for_login("rutracker").await, Some(true));

    let session = plugin.session().snapshot().await;
    assert_eq!(session.cookies.as_deref(), Some("bb_session=0-42-xyz"));
    assert_eq!(session.attempts, Some(0));

    let results = plugin.search("Abbey Road", 1).await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].title, "Abbey Road 1969 FLAC");
    assert_eq!(results[0].size, "1.0 MB");
    let detail = results[0].url.clone().unwrap();
    assert_eq!(detail, format!("{}/forum/viewtopic.php?t=7", base));

    let magnet = plugin.resolve_magnet(&detail).await.unwrap();
    assert!(magnet.contains(HASH));
}

#[tokio::test]
async fn test_rutracker_failed_login_degrades_to_empty() {
    let base = serve(forum()).await;
    let plugin = Arc::new(rutracker::build(&rutracker_config(&base, "wrong"), fetch()).unwrap());

    let mut registry = ScraperRegistry::new();
    registry.register(plugin.clone());
    assert_eq!(registry.wait_for_login("rutracker").await, Some(false));

    let session = plugin.session().snapshot().await;
    assert!(!session.is_logged_in());
    assert_eq!(session.attempts, Some(1));

    assert!(plugin.search("Abbey Road", 1).await.unwrap().is_empty());

    assert!(!registry.login("rutracker").await);
    assert!(!registry.login("rutracker").await);
    assert_eq!(plugin.session().snapshot().await.attempts, Some(2));
}

// -----------------------------------------------------------------------------
// A site declared inline: fragment endpoint, custom extractor, callback magnet
// -----------------------------------------------------------------------------

struct FragmentRow;

impl RowExtractor for FragmentRow {
    fn extract(
        &self,
        _document: &Html,
        row: ElementRef<'_>,
        response: &ResponseContext,
    ) -> Result<Option<ExtractedRow>, ScrapeError> {
        let name = selector("td.name")?;
        let title = select_text(row, &name)
            .ok_or_else(|| ScrapeError::Parse("row without name".to_string()))?;
        if title == "explode" {
            return Err(ScrapeError::Parse("bad row".to_string()));
        }
        Ok(Some(ExtractedRow {
            title,
            url: response.resolve(&format!("/detail/{}", response.status)),
            ..Default::default()
        }))
    }
}

#[tokio::test]
async fn test_fragment_rows_and_failing_rows_are_skipped() {
    let base = serve(
        Router::new()
            .route(
                "/rows",
                get(|| async {
                    r#"<tr><td class="name">First</td></tr>
                       <tr><td class="name">explode</td></tr>
                       <tr><td class="other">no name</td></tr>
                       <tr><td class="name">Last</td></tr>"#
                }),
            )
            .route(
                "/detail/200",
                get(|| async { r#"<div data-hash="feed">x</div>"# }),
            ),
    )
    .await;

    let plugin: TemplatedScraper = TemplatedScraper::builder("inline", "Inline")
        .search_templates([format!("{}/rows?q={{query}}&p={{page}}", base)])
        .rows("tr")
        .wrap_row_fragments()
        .extractor(FragmentRow)
        .magnet_callback(|doc, _ctx| {
            let sel = selector("div[data-hash]").ok()?;
            let hash = doc.select(&sel).next()?.value().attr("data-hash")?;
            Some(format!("magnet:?xt=urn:btih:{}", hash))
        })
        .mirror_timeout(Duration::from_secs(2))
        .build(fetch())
        .unwrap();

    let results = plugin.search("q", 1).await.unwrap();
    let titles: Vec<_> = results.iter().map(|r| r.title.as_str()).collect();
    assert_eq!(titles, vec!["First", "Last"]);
    assert!(results.iter().all(|r| r.source == "Inline"));

    let detail = results[0].url.clone().unwrap();
    assert_eq!(detail, format!("{}/detail/200", base));
    assert_eq!(
        plugin.resolve_magnet(&detail).await.as_deref(),
        Some("magnet:?xt=urn:btih:feed")
    );
}

#[test]
fn test_builder_requires_parts() {
    let result = TemplatedScraper::builder("x", "X").rows("tr").build(fetch());
    assert!(matches!(result, Err(ScrapeError::Config(_))));

    let result = TemplatedScraper::builder("x", "X")
        .search_templates(["http://a.example/{query}"])
        .rows("tr[[")
        .extractor(FragmentRow)
        .build(fetch());
    assert!(matches!(result, Err(ScrapeError::InvalidSelector(_))));
}

#[tokio::test]
async fn test_login_is_retried_by_search_after_a_failed_first_attempt() {
    struct FlakyLogin {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait::async_trait]
    impl LoginRoutine for FlakyLogin {
        async fn login(
            &self,
            _fetch: &FetchClient,
            _session: &SessionState,
        ) -> Result<SessionState, ScrapeError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                return Err(ScrapeError::LoginFailed("temporarily down".to_string()));
            }
            Ok(SessionState {
                cookies: Some("sid=ok".to_string()),
                ..Default::default()
            })
        }
    }

    let base = serve(Router::new().route(
        "/rows",
        get(|headers: HeaderMap| async move {
            if cookie(&headers).contains("sid=ok") {
                r#"<tr><td class="name">Abbey Road FLAC</td></tr>"#
            } else {
                ""
            }
        }),
    ))
    .await;

    let calls = Arc::new(AtomicUsize::new(0));
    let plugin = Arc::new(
        TemplatedScraper::builder("gated", "Gated")
            .search_templates([format!("{}/rows?q={{query}}", base)])
            .rows("tr")
            .wrap_row_fragments()
            .extractor(FragmentRow)
            .request_options(|session| {
                FetchOptions::get().cookies(session.cookies.as_deref().unwrap_or_default())
            })
            .login(FlakyLogin {
                calls: calls.clone(),
            })
            .initial_session(SessionState {
                max_attempts: Some(3),
                ..Default::default()
            })
            .build(fetch())
            .unwrap(),
    );

    let mut registry = ScraperRegistry::new();
    registry.register(plugin.clone());
    assert_eq!(registry.wait_for_login("gated").await, Some(false));
    assert_eq!(plugin.session().snapshot().await.attempts, Some(1));

    let results = plugin.search("Abbey Road", 1).await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(plugin.session().snapshot().await.attempts, Some(0));

    // The session is reused by later searches.
    assert_eq!(plugin.search("Abbey Road", 1).await.unwrap().len(), 1);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

// -----------------------------------------------------------------------------
// Token-gated JSON API
// -----------------------------------------------------------------------------

fn token_api(token_requests: Arc<AtomicUsize>, token_ok: bool) -> Router {
    Router::new().route(
        "/pubapi",
        get(move |Query(q): Query<HashMap<String, String>>| {
            let token_requests = token_requests.clone();
            async move {
                if q.contains_key("get_token") {
                    token_requests.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(100)).await;
                    if !token_ok {
                        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
                    }
                    return Json(json!({ "token": "tok-1" })).into_response();
                }
                if q.get("token").map(String::as_str) != Some("tok-1") {
                    return Json(json!({ "error": "Invalid token", "error_code": 2 }))
                        .into_response();
                }
                let title = format!("{} FLAC", q.get("search_string").cloned().unwrap_or_default());
                Json(json!({
                    "torrent_results": [{
                        "title": title,
                        "download": format!("magnet:?xt=urn:btih:{HASH}"),
                        "seeders": 5,
                        "leechers": 1,
                        "size": 1048576
                    }]
                }))
                .into_response()
            }
        }),
    )
}

fn torrentapi_config(base: &str, max_token_attempts: u32) -> TorrentApiConfig {
    TorrentApiConfig {
        enabled: true,
        url: format!("{}/pubapi", base),
        app_id: "tunehound-test".to_string(),
        max_token_attempts,
    }
}

#[tokio::test]
async fn test_concurrent_searches_share_one_token_request() {
    let token_requests = Arc::new(AtomicUsize::new(0));
    let base = serve(token_api(token_requests.clone(), true)).await;
    let plugin = TorrentApiPlugin::new(torrentapi_config(&base, 3), fetch());

    let queries: Vec<String> = (0..6).map(|i| format!("abbey road {}", i)).collect();
    let results =
        futures::future::join_all(queries.iter().map(|q| plugin.search(q, 1))).await;

    for result in results {
        let candidates = result.unwrap();
        assert_eq!(candidates.len(), 1);
        assert!(candidates[0].magnet_uri.is_some());
    }
    assert_eq!(token_requests.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_dead_token_endpoint_stops_after_max_attempts() {
    let token_requests = Arc::new(AtomicUsize::new(0));
    let base = serve(token_api(token_requests.clone(), false)).await;
    let plugin = TorrentApiPlugin::new(torrentapi_config(&base, 1), fetch());

    for _ in 0..5 {
        assert!(plugin.search("abbey road", 1).await.unwrap().is_empty());
    }
    assert_eq!(token_requests.load(Ordering::SeqCst), 1);

    let session = plugin.session().snapshot().await;
    assert_eq!(session.attempts, Some(1));
    assert!(!session.is_logged_in());
}
