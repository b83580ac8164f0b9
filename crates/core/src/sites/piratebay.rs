//! The Pirate Bay: proxy mirrors, magnets inline in result rows.

use once_cell::sync::Lazy;
use regex_lite::Regex;
use scraper::{ElementRef, Html, Selector};

use crate::config::SiteConfig;
use crate::fetch::FetchClient;
use crate::plugin::{
    fill_template, parse_count, select_attr, select_text, text_of, ExtractedRow,
    ResponseContext, RowExtractor, ScrapeError, SearchUrlContext, TemplatedScraper,
};

use super::mirrors_or_default;

pub const ID: &str = "piratebay";
pub const NAME: &str = "The Pirate Bay";

const DEFAULT_MIRRORS: &[&str] = &[
    "https://thepiratebay10.org",
    "https://tpb.party",
    "https://piratebay.live",
];
/// Pages are zero-based; `99` sorts by seeders; category 100 is audio.
const SEARCH_PATH: &str = "/search/{query}/{page}/99/100";

static NAME_LINK: Lazy<Selector> =
    Lazy::new(|| Selector::parse("a.detLink, td:nth-child(2) a[href*='/torrent/']").unwrap());
static MAGNET: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href^='magnet:']").unwrap());
static DESCRIPTION: Lazy<Selector> = Lazy::new(|| Selector::parse("font.detDesc").unwrap());
static CELLS: Lazy<Selector> = Lazy::new(|| Selector::parse("td").unwrap());
static DESC_SIZE: Lazy<Regex> = Lazy::new(|| Regex::new(r"Size\s+([^,]+)").unwrap());

struct PirateBayRow;

impl RowExtractor for PirateBayRow {
    fn extract(
        &self,
        _document: &Html,
        row: ElementRef<'_>,
        response: &ResponseContext,
    ) -> Result<Option<ExtractedRow>, ScrapeError> {
        let Some(title) = select_text(row, &NAME_LINK) else {
            return Ok(None);
        };
        let cells: Vec<ElementRef<'_>> = row.select(&CELLS).collect();
        if cells.len() < 3 {
            return Err(ScrapeError::Parse(format!("row with {} cells", cells.len())));
        }

        // Classic layout puts the size in the description line; the newer
        // one has a dedicated cell before the peer counts.
        let size = select_text(row, &DESCRIPTION)
            .and_then(|desc| {
                DESC_SIZE
                    .captures(&desc)
                    .map(|c| c[1].replace('\u{a0}', " ").trim().to_string())
            })
            .or_else(|| (cells.len() >= 7).then(|| text_of(cells[cells.len() - 3])))
            .unwrap_or_default();

        Ok(Some(ExtractedRow {
            title,
            url: select_attr(row, &NAME_LINK, "href").and_then(|href| response.resolve(&href)),
            magnet_uri: select_attr(row, &MAGNET, "href"),
            size,
            seeders: parse_count(&text_of(cells[cells.len() - 2])),
            leechers: parse_count(&text_of(cells[cells.len() - 1])),
        }))
    }
}

/// Search URLs with the last mirror that answered tried first.
fn search_urls(mirrors: &[String], ctx: &SearchUrlContext<'_>) -> Vec<String> {
    let mut bases: Vec<&str> = Vec::with_capacity(mirrors.len() + 1);
    if let Some(known) = ctx.session.base_url.as_deref() {
        bases.push(known.trim_end_matches('/'));
    }
    for m in mirrors {
        let m = m.trim_end_matches('/');
        if !bases.contains(&m) {
            bases.push(m);
        }
    }
    let path = fill_template(SEARCH_PATH, ctx.query, ctx.page.saturating_sub(1));
    bases.into_iter().map(|b| format!("{}{}", b, path)).collect()
}

pub fn build(config: &SiteConfig, fetch: FetchClient) -> Result<TemplatedScraper, ScrapeError> {
    let mirrors = mirrors_or_default(&config.mirrors, DEFAULT_MIRRORS);
    TemplatedScraper::builder(ID, NAME)
        .enabled(config.enabled)
        .search_resolver(move |ctx| search_urls(&mirrors, ctx))
        .rows("table#searchResult tr")
        .extractor(PirateBayRow)
        .remember_mirror()
        .build(fetch)
}
