//! 1337x: public HTML index, magnets on detail pages.

use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};

use crate::config::SiteConfig;
use crate::fetch::FetchClient;
use crate::plugin::{
    parse_count, select_attr, select_text, ExtractedRow, ResponseContext, RowExtractor,
    ScrapeError, TemplatedScraper,
};

use super::{mirrors_or_default, templates_for};

pub const ID: &str = "leetx";
pub const NAME: &str = "1337x";

const DEFAULT_MIRRORS: &[&str] = &["https://1337x.to", "https://1337x.st", "https://x1337x.ws"];
const SEARCH_PATH: &str = "/search/{query}/{page}/";

static NAME_LINK: Lazy<Selector> =
    Lazy::new(|| Selector::parse("td.coll-1 a[href*='/torrent/']").unwrap());
static SEEDS: Lazy<Selector> = Lazy::new(|| Selector::parse("td.coll-2").unwrap());
static LEECHES: Lazy<Selector> = Lazy::new(|| Selector::parse("td.coll-3").unwrap());
static SIZE: Lazy<Selector> = Lazy::new(|| Selector::parse("td.coll-4").unwrap());

/// One `<tr>` of the results table.
struct LeetxRow;

impl RowExtractor for LeetxRow {
    fn extract(
        &self,
        _document: &Html,
        row: ElementRef<'_>,
        response: &ResponseContext,
    ) -> Result<Option<ExtractedRow>, ScrapeError> {
        let Some(title) = select_text(row, &NAME_LINK) else {
            return Ok(None);
        };
        let url = select_attr(row, &NAME_LINK, "href").and_then(|href| response.resolve(&href));

        // The size cell also holds a hidden seeders span; keep its first text node.
        let size = row
            .select(&SIZE)
            .next()
            .and_then(|cell| cell.text().map(str::trim).find(|t| !t.is_empty()))
            .unwrap_or_default()
            .to_string();

        Ok(Some(ExtractedRow {
            title,
            url,
            magnet_uri: None,
            size,
            seeders: select_text(row, &SEEDS).map(|t| parse_count(&t)).unwrap_or(0),
            leechers: select_text(row, &LEECHES).map(|t| parse_count(&t)).unwrap_or(0),
        }))
    }
}

pub fn build(config: &SiteConfig, fetch: FetchClient) -> Result<TemplatedScraper, ScrapeError> {
    let mirrors = mirrors_or_default(&config.mirrors, DEFAULT_MIRRORS);
    TemplatedScraper::builder(ID, NAME)
        .enabled(config.enabled)
        .search_templates(templates_for(&mirrors, SEARCH_PATH))
        .rows("table.table-list tbody tr")
        .extractor(LeetxRow)
        .magnet_selector("a[href^='magnet:']")
        .build(fetch)
}
