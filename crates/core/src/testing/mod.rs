//! Testing utilities: a controllable plugin and candidate fixtures.
//!
//! # Example
//!
//! ```rust,ignore
//! use tunehound_core::testing::{fixtures, MockPlugin};
//!
//! let mut registry = ScraperRegistry::new();
//! registry.register(Arc::new(
//!     MockPlugin::new("fast").with_rows(vec![fixtures::magnet_row("Abbey Road FLAC", HASH, 40)]),
//! ));
//! registry.register(Arc::new(MockPlugin::new("stuck").never_resolving()));
//! ```

mod mock_plugin;

pub use mock_plugin::MockPlugin;

/// Test fixtures and helper functions.
pub mod fixtures {
    use crate::plugin::{ExtractedRow, RawCandidate};

    /// A 40-hex info-hash built from one repeated digit.
    pub fn hash(digit: char) -> String {
        std::iter::repeat(digit).take(40).collect()
    }

    /// A row without a magnet.
    pub fn row(title: &str, seeders: u32) -> ExtractedRow {
        ExtractedRow {
            title: title.to_string(),
            url: None,
            magnet_uri: None,
            size: "300.0 MB".to_string(),
            seeders,
            leechers: seeders / 4,
        }
    }

    /// A row carrying a magnet for `info_hash`.
    pub fn magnet_row(title: &str, info_hash: &str, seeders: u32) -> ExtractedRow {
        ExtractedRow {
            magnet_uri: Some(format!("magnet:?xt=urn:btih:{}", info_hash)),
            ..row(title, seeders)
        }
    }

    /// A row carrying a magnet with explicit trackers.
    pub fn tracked_row(title: &str, info_hash: &str, trackers: &[&str], seeders: u32) -> ExtractedRow {
        let mut magnet = format!("magnet:?xt=urn:btih:{}", info_hash);
        for tr in trackers {
            magnet.push_str("&tr=");
            magnet.push_str(&urlencoding::encode(tr));
        }
        ExtractedRow {
            magnet_uri: Some(magnet),
            ..row(title, seeders)
        }
    }

    /// A row whose magnet lives on a detail page.
    pub fn detail_row(title: &str, detail_url: &str, seeders: u32) -> ExtractedRow {
        ExtractedRow {
            url: Some(detail_url.to_string()),
            ..row(title, seeders)
        }
    }

    /// A tagged candidate as a plugin would produce it.
    pub fn candidate(plugin_id: &str, query: &str, row: ExtractedRow) -> RawCandidate {
        row.into_candidate(plugin_id, plugin_id, query)
    }
}
