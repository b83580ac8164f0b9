//! Query expansion.
//!
//! Sites index the same release differently: some drop parentheticals,
//! some expect the artist first, soundtrack uploads are often tagged
//! "OST". One title/artist pair becomes a handful of phrasings that are
//! all sent to every plugin.

use once_cell::sync::Lazy;
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

static PARENTHETICAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\([^)]*\)|\[[^\]]*\]|\{[^}]*\}").unwrap());

static SOUNDTRACK_WORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:soundtrack|ost)\b").unwrap());

/// What the caller is looking for.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchRequest {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artist: Option<String>,
}

impl SearchRequest {
    pub fn new(title: impl Into<String>, artist: Option<&str>) -> Self {
        Self {
            title: title.into(),
            artist: artist.map(str::to_string),
        }
    }

    /// `title artist`, the phrasing scores are measured against.
    pub fn combined(&self) -> String {
        join_words(&[self.title.as_str(), self.artist_str()])
    }

    fn artist_str(&self) -> &str {
        self.artist.as_deref().unwrap_or_default()
    }
}

/// Configuration for the query expander.
#[derive(Debug, Clone)]
pub struct QueryExpanderConfig {
    /// Maximum number of variants produced.
    pub max_variants: usize,
}

impl Default for QueryExpanderConfig {
    fn default() -> Self {
        Self { max_variants: 6 }
    }
}

/// Turns a title/artist pair into differently phrased queries.
#[derive(Debug, Clone, Default)]
pub struct QueryExpander {
    config: QueryExpanderConfig,
}

impl QueryExpander {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: QueryExpanderConfig) -> Self {
        Self { config }
    }

    /// Ordered, case-insensitively deduplicated variants.
    ///
    /// Empty only when both title and artist are blank.
    pub fn expand(&self, request: &SearchRequest) -> Vec<String> {
        let title = request.title.trim();
        let artist = request.artist_str().trim();

        let raw = request.combined();
        let mut candidates = vec![
            raw.clone(),
            join_words(&[title]),
            join_words(&[artist, title]),
        ];

        if !SOUNDTRACK_WORD.is_match(title) && !title.is_empty() {
            candidates.push(join_words(&[title, "soundtrack"]));
            candidates.push(join_words(&[title, "OST"]));
        }

        let stripped = PARENTHETICAL.replace_all(&raw, " ");
        candidates.push(join_words(&[stripped.as_ref()]));

        let mut seen = HashSet::new();
        candidates
            .into_iter()
            .filter(|q| !q.is_empty())
            .filter(|q| seen.insert(q.to_lowercase()))
            .take(self.config.max_variants)
            .collect()
    }
}

/// Join non-empty parts with single spaces, collapsing inner whitespace.
fn join_words(parts: &[&str]) -> String {
    parts
        .iter()
        .flat_map(|p| p.split_whitespace())
        .collect::<Vec<_>>()
        .join(" ")
}
