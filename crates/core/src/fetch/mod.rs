//! HTTP fetch layer shared by every scraper plugin.
//!
//! Redirects are followed manually so each hop can carry the cookies set
//! by previous hops, a `Referer` pointing at the previous origin, and the
//! method/body rules of the redirect status. Mirrors are tried in order
//! with an independent timeout per attempt.

mod client;
mod cookies;

pub use client::{origin_of, origin_of_str, FetchClient, FetchOptions, FetchResponse};
pub use cookies::CookieJar;

use thiserror::Error;

/// Errors from a single logical request.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Request timeout")]
    Timeout,

    #[error("Too many redirects (limit {0})")]
    TooManyRedirects(usize),
}

impl FetchError {
    pub(crate) fn from_reqwest(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            FetchError::Timeout
        } else {
            FetchError::Http(e)
        }
    }
}
