//! Redirect- and cookie-aware HTTP client.

use std::time::Duration;

use reqwest::header::{
    HeaderMap, HeaderName, HeaderValue, CONTENT_LENGTH, CONTENT_TYPE, COOKIE, LOCATION, REFERER,
};
use reqwest::{Client, Method, StatusCode};
use tracing::debug;
use url::Url;

use crate::config::FetchConfig;

use super::{CookieJar, FetchError};

/// Options for a single logical request.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub method: Method,
    pub headers: HeaderMap,
    pub body: Option<String>,
    /// Cookies sent on the first hop; redirect hops add to these.
    pub cookies: CookieJar,
    /// Overrides the client's redirect cap for this request.
    pub max_redirects: Option<usize>,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            method: Method::GET,
            headers: HeaderMap::new(),
            body: None,
            cookies: CookieJar::new(),
            max_redirects: None,
        }
    }
}

impl FetchOptions {
    /// Plain GET.
    pub fn get() -> Self {
        Self::default()
    }

    /// POST with an `application/x-www-form-urlencoded` body.
    pub fn post_form(pairs: &[(&str, &str)]) -> Self {
        let body = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(pairs)
            .finish();
        let mut headers = HeaderMap::new();
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/x-www-form-urlencoded"),
        );
        Self {
            method: Method::POST,
            headers,
            body: Some(body),
            ..Default::default()
        }
    }

    /// Add a header. Values that are not valid header text are dropped.
    pub fn header(mut self, name: HeaderName, value: &str) -> Self {
        match HeaderValue::from_str(value) {
            Ok(v) => {
                self.headers.insert(name, v);
            }
            Err(_) => debug!(header = %name, "Dropping invalid header value"),
        }
        self
    }

    /// Add cookies from a `Cookie` header style string.
    pub fn cookies(mut self, cookies: &str) -> Self {
        self.cookies.extend(&CookieJar::parse(cookies));
        self
    }

    /// Set `Referer` unless one is already present.
    pub fn default_referer(self, referer: &str) -> Self {
        if self.headers.contains_key(REFERER) {
            self
        } else {
            self.header(REFERER, referer)
        }
    }

    /// Headers a desktop browser sends for a page navigation.
    pub fn browser_like(self) -> Self {
        self.header(
            reqwest::header::ACCEPT,
            "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
        )
        .header(reqwest::header::ACCEPT_LANGUAGE, "en-US,en;q=0.9")
    }

    /// Layer `other` on top of `self`: its headers replace, its cookies extend.
    pub fn merge(mut self, other: FetchOptions) -> Self {
        if other.method != Method::GET {
            self.method = other.method;
        }
        for (name, value) in other.headers.iter() {
            self.headers.insert(name.clone(), value.clone());
        }
        if other.body.is_some() {
            self.body = other.body;
        }
        self.cookies.extend(&other.cookies);
        if other.max_redirects.is_some() {
            self.max_redirects = other.max_redirects;
        }
        self
    }
}

/// The first non-redirect response of a request chain.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub status: StatusCode,
    /// Final URL after redirects; relative links resolve against this.
    pub url: Url,
    pub headers: HeaderMap,
    /// Request cookies plus every cookie set along the chain.
    pub cookies: CookieJar,
    pub body: String,
    /// Number of redirect hops followed.
    pub redirects: usize,
}

impl FetchResponse {
    pub fn ok(&self) -> bool {
        self.status.is_success()
    }

    /// `Location` header, present when a redirect pointed outside http(s).
    pub fn location(&self) -> Option<&str> {
        self.headers.get(LOCATION).and_then(|v| v.to_str().ok())
    }
}

/// HTTP client that follows redirects by hand.
///
/// Automatic redirects are disabled on the underlying `reqwest` client so
/// that every hop can carry accumulated cookies, a `Referer`, and the
/// method/body rules of its status code.
#[derive(Debug, Clone)]
pub struct FetchClient {
    http: Client,
    max_redirects: usize,
    mirror_timeout: Duration,
}

impl FetchClient {
    pub fn new(config: &FetchConfig) -> Result<Self, FetchError> {
        let http = Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .connect_timeout(Duration::from_secs(config.request_timeout_secs.min(10)))
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self {
            http,
            max_redirects: config.max_redirects,
            mirror_timeout: Duration::from_millis(config.mirror_timeout_ms),
        })
    }

    /// Per-mirror timeout used by plugins when calling [`try_fetch_any`].
    ///
    /// [`try_fetch_any`]: FetchClient::try_fetch_any
    pub fn mirror_timeout(&self) -> Duration {
        self.mirror_timeout
    }

    /// Issue one logical request, following up to the redirect cap.
    ///
    /// Non-2xx responses are returned as-is; only transport failures and an
    /// exceeded redirect cap are errors.
    pub async fn fetch(&self, url: &str, options: &FetchOptions) -> Result<FetchResponse, FetchError> {
        let max_redirects = options.max_redirects.unwrap_or(self.max_redirects);
        let mut current =
            Url::parse(url).map_err(|e| FetchError::InvalidUrl(format!("{}: {}", url, e)))?;
        let mut method = options.method.clone();
        let mut headers = options.headers.clone();
        let mut body = options.body.clone();
        let mut cookies = options.cookies.clone();
        let mut hops = 0usize;

        loop {
            let mut request = self
                .http
                .request(method.clone(), current.clone())
                .headers(headers.clone());
            if !cookies.is_empty() {
                request = request.header(COOKIE, cookies.to_header());
            }
            if let Some(b) = &body {
                request = request.body(b.clone());
            }

            let response = request.send().await.map_err(FetchError::from_reqwest)?;
            cookies.absorb_response(&response);
            let status = response.status();

            let next = if is_redirect(status) {
                response
                    .headers()
                    .get(LOCATION)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|loc| current.join(loc).ok())
                    .filter(|next| matches!(next.scheme(), "http" | "https"))
            } else {
                None
            };

            let Some(next) = next else {
                let response_headers = response.headers().clone();
                let text = response.text().await.map_err(FetchError::from_reqwest)?;
                return Ok(FetchResponse {
                    status,
                    url: current,
                    headers: response_headers,
                    cookies,
                    body: text,
                    redirects: hops,
                });
            };

            if hops >= max_redirects {
                return Err(FetchError::TooManyRedirects(max_redirects));
            }

            if let Ok(referer) = HeaderValue::from_str(&origin_of(&current)) {
                headers.insert(REFERER, referer);
            }

            let demote = match status {
                StatusCode::SEE_OTHER => true,
                StatusCode::MOVED_PERMANENTLY | StatusCode::FOUND => {
                    method != Method::GET && method != Method::HEAD
                }
                _ => false,
            };
            if demote {
                method = Method::GET;
                body = None;
                headers.remove(CONTENT_TYPE);
                headers.remove(CONTENT_LENGTH);
            }

            debug!(
                from = %current,
                to = %next,
                status = status.as_u16(),
                "Following redirect"
            );
            current = next;
            hops += 1;
        }
    }

    /// Try each mirror in order, each attempt under its own timeout.
    ///
    /// Returns the first 2xx response, or `None` once every URL failed,
    /// returned non-2xx, or timed out.
    pub async fn try_fetch_any(
        &self,
        urls: &[String],
        options: &FetchOptions,
        per_attempt: Duration,
    ) -> Option<FetchResponse> {
        for url in urls {
            match tokio::time::timeout(per_attempt, self.fetch(url, options)).await {
                Ok(Ok(response)) if response.ok() => return Some(response),
                Ok(Ok(response)) => {
                    debug!(url = %url, status = response.status.as_u16(), "Mirror answered non-2xx")
                }
                Ok(Err(e)) => debug!(url = %url, error = %e, "Mirror failed"),
                Err(_) => debug!(url = %url, timeout_ms = per_attempt.as_millis() as u64, "Mirror timed out"),
            }
        }
        None
    }
}

fn is_redirect(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::MOVED_PERMANENTLY
            | StatusCode::FOUND
            | StatusCode::SEE_OTHER
            | StatusCode::TEMPORARY_REDIRECT
            | StatusCode::PERMANENT_REDIRECT
    )
}

/// `scheme://host[:port]/` of a URL.
pub fn origin_of(url: &Url) -> String {
    format!("{}/", url.origin().ascii_serialization())
}

/// Origin of a URL string, if it parses.
pub fn origin_of_str(url: &str) -> Option<String> {
    Url::parse(url).ok().map(|u| origin_of(&u))
}
