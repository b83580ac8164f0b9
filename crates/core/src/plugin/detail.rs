//! Detail-page fetching for magnet resolution.

use std::time::Duration;

use reqwest::header::REFERER;
use reqwest::StatusCode;
use tracing::debug;

use crate::fetch::{origin_of, FetchClient, FetchOptions, FetchResponse};

/// Pause before retrying a blocked detail page.
const RETRY_DELAY: Duration = Duration::from_millis(350);

fn is_blocked(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS | StatusCode::SERVICE_UNAVAILABLE
    )
}

/// Fetch a detail page the way a browser would.
///
/// A 403/429/503 answer gets one retry after a short pause and a cookie
/// preflight against the site root. Anything else that is not a success
/// yields `None`.
pub async fn fetch_detail_page(
    fetch: &FetchClient,
    detail_url: &str,
    extra: FetchOptions,
) -> Option<FetchResponse> {
    let url = url::Url::parse(detail_url).ok()?;
    let origin = origin_of(&url);
    let options = FetchOptions::get()
        .browser_like()
        .merge(extra)
        .header(REFERER, &origin);

    let first = match fetch.fetch(detail_url, &options).await {
        Ok(response) if response.ok() => return Some(response),
        Ok(response) => response,
        Err(e) => {
            debug!(url = %detail_url, error = %e, "Detail page fetch failed");
            return None;
        }
    };

    if !is_blocked(first.status) {
        debug!(url = %detail_url, status = first.status.as_u16(), "Detail page not available");
        return None;
    }

    tokio::time::sleep(RETRY_DELAY).await;

    let mut retry = options.clone();
    match fetch.fetch(&origin, &FetchOptions::get().browser_like()).await {
        Ok(preflight) => retry.cookies.extend(&preflight.cookies),
        Err(e) => debug!(origin = %origin, error = %e, "Cookie preflight failed"),
    }
    retry.cookies.extend(&first.cookies);

    match fetch.fetch(detail_url, &retry).await {
        Ok(response) if response.ok() => Some(response),
        Ok(response) => {
            debug!(
                url = %detail_url,
                status = response.status.as_u16(),
                "Detail page still blocked after retry"
            );
            None
        }
        Err(e) => {
            debug!(url = %detail_url, error = %e, "Detail page retry failed");
            None
        }
    }
}
