//! Serialized login with attempt bookkeeping.

use chrono::Utc;
use tracing::{info, warn};

use super::{ScrapeError, ScraperPlugin, SessionState};

/// Log `plugin` in under its login gate and merge the outcome into its
/// session. Returns whether the plugin ends up logged in.
///
/// `satisfied` is checked once the gate is held: a caller that queued behind
/// a login which already produced a usable session returns without logging
/// in again. Failures count towards `max_attempts`; once exhausted the
/// session is cleared and no further login is attempted.
pub async fn login_coalesced<F>(plugin: &dyn ScraperPlugin, satisfied: F) -> bool
where
    F: Fn(&SessionState) -> bool,
{
    let session = plugin.session();
    let _gate = session.lock_login().await;

    let current = session.snapshot().await;
    if satisfied(&current) {
        return true;
    }
    if current.attempts_exhausted() {
        warn!(
            plugin = %plugin.id(),
            attempts = current.attempts.unwrap_or(0),
            "Login attempts exhausted"
        );
        session.reset_login().await;
        return false;
    }

    match plugin.login().await {
        Ok(mut patch) => {
            patch.attempts = Some(0);
            if patch.last_login.is_none() {
                patch.last_login = Some(Utc::now());
            }
            session.merge(patch).await;
            let logged_in = session.snapshot().await.is_logged_in();
            if logged_in {
                info!(plugin = %plugin.id(), "Logged in");
            } else {
                warn!(plugin = %plugin.id(), "Login returned no session");
            }
            logged_in
        }
        Err(e) => {
            record_failure(plugin, &e).await;
            false
        }
    }
}

async fn record_failure(plugin: &dyn ScraperPlugin, error: &ScrapeError) {
    let session = plugin.session();
    let attempts = session.snapshot().await.attempts.unwrap_or(0) + 1;
    session.reset_login().await;
    session
        .merge(SessionState {
            attempts: Some(attempts),
            ..Default::default()
        })
        .await;
    warn!(plugin = %plugin.id(), attempts, error = %error, "Login failed");
}
