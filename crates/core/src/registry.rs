//! Plugin bookkeeping and background login.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::plugin::{login_coalesced, PluginInfo, ScraperPlugin, SessionState};

/// Owns every registered plugin.
///
/// Build one at startup and hand it to the orchestrator behind an `Arc`.
#[derive(Default)]
pub struct ScraperRegistry {
    plugins: Vec<Arc<dyn ScraperPlugin>>,
    logins: Mutex<HashMap<String, JoinHandle<bool>>>,
}

impl ScraperRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a plugin, replacing any plugin with the same id.
    ///
    /// An enabled plugin with a login routine starts logging in on a
    /// background task; [`wait_for_login`](Self::wait_for_login) observes it.
    /// Must be called inside a Tokio runtime.
    pub fn register(&mut self, plugin: Arc<dyn ScraperPlugin>) {
        let id = plugin.id().to_string();
        self.plugins.retain(|p| p.id() != id);

        if plugin.has_login() && plugin.enabled() {
            let handle = tokio::spawn(run_login(plugin.clone()));
            if let Some(previous) = self.logins.get_mut().insert(id.clone(), handle) {
                previous.abort();
            }
        }

        info!(plugin = %id, name = %plugin.name(), enabled = plugin.enabled(), "Registered plugin");
        self.plugins.push(plugin);
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn ScraperPlugin>> {
        self.plugins.iter().find(|p| p.id() == id).cloned()
    }

    /// Enabled plugins in registration order.
    pub fn enabled_plugins(&self) -> Vec<Arc<dyn ScraperPlugin>> {
        self.plugins.iter().filter(|p| p.enabled()).cloned().collect()
    }

    pub fn list(&self) -> Vec<PluginInfo> {
        self.plugins.iter().map(|p| p.info()).collect()
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Shallow-merge `patch` into a plugin's session. False if the id is unknown.
    pub async fn set_plugin_data(&self, id: &str, patch: SessionState) -> bool {
        match self.get(id) {
            Some(plugin) => {
                plugin.session().merge(patch).await;
                true
            }
            None => false,
        }
    }

    /// Run a plugin's login now. Returns whether the plugin ends up logged in.
    pub async fn login(&self, id: &str) -> bool {
        match self.get(id) {
            Some(plugin) => run_login(plugin).await,
            None => false,
        }
    }

    /// Wait for the login started by [`register`](Self::register).
    ///
    /// `None` if no background login was started for `id` or it was already
    /// collected.
    pub async fn wait_for_login(&self, id: &str) -> Option<bool> {
        let handle = self.logins.lock().await.remove(id)?;
        match handle.await {
            Ok(logged_in) => Some(logged_in),
            Err(e) => {
                warn!(plugin = %id, error = %e, "Background login task failed");
                Some(false)
            }
        }
    }
}

/// Log a plugin in. A caller that waited behind a login which succeeded
/// after this call was made reuses it instead of logging in again.
async fn run_login(plugin: Arc<dyn ScraperPlugin>) -> bool {
    let requested_at = Utc::now();
    login_coalesced(plugin.as_ref(), |current| {
        current.is_logged_in() && current.last_login.is_some_and(|t| t >= requested_at)
    })
    .await
}
