//! Per-plugin mutable session state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard, RwLock};

/// Free-form authentication and mirror state of one plugin.
///
/// Every field is optional. A value used as a patch only overwrites the
/// fields it sets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cookies: Option<String>,
    /// Mirror that last answered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_acquired_at: Option<DateTime<Utc>>,
    /// Consecutive failed logins.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attempts: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_login: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub extra: HashMap<String, String>,
}

impl SessionState {
    /// Shallow merge: fields set in `patch` replace ours, `extra` merges by key.
    pub fn merge(&mut self, patch: SessionState) {
        if patch.cookies.is_some() {
            self.cookies = patch.cookies;
        }
        if patch.base_url.is_some() {
            self.base_url = patch.base_url;
        }
        if patch.token.is_some() {
            self.token = patch.token;
        }
        if patch.token_acquired_at.is_some() {
            self.token_acquired_at = patch.token_acquired_at;
        }
        if patch.attempts.is_some() {
            self.attempts = patch.attempts;
        }
        if patch.max_attempts.is_some() {
            self.max_attempts = patch.max_attempts;
        }
        if patch.last_login.is_some() {
            self.last_login = patch.last_login;
        }
        self.extra.extend(patch.extra);
    }

    /// Drop credentials, keeping mirror and attempt bookkeeping.
    pub fn reset_login(&mut self) {
        self.cookies = None;
        self.token = None;
        self.token_acquired_at = None;
        self.last_login = None;
    }

    pub fn is_logged_in(&self) -> bool {
        self.cookies.as_deref().is_some_and(|c| !c.is_empty())
            || self.token.as_deref().is_some_and(|t| !t.is_empty())
    }

    pub fn attempts_exhausted(&self) -> bool {
        match self.max_attempts {
            Some(max) => self.attempts.unwrap_or(0) >= max,
            None => false,
        }
    }
}

/// Shared handle to a plugin's [`SessionState`].
///
/// Cloning shares the state. Logins for one plugin are serialized through
/// the login gate.
#[derive(Debug, Clone, Default)]
pub struct PluginSession {
    state: Arc<RwLock<SessionState>>,
    login_gate: Arc<Mutex<()>>,
}

impl PluginSession {
    pub fn new(initial: SessionState) -> Self {
        Self {
            state: Arc::new(RwLock::new(initial)),
            login_gate: Arc::new(Mutex::new(())),
        }
    }

    /// Copy of the current state.
    pub async fn snapshot(&self) -> SessionState {
        self.state.read().await.clone()
    }

    pub async fn merge(&self, patch: SessionState) {
        self.state.write().await.merge(patch);
    }

    pub async fn reset_login(&self) {
        self.state.write().await.reset_login();
    }

    pub(crate) async fn lock_login(&self) -> MutexGuard<'_, ()> {
        self.login_gate.lock().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_only_overwrites_set_fields() {
        let mut state = SessionState {
            cookies: Some("a=1".to_string()),
            base_url: Some("https://one.example/".to_string()),
            ..Default::default()
        };
        state.extra.insert("k".to_string(), "v".to_string());

        let mut patch = SessionState {
            token: Some("tok".to_string()),
            base_url: Some("https://two.example/".to_string()),
            ..Default::default()
        };
        patch.extra.insert("k2".to_string(), "v2".to_string());
        state.merge(patch);

        assert_eq!(state.cookies.as_deref(), Some("a=1"));
        assert_eq!(state.base_url.as_deref(), Some("https://two.example/"));
        assert_eq!(state.token.as_deref(), Some("tok"));
        assert_eq!(state.extra.len(), 2);
    }

    #[test]
    fn test_reset_login_keeps_bookkeeping() {
        let mut state = SessionState {
            cookies: Some("bb_session=1".to_string()),
            base_url: Some("https://mirror.example/".to_string()),
            attempts: Some(2),
            max_attempts: Some(3),
            last_login: Some(Utc::now()),
            ..Default::default()
        };
        assert!(state.is_logged_in());

        state.reset_login();
        assert!(!state.is_logged_in());
        assert!(state.last_login.is_none());
        assert_eq!(state.base_url.as_deref(), Some("https://mirror.example/"));
        assert_eq!(state.attempts, Some(2));
    }

    #[test]
    fn test_attempts_exhausted() {
        let mut state = SessionState::default();
        assert!(!state.attempts_exhausted());
        state.max_attempts = Some(2);
        state.attempts = Some(1);
        assert!(!state.attempts_exhausted());
        state.attempts = Some(2);
        assert!(state.attempts_exhausted());
    }

    #[tokio::test]
    async fn test_plugin_session_is_shared_between_clones() {
        let session = PluginSession::default();
        let other = session.clone();
        other
            .merge(SessionState {
                token: Some("t".to_string()),
                ..Default::default()
            })
            .await;
        assert_eq!(session.snapshot().await.token.as_deref(), Some("t"));
    }
}
