//! In-process server fixture backed by mock plugins.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use tunehound_core::testing::MockPlugin;
use tunehound_core::{Config, ScraperRegistry, SearchConfig, SearchOrchestrator};
use tunehound_server::api::create_router;
use tunehound_server::state::AppState;

/// Re-export fixtures for test convenience
#[allow(unused_imports)]
pub use tunehound_core::testing::fixtures;

/// Router wired to a registry of the given plugins.
///
/// ```rust,ignore
/// let fixture = TestFixture::new(vec![Arc::new(MockPlugin::new("fast"))]);
/// let response = fixture.get("/api/v1/plugins").await;
/// ```
pub struct TestFixture {
    pub router: Router,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
    pub text: String,
}

impl TestFixture {
    pub fn new(plugins: Vec<Arc<MockPlugin>>) -> Self {
        Self::with_search_config(plugins, SearchConfig::default())
    }

    pub fn with_search_config(plugins: Vec<Arc<MockPlugin>>, search: SearchConfig) -> Self {
        let mut registry = ScraperRegistry::new();
        for plugin in plugins {
            registry.register(plugin);
        }
        let config = Config {
            search: search.clone(),
            ..Config::default()
        };
        let orchestrator = SearchOrchestrator::new(Arc::new(registry), search);
        let state = Arc::new(AppState::new(config, orchestrator));

        Self {
            router: create_router(state),
        }
    }

    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path).await
    }

    pub async fn post(&self, path: &str) -> TestResponse {
        self.request("POST", path).await
    }

    async fn request(&self, method: &str, path: &str) -> TestResponse {
        let request = Request::builder()
            .method(method)
            .uri(path)
            .body(Body::empty())
            .unwrap();

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let text = String::from_utf8_lossy(&body_bytes).to_string();
        let body: Value = serde_json::from_slice(&body_bytes).unwrap_or(Value::Null);

        TestResponse { status, body, text }
    }
}
