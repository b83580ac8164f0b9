//! Prometheus metrics for the search engine.
//!
//! This module provides metrics for:
//! - Plugin searches (outcome, duration)
//! - Search orchestration (duration, variants, candidates)
//! - Magnet resolution

use once_cell::sync::Lazy;
use prometheus::{Histogram, HistogramOpts, HistogramVec, IntCounterVec, Opts};

// =============================================================================
// Plugin Metrics
// =============================================================================

/// Plugin search tasks by plugin and outcome.
pub static PLUGIN_SEARCHES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("tunehound_plugin_searches_total", "Total plugin search tasks"),
        &["plugin", "result"], // "ok", "error", "late"
    )
    .unwrap()
});

/// Plugin search duration in seconds.
pub static PLUGIN_SEARCH_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "tunehound_plugin_search_duration_seconds",
            "Duration of one plugin search call",
        )
        .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.0, 3.0, 5.0, 10.0]),
        &["plugin"],
    )
    .unwrap()
});

// =============================================================================
// Orchestrator Metrics
// =============================================================================

/// Full search duration in seconds.
pub static SEARCH_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new("tunehound_search_duration_seconds", "Duration of search_all")
            .buckets(vec![0.1, 0.25, 0.5, 1.0, 2.0, 3.0, 4.0, 6.0, 10.0]),
        &["deadline"], // "met", "exceeded"
    )
    .unwrap()
});

/// Query variants per search.
pub static QUERY_VARIANTS: Lazy<Histogram> = Lazy::new(|| {
    Histogram::with_opts(
        HistogramOpts::new("tunehound_query_variants", "Query variants per search")
            .buckets(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]),
    )
    .unwrap()
});

/// Candidates at each stage of a search.
pub static SEARCH_CANDIDATES: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new("tunehound_search_candidates", "Candidates per search by stage")
            .buckets(vec![0.0, 1.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0]),
        &["stage"], // "harvested", "returned"
    )
    .unwrap()
});

/// Magnet resolutions by outcome.
pub static MAGNET_RESOLUTIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("tunehound_magnet_resolutions_total", "Magnet resolution attempts"),
        &["outcome"], // "derived", "resolved", "missing"
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(PLUGIN_SEARCHES.clone()),
        Box::new(PLUGIN_SEARCH_DURATION.clone()),
        Box::new(SEARCH_DURATION.clone()),
        Box::new(QUERY_VARIANTS.clone()),
        Box::new(SEARCH_CANDIDATES.clone()),
        Box::new(MAGNET_RESOLUTIONS.clone()),
    ]
}
