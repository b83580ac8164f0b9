//! HTTP front for the search engine.

pub mod api;
pub mod metrics;
pub mod state;
