//! Federated search: fan out, harvest under a deadline, resolve, rank.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::SearchConfig;
use crate::dedup::{deduplicate, rank_order};
use crate::magnet;
use crate::metrics;
use crate::plugin::{RawCandidate, ScoredCandidate, ScraperPlugin};
use crate::query::{QueryExpander, QueryExpanderConfig, SearchRequest};
use crate::registry::ScraperRegistry;
use crate::scoring::{content_type_penalty, score};

/// Runs one search across every enabled plugin.
pub struct SearchOrchestrator {
    registry: Arc<ScraperRegistry>,
    expander: QueryExpander,
    config: SearchConfig,
}

impl SearchOrchestrator {
    pub fn new(registry: Arc<ScraperRegistry>, config: SearchConfig) -> Self {
        let expander = QueryExpander::with_config(QueryExpanderConfig {
            max_variants: config.max_variants,
        });
        Self {
            registry,
            expander,
            config,
        }
    }

    pub fn registry(&self) -> &Arc<ScraperRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Search every enabled plugin with every query variant and return
    /// ranked, deduplicated candidates.
    ///
    /// Never fails: plugin errors, timeouts and missing magnets only shrink
    /// the result.
    pub async fn search_all(&self, request: &SearchRequest) -> Vec<ScoredCandidate> {
        let started = Instant::now();
        let variants = self.expander.expand(request);
        if variants.is_empty() {
            debug!("Blank search request");
            return Vec::new();
        }
        metrics::QUERY_VARIANTS.observe(variants.len() as f64);

        let plugins = self.registry.enabled_plugins();
        if plugins.is_empty() {
            warn!("No enabled plugins");
            return Vec::new();
        }

        let deadline = started + Duration::from_millis(self.config.deadline_ms);
        let (harvested, deadline_met) = self.harvest(&plugins, &variants, deadline).await;
        metrics::SEARCH_CANDIDATES
            .with_label_values(&["harvested"])
            .observe(harvested.len() as f64);

        let combined = request.combined();
        let mut candidates: Vec<ScoredCandidate> = harvested
            .into_iter()
            .map(|raw| {
                let s = relevance(&combined, &raw.query, &raw.title, raw.seeders);
                ScoredCandidate::new(raw, s)
            })
            .collect();

        let selected = self.select_for_resolution(&candidates);
        self.resolve_magnets(&mut candidates, &selected, &plugins).await;

        for &i in &selected {
            let c = &mut candidates[i];
            let base = relevance(&combined, &c.query, &c.title, c.seeders);
            c.score = base.saturating_sub(content_type_penalty(&c.title));
        }

        let mut pool: Vec<ScoredCandidate> = candidates
            .iter()
            .filter(|c| c.score >= self.config.min_score && c.has_magnet())
            .cloned()
            .collect();

        if pool.is_empty() {
            pool = selected
                .iter()
                .map(|&i| &candidates[i])
                .filter(|c| c.has_magnet())
                .cloned()
                .collect();
            pool.sort_by(rank_order);
            pool.truncate(self.config.fallback_limit);
            debug!(fallback = pool.len(), "No candidate passed the threshold, using fallback");
        }

        let results = deduplicate(pool);

        let elapsed = started.elapsed();
        metrics::SEARCH_DURATION
            .with_label_values(&[if deadline_met { "met" } else { "exceeded" }])
            .observe(elapsed.as_secs_f64());
        metrics::SEARCH_CANDIDATES
            .with_label_values(&["returned"])
            .observe(results.len() as f64);
        info!(
            query = %combined,
            variants = variants.len(),
            plugins = plugins.len(),
            candidates = candidates.len(),
            results = results.len(),
            deadline_met,
            duration_ms = elapsed.as_millis() as u64,
            "Search finished"
        );

        results
    }

    /// Spawn one task per (plugin, variant) and collect whatever finishes
    /// before `deadline`.
    ///
    /// Tasks still running at the deadline are left to finish on their own;
    /// their results are dropped. The flag tells whether every task answered
    /// in time.
    async fn harvest(
        &self,
        plugins: &[Arc<dyn ScraperPlugin>],
        variants: &[String],
        deadline: Instant,
    ) -> (Vec<RawCandidate>, bool) {
        let total = plugins.len() * variants.len();
        let (tx, mut rx) = mpsc::channel::<Vec<RawCandidate>>(total);

        for plugin in plugins {
            for variant in variants {
                let plugin = plugin.clone();
                let variant = variant.clone();
                let tx = tx.clone();
                tokio::spawn(async move {
                    let candidates = search_one(plugin.as_ref(), &variant).await;
                    if tx.send(candidates).await.is_err() {
                        metrics::PLUGIN_SEARCHES
                            .with_label_values(&[plugin.id(), "late"])
                            .inc();
                        debug!(plugin = %plugin.id(), query = %variant, "Result arrived after deadline");
                    }
                });
            }
        }
        drop(tx);

        let mut harvested = Vec::new();
        let mut answered = 0usize;
        while answered < total {
            match tokio::time::timeout_at(deadline, rx.recv()).await {
                Ok(Some(batch)) => {
                    answered += 1;
                    harvested.extend(batch);
                }
                // Every sender gone: remaining tasks died without answering.
                Ok(None) => break,
                Err(_) => {
                    warn!(
                        answered,
                        pending = total - answered,
                        "Search deadline reached, using partial results"
                    );
                    return (harvested, false);
                }
            }
        }
        (harvested, true)
    }

    /// Indices of candidates worth resolving magnets for.
    fn select_for_resolution(&self, candidates: &[ScoredCandidate]) -> Vec<usize> {
        let above: Vec<usize> = candidates
            .iter()
            .enumerate()
            .filter(|(_, c)| c.score >= self.config.min_score)
            .map(|(i, _)| i)
            .collect();
        if !above.is_empty() {
            return above;
        }

        let mut ranked: Vec<usize> = (0..candidates.len()).collect();
        ranked.sort_by(|&a, &b| rank_order(&candidates[a], &candidates[b]));
        ranked.truncate(fallback_count(
            candidates.len(),
            self.config.resolve_fraction,
            self.config.resolve_min,
            self.config.resolve_max,
        ));
        ranked
    }

    /// Fill in magnets for selected candidates lacking one: derive from a
    /// hash in the detail URL when possible, else ask the owning plugin.
    async fn resolve_magnets(
        &self,
        candidates: &mut [ScoredCandidate],
        selected: &[usize],
        plugins: &[Arc<dyn ScraperPlugin>],
    ) {
        let by_id: HashMap<&str, &Arc<dyn ScraperPlugin>> =
            plugins.iter().map(|p| (p.id(), p)).collect();

        let mut jobs = Vec::new();
        for &i in selected {
            let c = &mut candidates[i];
            if c.has_magnet() {
                continue;
            }
            let Some(url) = c.url.clone() else {
                metrics::MAGNET_RESOLUTIONS.with_label_values(&["missing"]).inc();
                continue;
            };

            if let Some(derived) =
                magnet::hash_in_url(&url).and_then(|h| magnet::derive_from_info_hash(&h, Some(&c.title)))
            {
                c.magnet_uri = Some(derived);
                metrics::MAGNET_RESOLUTIONS.with_label_values(&["derived"]).inc();
                continue;
            }

            match by_id.get(c.plugin_id.as_str()) {
                Some(plugin) if plugin.has_magnet_resolver() => {
                    jobs.push((i, (*plugin).clone(), url));
                }
                _ => {
                    metrics::MAGNET_RESOLUTIONS.with_label_values(&["missing"]).inc();
                }
            }
        }

        if jobs.is_empty() {
            return;
        }
        debug!(detail_pages = jobs.len(), "Resolving magnets from detail pages");

        let lookups: Vec<_> = jobs
            .into_iter()
            .map(|(i, plugin, url)| async move { (i, plugin.resolve_magnet(&url).await) })
            .collect();
        let resolved: Vec<(usize, Option<String>)> = stream::iter(lookups)
            .buffer_unordered(self.config.resolve_concurrency.max(1))
            .collect()
            .await;

        for (i, magnet_uri) in resolved {
            match magnet_uri.filter(|m| !m.trim().is_empty()) {
                Some(m) => {
                    candidates[i].magnet_uri = Some(m);
                    metrics::MAGNET_RESOLUTIONS.with_label_values(&["resolved"]).inc();
                }
                None => {
                    metrics::MAGNET_RESOLUTIONS.with_label_values(&["missing"]).inc();
                }
            }
        }
    }
}

/// Run one plugin search, absorbing its failure.
async fn search_one(plugin: &dyn ScraperPlugin, query: &str) -> Vec<RawCandidate> {
    let started = std::time::Instant::now();
    let result = plugin.search(query, 1).await;
    metrics::PLUGIN_SEARCH_DURATION
        .with_label_values(&[plugin.id()])
        .observe(started.elapsed().as_secs_f64());

    match result {
        Ok(candidates) => {
            metrics::PLUGIN_SEARCHES
                .with_label_values(&[plugin.id(), "ok"])
                .inc();
            debug!(plugin = %plugin.id(), query = %query, results = candidates.len(), "Plugin search done");
            candidates
        }
        Err(e) => {
            metrics::PLUGIN_SEARCHES
                .with_label_values(&[plugin.id(), "error"])
                .inc();
            warn!(plugin = %plugin.id(), query = %query, error = %e, "Plugin search failed");
            Vec::new()
        }
    }
}

/// Better of the score against the full request and against the variant
/// that found the candidate.
fn relevance(combined: &str, variant: &str, title: &str, seeders: u32) -> u8 {
    score(combined, title, seeders).max(score(variant, title, seeders))
}

/// How many top candidates to resolve when none clears the threshold:
/// `fraction` of the pool, bounded to `[min, max]`.
fn fallback_count(total: usize, fraction: f32, min: usize, max: usize) -> usize {
    let share = (total as f32 * fraction).round() as usize;
    min.max(max.min(share))
}
