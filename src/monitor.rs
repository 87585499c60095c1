// src/monitor.rs
//! Run orchestration: fetch → classify → enrich → dispatch → commit → report.

use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use metrics::{counter, gauge, histogram};

use crate::classify::classify;
use crate::config::MonitorConfig;
use crate::enrich::{extractor::build_extractor, Enricher};
use crate::error::StorageError;
use crate::feed::{self, http::HttpFetch, http::ReqwestFetcher};
use crate::notify::Dispatcher;
use crate::seen::{SeenSet, SeenStore};
use crate::storage::{FileKvStore, KvStore};
use crate::types::{EnrichedItem, RunReport};

/// Where a run is. Only used for logging; there is no retry between phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Idle,
    Fetching,
    Classifying,
    NoNewItems,
    Enriching,
    Dispatching,
    Committing,
    Failed,
    Reporting,
}

fn enter(phase: RunPhase) {
    tracing::debug!(target: "monitor", ?phase, "phase");
}

pub struct Monitor {
    cfg: Arc<MonitorConfig>,
    http: Arc<dyn HttpFetch>,
    seen: SeenStore,
    enricher: Option<Enricher>,
    dispatcher: Dispatcher,
}

impl Monitor {
    /// Bare pipeline: no enrichment, channels taken from `cfg`.
    pub fn new(cfg: MonitorConfig, http: Arc<dyn HttpFetch>, kv: Arc<dyn KvStore>) -> Self {
        let dispatcher =
            Dispatcher::from_channels(&cfg.enabled_channels(), &cfg.author_name, cfg.http_timeout());
        let seen = SeenStore::new(kv, cfg.seen_key.clone());
        Self {
            cfg: Arc::new(cfg),
            http,
            seen,
            enricher: None,
            dispatcher,
        }
    }

    pub fn with_enricher(mut self, enricher: Enricher) -> Self {
        self.enricher = Some(enricher);
        self
    }

    pub fn with_dispatcher(mut self, dispatcher: Dispatcher) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    /// Production wiring: reqwest transport, JSON file store, OpenAI
    /// enrichment when a key is configured.
    pub fn from_config(cfg: MonitorConfig) -> Result<Self> {
        let http: Arc<dyn HttpFetch> = Arc::new(ReqwestFetcher::new(cfg.http_timeout())?);
        let kv: Arc<dyn KvStore> = Arc::new(FileKvStore::new(cfg.state_path.clone()));
        let enrichment = cfg.enrichment();
        let timeout = cfg.http_timeout();

        let mut monitor = Self::new(cfg, http.clone(), kv);
        match enrichment {
            Some(settings) => {
                let extractor = build_extractor(&settings, timeout)?;
                monitor = monitor.with_enricher(Enricher::new(http, extractor, &settings)?);
                tracing::info!(target: "monitor", model = %settings.model, "enrichment enabled");
            }
            None => tracing::info!(target: "monitor", "🤖 OPENAI_API_KEY not set, enrichment disabled"),
        }
        Ok(monitor)
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.cfg
    }

    /// One end-to-end check. Never panics or returns an error: failures are
    /// in the report.
    pub async fn run_once(&self) -> RunReport {
        let started_at = Utc::now();
        let t0 = std::time::Instant::now();
        let author = self.cfg.author_name.as_str();
        counter!("monitor_runs_total").increment(1);
        enter(RunPhase::Idle);
        tracing::info!(target: "monitor", %author, at = %started_at.to_rfc3339(), "🔍 starting check");

        enter(RunPhase::Fetching);
        let candidates = match feed::fetch_candidates(self.http.as_ref(), &self.cfg, started_at).await {
            Ok(c) => c,
            Err(e) => {
                enter(RunPhase::Failed);
                counter!("monitor_runs_failed_total").increment(1);
                tracing::error!(target: "monitor", error = %e, "❌ feed check failed");
                enter(RunPhase::Reporting);
                return RunReport::failed(started_at, format!("Failed to fetch RSS feed: {e}"));
            }
        };

        enter(RunPhase::Classifying);
        let seen = self.seen.load().await;
        let fresh = classify(&candidates, &seen);
        tracing::info!(
            target: "monitor",
            candidates = candidates.len(),
            seen = seen.len(),
            new = fresh.len(),
            "classified"
        );

        if fresh.is_empty() {
            enter(RunPhase::NoNewItems);
            tracing::info!(target: "monitor", "📭 No new {author} posts found");
            enter(RunPhase::Reporting);
            self.record_run(t0);
            return RunReport::completed(started_at, author, Vec::new(), Vec::new(), false);
        }

        enter(RunPhase::Enriching);
        let mut items = Vec::with_capacity(fresh.len());
        for c in fresh {
            tracing::info!(target: "monitor", title = %c.title, link = %c.link, "✨ new post");
            let tips = match &self.enricher {
                Some(e) => e.enrich(&c).await,
                None => Vec::new(),
            };
            items.push(EnrichedItem { item: c, tips });
        }

        enter(RunPhase::Dispatching);
        let outcomes = self.dispatcher.dispatch(&items).await;

        enter(RunPhase::Committing);
        let committed = match self.seen.commit(items.iter().map(|i| i.item.link.clone())).await {
            Ok(total) => {
                gauge!("seen_set_size").set(total as f64);
                true
            }
            Err(e) => {
                counter!("seen_commit_failures_total").increment(1);
                tracing::error!(target: "monitor", error = %e, "seen-set commit failed; these items may be re-notified next run");
                false
            }
        };

        enter(RunPhase::Reporting);
        counter!("monitor_new_items_total").increment(items.len() as u64);
        self.record_run(t0);
        tracing::info!(target: "monitor", new = items.len(), committed, "🎉 check finished");
        RunReport::completed(started_at, author, items, outcomes, committed)
    }

    fn record_run(&self, t0: std::time::Instant) {
        histogram!("monitor_run_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
        gauge!("monitor_last_run_ts").set(Utc::now().timestamp() as f64);
    }

    pub async fn clear_seen(&self) -> Result<(), StorageError> {
        self.seen.clear().await
    }

    pub async fn seen_snapshot(&self) -> Result<SeenSet, StorageError> {
        self.seen.snapshot().await
    }
}
