use anyhow::{Context, Result};
use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the global Prometheus recorder and describe our series so they
    /// show up on /metrics before the first run.
    pub fn init() -> Result<Self> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("prometheus: install recorder")?;
        describe();
        Ok(Self { handle })
    }
}

fn describe() {
    describe_counter!("monitor_runs_total", "Checks started.");
    describe_counter!("monitor_runs_failed_total", "Checks aborted by a feed error.");
    describe_counter!("monitor_new_items_total", "New posts found across all checks.");
    describe_histogram!("monitor_run_ms", "Check duration in milliseconds.");
    describe_gauge!("monitor_last_run_ts", "Unix ts of the last completed check.");
    describe_counter!("feed_fetch_errors_total", "Feed network or HTTP status errors.");
    describe_counter!("feed_candidates_total", "Author-matching feed entries seen.");
    describe_histogram!("feed_fetch_ms", "Feed fetch+parse time in milliseconds.");
    describe_counter!("enrich_items_total", "Enrichment attempts by status.");
    describe_counter!("notify_sent_total", "Alerts delivered, by channel.");
    describe_counter!("notify_failed_total", "Alert deliveries that failed, by channel.");
    describe_counter!("seen_commit_failures_total", "Seen-set writes that failed.");
    describe_gauge!("seen_set_size", "Links in the seen-set after the last commit.");
}
