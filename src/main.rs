//! Feed monitor service. Boots the Axum HTTP server; an external scheduler
//! (cron, uptime pinger) hits `/api/check` to trigger a run.

use rhys_monitor::{api, metrics::Metrics, Monitor, MonitorConfig};
use shuttle_axum::ShuttleAxum;

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    rhys_monitor::init_tracing();

    let cfg = MonitorConfig::load()?;
    tracing::info!(
        feed = %cfg.feed_url,
        author = %cfg.author_name,
        state = %cfg.state_path.display(),
        "monitor config loaded"
    );

    let monitor = Monitor::from_config(cfg)?;
    let mut state = api::AppState::new(monitor);
    match Metrics::init() {
        Ok(m) => state = state.with_metrics(m.handle),
        Err(e) => tracing::warn!(error = %format!("{e:#}"), "metrics disabled"),
    }

    let router = api::create_router(state);
    Ok(router.into())
}
