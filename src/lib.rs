// src/lib.rs
// Public library surface for the service binary, the CLI and integration tests.

pub mod api;
pub mod classify;
pub mod config;
pub mod enrich;
pub mod error;
pub mod feed;
pub mod metrics;
pub mod monitor;
pub mod notify;
pub mod seen;
pub mod storage;
pub mod types;

// ---- Re-exports for stable public API ----
pub use crate::api::{create_router, AppState};
pub use crate::classify::classify;
pub use crate::config::MonitorConfig;
pub use crate::monitor::Monitor;
pub use crate::types::{
    BetKind, CandidateItem, Channel, EnrichedItem, NotificationOutcome, RunReport, Tip,
};

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install a fmt subscriber. `LOG_FORMAT=json` switches to JSON lines.
/// Safe to call when a subscriber already exists (e.g. under Shuttle).
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,rhys_monitor=info"));
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let res = if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact())
            .try_init()
    };
    if res.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}
