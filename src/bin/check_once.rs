//! Run a single check from the command line (cron-friendly).
//! Prints the run report as JSON; exits 1 when the run failed.

use anyhow::Context;
use rhys_monitor::{Monitor, MonitorConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    rhys_monitor::init_tracing();

    let cfg = MonitorConfig::load().context("loading monitor config")?;
    let monitor = Monitor::from_config(cfg)?;
    let report = monitor.run_once().await;

    println!(
        "{}",
        serde_json::to_string_pretty(&report).context("serializing report")?
    );

    if !report.succeeded {
        std::process::exit(1);
    }
    Ok(())
}
