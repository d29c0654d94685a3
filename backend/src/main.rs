//! Bookshelf daemon: wires the catalogue core onto in-memory adapters and keeps
//! its background tasks running until Ctrl-C.

use std::sync::Arc;
use std::time::Duration;

use color_eyre::eyre::{Result, eyre};
use mockable::DefaultClock;
use ortho_config::OrthoConfig;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

use bookshelf::Bookshelf;
use bookshelf::config::AppSettings;

/// Application bootstrap.
#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    if let Err(e) = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .try_init()
    {
        warn!(error = %e, "tracing init failed");
    }

    let settings = AppSettings::load().map_err(|err| eyre!("failed to load settings: {err}"))?;
    let app = Arc::new(Bookshelf::in_memory(&settings, Arc::new(DefaultClock))?);

    let sweeper = app.sweeper().spawn();
    let reporter = tokio::spawn(report_health(
        Arc::clone(&app),
        settings.health_report_interval(),
    ));
    app.health_state().mark_ready();
    info!(
        retention_hours = settings.idempotency_retention_hours,
        checks = ?app.health().check_names(),
        "bookshelf ready"
    );

    tokio::signal::ctrl_c().await?;
    app.health_state().mark_unhealthy();
    sweeper.abort();
    reporter.abort();
    info!("bookshelf stopped");
    Ok(())
}

async fn report_health(app: Arc<Bookshelf>, every: Duration) {
    let mut interval = tokio::time::interval(every);
    loop {
        interval.tick().await;
        let report = app.health().run().await;
        let failing: Vec<&str> = report
            .checks
            .iter()
            .filter(|check| !check.healthy)
            .map(|check| check.name.as_str())
            .collect();
        if failing.is_empty() {
            info!(checks = report.checks.len(), "health report: healthy");
        } else {
            let report = serde_json::to_string(&report).unwrap_or_default();
            warn!(?failing, %report, "health report: unhealthy");
        }
    }
}
