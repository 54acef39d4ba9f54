use super::api_client;
use anyhow::Result;
use colored::{ColoredString, Colorize};
use doks_application::HealthMonitor;
use doks_core::config::DoksConfig;
use doks_core::health::HealthStatus;
use doks_core::schedule::TokioScheduler;
use std::sync::Arc;

pub async fn run(config: &DoksConfig, watch: bool) -> Result<()> {
    let monitor = HealthMonitor::new(
        api_client(config)?,
        Arc::new(TokioScheduler),
        config.health.clone(),
    );

    if watch {
        return watch_until_interrupted(&monitor).await;
    }

    monitor.check_health(true).await;
    println!("{}", styled_summary(&monitor));

    if monitor.state().is_healthy != Some(true) {
        anyhow::bail!("API at {} is not healthy", config.api.base_url);
    }
    Ok(())
}

async fn watch_until_interrupted(monitor: &Arc<HealthMonitor>) -> Result<()> {
    let mut updates = monitor.subscribe();
    monitor.start().await;

    let mut last = monitor.summary();
    println!("{}", styled_summary(monitor));
    println!("{}", "Watching API health, press Ctrl-C to stop.".bright_black());

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            result = &mut ctrl_c => {
                result?;
                break;
            }
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let summary = monitor.summary();
                if summary != last {
                    println!("{}", styled_summary(monitor));
                    last = summary;
                }
            }
        }
    }

    monitor.stop();
    Ok(())
}

/// Summary colored by status.
pub fn styled_summary(monitor: &HealthMonitor) -> ColoredString {
    let summary = monitor.summary();
    match monitor.status() {
        HealthStatus::Unknown => summary.bright_black(),
        HealthStatus::Healthy => summary.green(),
        HealthStatus::Recovering { .. } => summary.yellow(),
        HealthStatus::Failed { .. } => summary.red(),
    }
}
