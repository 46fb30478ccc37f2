mod api;
mod bootstrap;
mod health;
mod jobs;
mod notify;

use std::time::Duration;

use anyhow::Result;
use funil_core::config::{AppConfig, LoadOptions};

fn init_logging(config: &AppConfig) {
    use funil_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    // Load config and initialize logging before any other operations
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;

    health::spawn(
        &app.config.server.bind_address,
        app.config.server.health_check_port,
        app.db_pool.clone(),
    )
    .await?;

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    let (sla_report, monitor_handle) = jobs::spawn_sla_monitor(
        app.deals.clone(),
        Duration::from_secs(app.config.monitor.poll_interval_secs),
        shutdown_rx.clone(),
    );

    let sweep_handle = app.config.sweep.enabled.then(|| {
        jobs::spawn_sweep_job(
            app.sweeper.clone(),
            Duration::from_secs(app.config.sweep.interval_secs),
            shutdown_rx.clone(),
        )
    });

    let state = api::ApiState {
        deals: app.deals.clone(),
        followup_stages: app.followup_stages.clone(),
        transitions: app.transitions.clone(),
        tracking: app.tracking.clone(),
        sweeper: app.sweeper.clone(),
        notifier: app.notifier.clone(),
        sla_report,
    };

    let address = format!("{}:{}", app.config.server.bind_address, app.config.server.port);
    let listener = tokio::net::TcpListener::bind(&address).await?;
    tracing::info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        deal_id = "unknown",
        bind_address = %address,
        "funil-server started"
    );

    axum::serve(listener, api::router(state)).with_graceful_shutdown(wait_for_shutdown()).await?;

    tracing::info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        deal_id = "unknown",
        "funil-server stopping"
    );

    let _ = shutdown_tx.send(true);
    let _ = monitor_handle.await;
    if let Some(handle) = sweep_handle {
        let _ = handle.await;
    }

    Ok(())
}

async fn wait_for_shutdown() {
    let _ = tokio::signal::ctrl_c().await;
}
