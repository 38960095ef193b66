//! `fieldlink-hub` -- central monitoring hub.
//!
//! Accepts telemetry from both field units, keeps their session state,
//! raises threshold alerts and forwards operator commands to the units'
//! actuators. Operator commands are read from stdin.
//!
//! # Environment variables
//!
//! See [`HubConfig::from_env`](fieldlink_hub::config::HubConfig::from_env)
//! for the full table. Every variable has a default.

use fieldlink_hub::config::HubConfig;
use fieldlink_hub::{console, receiver, status, Hub};

use tokio::io::BufReader;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fieldlink_hub=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = HubConfig::from_env().unwrap_or_else(|e| {
        tracing::error!(error = %e, "Invalid hub configuration");
        std::process::exit(1);
    });

    let hub = Hub::new(&config);

    for unit in config.units.iter().cloned() {
        let listener = TcpListener::bind((config.bind_host, unit.telemetry_port))
            .await
            .unwrap_or_else(|e| {
                tracing::error!(
                    unit_id = %unit.id,
                    port = unit.telemetry_port,
                    error = %e,
                    "Failed to bind telemetry listener",
                );
                std::process::exit(1);
            });
        tokio::spawn(receiver::run(listener, unit, hub.clone()));
    }

    let cancel = CancellationToken::new();
    let status_task = tokio::spawn(status::run(hub.clone(), config.status_interval, cancel.clone()));

    let console_hub = hub.clone();
    tokio::spawn(async move {
        let input = BufReader::new(tokio::io::stdin());
        if let Err(e) = console::run(console_hub, input, tokio::io::stdout()).await {
            tracing::warn!(error = %e, "Operator console failed");
        }
    });

    tracing::info!(
        bind = %config.bind_host,
        units = config.units.len(),
        alert_log_capacity = config.alert_log_capacity,
        "Starting fieldlink-hub",
    );

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutdown requested");

    cancel.cancel();
    let _ = status_task.await;
}
