//! `fieldlink-agent` -- field unit daemon.
//!
//! Runs on each field unit, pushes sensor telemetry to the hub over TCP
//! and applies actuator commands received from it. The Sensing role also
//! evaluates the liveness pulse; the Emitting role generates it.
//!
//! # Environment variables
//!
//! See [`AgentConfig::from_env`](fieldlink_agent::config::AgentConfig::from_env)
//! for the full table. `AGENT_ROLE` is the only required variable.

use fieldlink_agent::config::AgentConfig;
use fieldlink_agent::hardware::Hardware;
use fieldlink_agent::role;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fieldlink_agent=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AgentConfig::from_env().unwrap_or_else(|e| {
        tracing::error!(error = %e, "Invalid agent configuration");
        std::process::exit(1);
    });

    let hardware = Hardware::acquire(&config.hardware, config.pulse_probability).unwrap_or_else(|e| {
        tracing::error!(error = %e, "Failed to acquire hardware capabilities");
        std::process::exit(1);
    });

    tracing::info!(
        role = %config.role,
        unit_id = %config.unit_id,
        backend = %config.hardware,
        "Starting fieldlink-agent",
    );

    tokio::select! {
        result = role::run(config, hardware) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "Field unit stopped");
                std::process::exit(1);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown requested");
        }
    }
}
