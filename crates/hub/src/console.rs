//! Line-oriented operator console.
//!
//! Reads one command per line and writes a human-readable reply. Parse
//! and delivery errors are reported back to the operator and never stop
//! the console.

use std::fmt::Write as _;
use std::str::FromStr;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::Instant;

use fieldlink_core::{Command, Metric};

use crate::dispatch;
use crate::state::Hub;
use crate::status;

/// Alerts listed by `alerts` when no count is given.
const DEFAULT_ALERT_COUNT: usize = 10;

const HELP: &str = "\
Commands:
  on <unit> <seconds>                 turn the pump on for a duration
  off <unit>                          turn the pump off
  threshold <unit> <metric> <value>   set an alert threshold (0-100)
  status                              show every field
  alerts [n]                          show the latest alerts
  help                                show this message
Units are named by id (pi_1) or field number (1).";

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConsoleError {
    #[error("unknown command '{0}', type 'help'")]
    UnknownCommand(String),

    #[error("usage: {0}")]
    Usage(&'static str),

    #[error("invalid number '{0}'")]
    InvalidNumber(String),

    #[error("{0}")]
    InvalidMetric(String),

    #[error("unknown unit '{0}'")]
    UnknownUnit(String),
}

/// A parsed operator command.
#[derive(Debug, Clone, PartialEq)]
pub enum OperatorCommand {
    On { unit: String, seconds: f64 },
    Off { unit: String },
    Threshold { unit: String, metric: Metric, value: f64 },
    Status,
    Alerts { count: usize },
    Help,
}

fn number<T: FromStr>(text: &str) -> Result<T, ConsoleError> {
    text.parse()
        .map_err(|_| ConsoleError::InvalidNumber(text.to_string()))
}

impl FromStr for OperatorCommand {
    type Err = ConsoleError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let words: Vec<&str> = line.split_whitespace().collect();
        let Some((&verb, args)) = words.split_first() else {
            return Err(ConsoleError::UnknownCommand(String::new()));
        };

        match (verb.to_ascii_lowercase().as_str(), args) {
            ("on", [unit, seconds]) => Ok(Self::On {
                unit: unit.to_string(),
                seconds: number(seconds)?,
            }),
            ("on", _) => Err(ConsoleError::Usage("on <unit> <seconds>")),
            ("off", [unit]) => Ok(Self::Off {
                unit: unit.to_string(),
            }),
            ("off", _) => Err(ConsoleError::Usage("off <unit>")),
            ("threshold", [unit, metric, value]) => Ok(Self::Threshold {
                unit: unit.to_string(),
                metric: metric.parse().map_err(ConsoleError::InvalidMetric)?,
                value: number(value)?,
            }),
            ("threshold", _) => Err(ConsoleError::Usage("threshold <unit> <metric> <value>")),
            ("status", []) => Ok(Self::Status),
            ("alerts", []) => Ok(Self::Alerts {
                count: DEFAULT_ALERT_COUNT,
            }),
            ("alerts", [count]) => Ok(Self::Alerts {
                count: number(count)?,
            }),
            ("alerts", _) => Err(ConsoleError::Usage("alerts [n]")),
            ("help" | "?", _) => Ok(Self::Help),
            (_, _) => Err(ConsoleError::UnknownCommand(verb.to_string())),
        }
    }
}

/// Carry out one operator command and return the reply text.
pub async fn execute(hub: &Hub, command: OperatorCommand) -> Result<String, ConsoleError> {
    match command {
        OperatorCommand::On { unit, seconds } => {
            let unit = hub.unit(&unit).ok_or(ConsoleError::UnknownUnit(unit))?;
            let command = Command::activate_secs(seconds)
                .map_err(|_| ConsoleError::InvalidNumber(seconds.to_string()))?;
            Ok(match dispatch::send_command(hub, unit, command).await {
                Ok(()) => format!("{}: pump on for {seconds}s", unit.title()),
                Err(e) => format!("{}: command not delivered: {e}", unit.title()),
            })
        }
        OperatorCommand::Off { unit } => {
            let unit = hub.unit(&unit).ok_or(ConsoleError::UnknownUnit(unit))?;
            Ok(match dispatch::send_command(hub, unit, Command::Deactivate).await {
                Ok(()) => format!("{}: pump off", unit.title()),
                Err(e) => format!("{}: command not delivered: {e}", unit.title()),
            })
        }
        OperatorCommand::Threshold { unit, metric, value } => {
            let unit = hub.unit(&unit).ok_or(ConsoleError::UnknownUnit(unit))?;
            let stored = hub
                .sessions
                .set_threshold(&unit.id, metric, value)
                .await
                .ok_or_else(|| ConsoleError::UnknownUnit(unit.id.to_string()))?;
            tracing::info!(unit_id = %unit.id, metric = metric.key(), threshold = stored, "Threshold updated");
            Ok(format!("{}: {} alert threshold set to {stored:.2}", unit.title(), metric.label()))
        }
        OperatorCommand::Status => {
            let snapshots = hub.sessions.snapshots(Instant::now()).await;
            Ok(snapshots
                .iter()
                .map(status::render)
                .collect::<Vec<_>>()
                .join("\n"))
        }
        OperatorCommand::Alerts { count } => {
            let alerts = hub.alerts.recent(count);
            if alerts.is_empty() {
                return Ok("No alerts".to_string());
            }
            let mut out = String::new();
            for alert in alerts {
                let _ = writeln!(out, "[{}] {alert}", alert.timestamp.format("%Y-%m-%d %H:%M:%S"));
            }
            out.pop();
            Ok(out)
        }
        OperatorCommand::Help => Ok(HELP.to_string()),
    }
}

/// Serve operator commands from `input` until it is exhausted.
pub async fn run<R, W>(hub: Hub, input: R, mut output: W) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let reply = match line.parse::<OperatorCommand>() {
            Ok(command) => execute(&hub, command).await,
            Err(e) => Err(e),
        };
        let reply = reply.unwrap_or_else(|e| format!("error: {e}"));

        output.write_all(reply.as_bytes()).await?;
        output.write_all(b"\n").await?;
        output.flush().await?;
    }

    tracing::info!("Operator console closed");
    Ok(())
}
