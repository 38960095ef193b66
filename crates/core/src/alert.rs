//! Metric alert records surfaced to the operator.

use std::fmt;

use serde::Serialize;

use crate::types::{Metric, Timestamp, UnitId, Uptime};

/// A single configured-threshold violation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricAlert {
    /// The field unit whose reading triggered the alert.
    pub unit_id: UnitId,
    /// Operator-facing field number (1 or 2).
    pub field_number: u8,
    pub metric: Metric,
    /// The observed value that triggered the alert.
    pub value: f64,
    /// The threshold in force when the reading arrived.
    pub threshold: f64,
    /// Uptime reported alongside the reading.
    pub uptime: Uptime,
    /// When the hub recorded the alert.
    pub timestamp: Timestamp,
}

impl fmt::Display for MetricAlert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} of Field {} exceeds the limit : {:?} > {}, should be investigated. (at {})",
            self.metric.label(),
            self.field_number,
            self.value,
            self.threshold,
            self.uptime,
        )
    }
}
