//! Alert and safety threshold evaluation.
//!
//! Pure logic: the hub passes in the latest reading and the thresholds in
//! force at that moment. Every reading above its threshold alerts again;
//! there is no cooldown.

use chrono::Utc;
use serde::Serialize;

use crate::alert::MetricAlert;
use crate::types::{Metric, SensorReading, UnitId, Uptime};

/// Any metric above this value implies the actuator should be running.
pub const SAFETY_THRESHOLD: f64 = 70.0;

/// Alert threshold in force until the operator changes it.
pub const DEFAULT_ALERT_THRESHOLD: f64 = 100.0;

/// Operator-configured alert thresholds, one per metric.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Thresholds {
    values: [f64; 4],
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            values: [DEFAULT_ALERT_THRESHOLD; 4],
        }
    }
}

impl Thresholds {
    pub fn get(&self, metric: Metric) -> f64 {
        self.values[metric.index()]
    }

    /// Set a threshold, clamped to the `[0, 100]` scale. Returns the value
    /// actually stored.
    pub fn set(&mut self, metric: Metric, value: f64) -> f64 {
        let value = if value.is_nan() { DEFAULT_ALERT_THRESHOLD } else { value.clamp(0.0, 100.0) };
        self.values[metric.index()] = value;
        value
    }
}

/// Return one alert per metric strictly above its configured threshold.
pub fn evaluate(
    unit_id: &UnitId,
    field_number: u8,
    reading: &SensorReading,
    uptime: Uptime,
    thresholds: &Thresholds,
) -> Vec<MetricAlert> {
    let now = Utc::now();

    reading
        .iter()
        .filter(|(metric, value)| *value > thresholds.get(*metric))
        .map(|(metric, value)| MetricAlert {
            unit_id: unit_id.clone(),
            field_number,
            metric,
            value,
            threshold: thresholds.get(metric),
            uptime,
            timestamp: now,
        })
        .collect()
}

/// Whether any metric is strictly above [`SAFETY_THRESHOLD`].
pub fn exceeds_safety(reading: &SensorReading) -> bool {
    reading.iter().any(|(_, value)| value > SAFETY_THRESHOLD)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_alerts_at_default_thresholds() {
        let reading = SensorReading::new(100.0, 99.0, 50.0, 0.0);
        let alerts = evaluate(&UnitId::sensing(), 1, &reading, Uptime::default(), &Thresholds::default());
        assert!(alerts.is_empty());
    }

    #[test]
    fn alert_when_reading_exceeds_configured_threshold() {
        let mut thresholds = Thresholds::default();
        thresholds.set(Metric::WaterLevel, 80.0);

        let reading = SensorReading::new(10.0, 85.0, 10.0, 10.0);
        let alerts = evaluate(&UnitId::sensing(), 1, &reading, Uptime::from_secs(5), &thresholds);

        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].metric, Metric::WaterLevel);
        assert_eq!(alerts[0].value, 85.0);
        assert_eq!(alerts[0].threshold, 80.0);
        assert_eq!(
            alerts[0].to_string(),
            "Water level of Field 1 exceeds the limit : 85.0 > 80, should be investigated. (at 00:00:05)"
        );
    }

    #[test]
    fn equal_to_threshold_does_not_alert() {
        let mut thresholds = Thresholds::default();
        thresholds.set(Metric::Temperature, 30.0);
        let reading = SensorReading::new(0.0, 0.0, 30.0, 0.0);
        assert!(evaluate(&UnitId::emitting(), 2, &reading, Uptime::default(), &thresholds).is_empty());
    }

    #[test]
    fn repeated_evaluation_alerts_every_time() {
        let mut thresholds = Thresholds::default();
        thresholds.set(Metric::SoilHumidity, 10.0);
        let reading = SensorReading::new(50.0, 0.0, 0.0, 0.0);

        for _ in 0..3 {
            assert_eq!(
                evaluate(&UnitId::sensing(), 1, &reading, Uptime::default(), &thresholds).len(),
                1
            );
        }
    }

    #[test]
    fn thresholds_are_clamped() {
        let mut thresholds = Thresholds::default();
        assert_eq!(thresholds.set(Metric::WaterLevel, 150.0), 100.0);
        assert_eq!(thresholds.set(Metric::WaterLevel, -5.0), 0.0);
        assert_eq!(thresholds.get(Metric::WaterLevel), 0.0);
    }

    #[test]
    fn safety_threshold_is_strict() {
        assert!(!exceeds_safety(&SensorReading::new(70.0, 70.0, 70.0, 70.0)));
        assert!(exceeds_safety(&SensorReading::new(75.0, 0.0, 0.0, 0.0)));
        assert!(exceeds_safety(&SensorReading::new(0.0, 0.0, 0.0, 70.01)));
    }
}
