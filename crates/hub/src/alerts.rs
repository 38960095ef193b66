//! Bounded in-memory log of metric alerts.

use std::collections::VecDeque;
use std::sync::Mutex;

use fieldlink_core::alert::MetricAlert;

use crate::config::DEFAULT_ALERT_LOG_CAPACITY;

/// Append-only ring buffer of alerts. When full, the oldest alert is
/// dropped to make room. Repeated alerts are kept as separate entries.
pub struct AlertLog {
    capacity: usize,
    entries: Mutex<VecDeque<MetricAlert>>,
}

impl AlertLog {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: Mutex::new(VecDeque::with_capacity(capacity.min(DEFAULT_ALERT_LOG_CAPACITY))),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn push(&self, alert: MetricAlert) {
        let mut entries = self.lock();
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(alert);
    }

    /// The `n` most recent alerts, oldest first.
    pub fn recent(&self, n: usize) -> Vec<MetricAlert> {
        let entries = self.lock();
        let skip = entries.len().saturating_sub(n);
        entries.iter().skip(skip).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<MetricAlert>> {
        // A panic while holding the lock leaves the deque intact.
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for AlertLog {
    fn default() -> Self {
        Self::new(DEFAULT_ALERT_LOG_CAPACITY)
    }
}
