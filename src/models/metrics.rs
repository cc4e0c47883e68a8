//! Per-operation timing records and bounded histories.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Default capacity of the query and performance histories.
pub const DEFAULT_HISTORY_CAPACITY: usize = 100;

/// Timing and success of one data-access operation.
#[derive(Debug, Clone, Serialize)]
pub struct PerformanceRecord {
    pub operation: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub duration: Option<Duration>,
    pub success: bool,
    pub error: Option<String>,
    #[serde(skip)]
    started: Instant,
}

impl PerformanceRecord {
    pub fn start(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            started_at: Utc::now(),
            finished_at: None,
            duration: None,
            success: false,
            error: None,
            started: Instant::now(),
        }
    }

    pub fn mark_completed(&mut self) {
        self.finish();
        self.success = true;
    }

    pub fn mark_failed(&mut self, error: impl Into<String>) {
        self.finish();
        self.success = false;
        self.error = Some(error.into());
    }

    pub fn is_finished(&self) -> bool {
        self.finished_at.is_some()
    }

    fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
        self.duration = Some(self.started.elapsed());
    }
}

/// Append-only ring: once full, pushing drops the oldest entry.
#[derive(Debug, Clone)]
pub struct HistoryBuffer<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T> HistoryBuffer<T> {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self { items: VecDeque::with_capacity(capacity), capacity }
    }

    pub fn push(&mut self, item: T) {
        if self.items.len() == self.capacity {
            self.items.pop_front();
        }
        self.items.push_back(item);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }

    pub fn latest(&self) -> Option<&T> {
        self.items.back()
    }
}

impl<T: Clone> HistoryBuffer<T> {
    pub fn to_vec(&self) -> Vec<T> {
        self.items.iter().cloned().collect()
    }
}

impl<T> Default for HistoryBuffer<T> {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_drops_oldest_when_full() {
        let mut history = HistoryBuffer::new(3);
        for value in 1..=5 {
            history.push(value);
        }
        assert_eq!(history.len(), 3);
        assert_eq!(history.to_vec(), vec![3, 4, 5]);
        assert_eq!(history.latest(), Some(&5));
    }

    #[test]
    fn zero_capacity_is_clamped() {
        let mut history = HistoryBuffer::new(0);
        history.push("a");
        history.push("b");
        assert_eq!(history.capacity(), 1);
        assert_eq!(history.to_vec(), vec!["b"]);
    }

    #[test]
    fn performance_record_marks_outcome() {
        let mut record = PerformanceRecord::start("connect");
        assert!(!record.is_finished());

        record.mark_failed("refused");
        assert!(record.is_finished());
        assert!(!record.success);
        assert_eq!(record.error.as_deref(), Some("refused"));
        assert!(record.duration.is_some());

        let mut record = PerformanceRecord::start("get_databases");
        record.mark_completed();
        assert!(record.success);
        assert!(record.error.is_none());
    }
}
