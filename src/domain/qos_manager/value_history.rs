use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QosValue<V> {
    pub value: V,
    pub timestamp_ms: i64,
}

/// Ring buffer of the most recent measurements of one metric. The oldest entry is
/// dropped once the capacity is reached.
#[derive(Debug, Clone)]
pub struct ValueHistory<V> {
    capacity: usize,
    entries: VecDeque<QosValue<V>>,
}

impl<V> ValueHistory<V> {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        ValueHistory { capacity, entries: VecDeque::with_capacity(capacity) }
    }

    pub fn add(&mut self, value: V, timestamp_ms: i64) {
        if self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(QosValue { value, timestamp_ms });
    }

    pub fn last(&self) -> Option<&QosValue<V>> {
        self.entries.back()
    }

    pub fn last_timestamp_ms(&self) -> Option<i64> {
        self.entries.back().map(|entry| entry.timestamp_ms)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &QosValue<V>> {
        self.entries.iter()
    }
}

impl ValueHistory<f64> {
    pub fn average(&self) -> Option<f64> {
        if self.entries.is_empty() {
            return None;
        }
        Some(self.entries.iter().map(|entry| entry.value).sum::<f64>() / self.entries.len() as f64)
    }
}
