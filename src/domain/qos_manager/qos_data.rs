use std::collections::HashMap;

use crate::domain::qos_manager::value_history::{QosValue, ValueHistory};
use crate::domain::qos_model::id::{ChannelId, ExecutionVertexId};
use crate::domain::qos_reporter::statistics::{EdgeStatistics, VertexStatistics};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GateCombinationStatistics {
    pub latency_ms: Option<f64>,
    pub records_consumed_per_sec: Option<f64>,
    pub records_emitted_per_sec: Option<f64>,
}

impl From<&VertexStatistics> for GateCombinationStatistics {
    fn from(statistics: &VertexStatistics) -> Self {
        GateCombinationStatistics {
            latency_ms: statistics.latency_ms,
            records_consumed_per_sec: statistics.records_consumed_per_sec,
            records_emitted_per_sec: statistics.records_emitted_per_sec,
        }
    }
}

pub type GateCombination = (Option<usize>, Option<usize>);

/// Measurements of one member vertex, per (input gate, output gate) combination.
#[derive(Debug, Clone)]
pub struct VertexQosData {
    vertex_id: ExecutionVertexId,
    history_capacity: usize,
    statistics: HashMap<GateCombination, ValueHistory<GateCombinationStatistics>>,
}

impl VertexQosData {
    pub fn new(vertex_id: ExecutionVertexId, history_capacity: usize) -> Self {
        VertexQosData { vertex_id, history_capacity, statistics: HashMap::new() }
    }

    pub fn vertex_id(&self) -> &ExecutionVertexId {
        &self.vertex_id
    }

    pub fn prepare_for_reports_on(&mut self, gates: GateCombination) {
        let capacity = self.history_capacity;
        self.statistics.entry(gates).or_insert_with(|| ValueHistory::new(capacity));
    }

    pub fn is_prepared_for(&self, gates: GateCombination) -> bool {
        self.statistics.contains_key(&gates)
    }

    pub fn add_statistics(&mut self, gates: GateCombination, statistics: &VertexStatistics, timestamp_ms: i64) {
        self.prepare_for_reports_on(gates);
        if let Some(history) = self.statistics.get_mut(&gates) {
            history.add(statistics.into(), timestamp_ms);
        }
    }

    pub fn latest(&self, gates: GateCombination) -> Option<&QosValue<GateCombinationStatistics>> {
        self.statistics.get(&gates).and_then(|history| history.last())
    }
}

/// Measurements of one channel plus the buffer sizes the manager set for it.
#[derive(Debug, Clone)]
pub struct EdgeQosData {
    source_channel_id: ChannelId,
    channel_latency_ms: ValueHistory<f64>,
    output_buffer_lifetime_ms: ValueHistory<f64>,
    records_per_buffer: ValueHistory<f64>,
    records_per_sec: ValueHistory<f64>,
    buffer_sizes: ValueHistory<i32>,
}

impl EdgeQosData {
    /// The buffer size history starts with the size the channel was deployed with.
    pub fn new(source_channel_id: ChannelId, history_capacity: usize, initial_buffer_size: i32, deployed_at_ms: i64) -> Self {
        let mut buffer_sizes = ValueHistory::new(history_capacity);
        buffer_sizes.add(initial_buffer_size, deployed_at_ms);
        EdgeQosData {
            source_channel_id,
            channel_latency_ms: ValueHistory::new(history_capacity),
            output_buffer_lifetime_ms: ValueHistory::new(history_capacity),
            records_per_buffer: ValueHistory::new(history_capacity),
            records_per_sec: ValueHistory::new(history_capacity),
            buffer_sizes,
        }
    }

    pub fn source_channel_id(&self) -> &ChannelId {
        &self.source_channel_id
    }

    pub fn add_statistics(&mut self, statistics: &EdgeStatistics, timestamp_ms: i64) {
        if let Some(latency) = statistics.channel_latency_ms {
            self.channel_latency_ms.add(latency, timestamp_ms);
        }
        if let Some(lifetime) = statistics.output_buffer_lifetime_ms {
            self.output_buffer_lifetime_ms.add(lifetime, timestamp_ms);
        }
        if let Some(records) = statistics.records_per_buffer {
            self.records_per_buffer.add(records, timestamp_ms);
        }
        if let Some(rate) = statistics.records_per_sec {
            self.records_per_sec.add(rate, timestamp_ms);
        }
    }

    pub fn record_buffer_size(&mut self, buffer_size: i32, timestamp_ms: i64) {
        self.buffer_sizes.add(buffer_size, timestamp_ms);
    }

    pub fn channel_latency_ms(&self) -> Option<f64> {
        self.channel_latency_ms.last().map(|entry| entry.value)
    }

    pub fn output_buffer_lifetime_ms(&self) -> Option<f64> {
        self.output_buffer_lifetime_ms.last().map(|entry| entry.value)
    }

    pub fn records_per_buffer(&self) -> Option<f64> {
        self.records_per_buffer.last().map(|entry| entry.value)
    }

    pub fn records_per_sec(&self) -> Option<f64> {
        self.records_per_sec.last().map(|entry| entry.value)
    }

    pub fn buffer_size(&self) -> Option<i32> {
        self.buffer_sizes.last().map(|entry| entry.value)
    }

    /// Both latency measurements were taken after the last buffer size change.
    pub fn is_fresh(&self) -> bool {
        let Some(last_change) = self.buffer_sizes.last_timestamp_ms() else {
            return self.channel_latency_ms.last().is_some() && self.output_buffer_lifetime_ms.last().is_some();
        };
        let newer = |history: &ValueHistory<f64>| history.last_timestamp_ms().is_some_and(|ts| ts > last_change);
        newer(&self.channel_latency_ms) && newer(&self.output_buffer_lifetime_ms)
    }
}
