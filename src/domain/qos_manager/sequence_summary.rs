use serde::Serialize;

use crate::domain::qos_manager::qos_data::{EdgeQosData, GateCombination, VertexQosData};
use crate::domain::qos_model::sequence::{PathSequence, SequenceElementKind};
use crate::error::{Error, Result};

/// QoS data of one concrete path member, in sequence order. `None` if the manager has
/// no data for that member yet.
#[derive(Debug, Clone, Copy)]
pub enum MemberQosData<'a> {
    Vertex(Option<&'a VertexQosData>),
    Edge(Option<&'a EdgeQosData>),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum MemberStatistics {
    #[serde(rename_all = "camelCase")]
    Vertex { latency_ms: f64, records_consumed_per_sec: f64, records_emitted_per_sec: f64 },
    #[serde(rename_all = "camelCase")]
    Edge { output_buffer_latency_ms: f64, non_output_buffer_latency_ms: f64, records_per_buffer: f64, records_per_sec: f64 },
}

/// Latency breakdown of one member path.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PathSummary {
    #[serde(skip)]
    gate_combinations: Vec<Option<GateCombination>>,
    member_statistics: Vec<MemberStatistics>,
    path_latency_ms: f64,
    output_buffer_latency_ms: f64,
    is_fresh: bool,
}

impl PathSummary {
    pub fn new(sequence: &PathSequence) -> Self {
        let gate_combinations = sequence
            .iter()
            .map(|element| match element.kind {
                SequenceElementKind::Vertex { input_gate_index, output_gate_index, .. } => Some((input_gate_index, output_gate_index)),
                SequenceElementKind::Edge { .. } => None,
            })
            .collect();
        PathSummary { gate_combinations, member_statistics: Vec::new(), path_latency_ms: 0.0, output_buffer_latency_ms: 0.0, is_fresh: false }
    }

    /// Recomputes the summary from `members`, which must follow the sequence element by element.
    pub fn update(&mut self, members: &[MemberQosData<'_>]) -> Result<()> {
        if members.len() != self.gate_combinations.len() {
            return Err(Error::ModelError(format!("Path has {} members but its sequence {} elements", members.len(), self.gate_combinations.len())));
        }

        self.member_statistics.clear();
        self.path_latency_ms = 0.0;
        self.output_buffer_latency_ms = 0.0;
        self.is_fresh = true;

        for (index, member) in members.iter().enumerate() {
            match (member, self.gate_combinations[index]) {
                (MemberQosData::Vertex(data), Some(gates)) => self.add_vertex(*data, gates),
                (MemberQosData::Edge(data), None) => self.add_edge(*data),
                _ => return Err(Error::ModelError("Path members do not alternate like the sequence".to_string())),
            }
        }
        Ok(())
    }

    fn add_vertex(&mut self, data: Option<&VertexQosData>, gates: GateCombination) {
        let Some(latest) = data.and_then(|data| data.latest(gates)) else {
            self.is_fresh = false;
            self.member_statistics.push(MemberStatistics::Vertex { latency_ms: 0.0, records_consumed_per_sec: 0.0, records_emitted_per_sec: 0.0 });
            return;
        };

        let statistics = latest.value;
        let latency_ms = statistics.latency_ms.unwrap_or(0.0);
        self.path_latency_ms += latency_ms;
        self.member_statistics.push(MemberStatistics::Vertex {
            latency_ms,
            records_consumed_per_sec: statistics.records_consumed_per_sec.unwrap_or(0.0),
            records_emitted_per_sec: statistics.records_emitted_per_sec.unwrap_or(0.0),
        });
    }

    fn add_edge(&mut self, data: Option<&EdgeQosData>) {
        let Some(data) = data else {
            self.is_fresh = false;
            self.member_statistics.push(MemberStatistics::Edge { output_buffer_latency_ms: 0.0, non_output_buffer_latency_ms: 0.0, records_per_buffer: 0.0, records_per_sec: 0.0 });
            return;
        };

        let channel_latency = data.channel_latency_ms().unwrap_or(0.0);
        let output_buffer_latency = channel_latency.min(data.output_buffer_lifetime_ms().unwrap_or(0.0) / 2.0);

        self.path_latency_ms += channel_latency;
        self.output_buffer_latency_ms += output_buffer_latency;
        self.is_fresh &= data.is_fresh();
        self.member_statistics.push(MemberStatistics::Edge {
            output_buffer_latency_ms: output_buffer_latency,
            non_output_buffer_latency_ms: channel_latency - output_buffer_latency,
            records_per_buffer: data.records_per_buffer().unwrap_or(0.0),
            records_per_sec: data.records_per_sec().unwrap_or(0.0),
        });
    }

    pub fn member_statistics(&self) -> &[MemberStatistics] {
        &self.member_statistics
    }

    pub fn path_latency_ms(&self) -> f64 {
        self.path_latency_ms
    }

    pub fn output_buffer_latency_ms(&self) -> f64 {
        self.output_buffer_latency_ms
    }

    pub fn non_output_buffer_latency_ms(&self) -> f64 {
        self.path_latency_ms - self.output_buffer_latency_ms
    }

    /// A stale summary must not drive control decisions.
    pub fn is_fresh(&self) -> bool {
        self.is_fresh
    }
}
