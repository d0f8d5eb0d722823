use serde::{Deserialize, Serialize};

use crate::domain::qos_model::reporter_id::ReporterId;

/// One measurement of a vertex gate combination. `None` marks a value that does not
/// apply to the reporter's gate combination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VertexStatistics {
    pub reporter_id: ReporterId,
    pub latency_ms: Option<f64>,
    pub records_consumed_per_sec: Option<f64>,
    pub records_emitted_per_sec: Option<f64>,
}

/// One measurement of a channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeStatistics {
    pub reporter_id: ReporterId,
    pub channel_latency_ms: Option<f64>,
    pub output_buffer_lifetime_ms: Option<f64>,
    pub records_per_buffer: Option<f64>,
    pub records_per_sec: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum QosSample {
    Vertex(VertexStatistics),
    Edge(EdgeStatistics),
}

impl QosSample {
    pub fn reporter_id(&self) -> &ReporterId {
        match self {
            QosSample::Vertex(statistics) => &statistics.reporter_id,
            QosSample::Edge(statistics) => &statistics.reporter_id,
        }
    }
}

/// A sample as handed to the forwarding point, stamped with the time it was taken.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimestampedSample {
    pub timestamp_ms: i64,
    pub sample: QosSample,
}
