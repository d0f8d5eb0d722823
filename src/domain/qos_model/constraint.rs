use serde::{Deserialize, Serialize};

use crate::domain::qos_model::id::ConstraintId;
use crate::domain::qos_model::sequence::PathSequence;

/// A declared upper bound for the end-to-end latency along one path sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatencyConstraint {
    pub id: ConstraintId,
    pub name: String,
    pub sequence: PathSequence,
    pub max_latency_ms: f64,
}

impl LatencyConstraint {
    pub fn new(id: ConstraintId, name: impl Into<String>, sequence: PathSequence, max_latency_ms: f64) -> Self {
        Self { id, name: name.into(), sequence, max_latency_ms }
    }
}
