use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::qos_model::graph::{QosEdge, QosVertex};
use crate::domain::qos_model::id::{ChannelId, ExecutionVertexId, GateId};
use crate::error::{Error, Result};

/// Stable key of a reporter: a vertex gate combination or an edge (identified by its source channel).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ReporterId {
    Vertex { vertex_id: ExecutionVertexId, input_gate_id: Option<GateId>, output_gate_id: Option<GateId> },
    Edge { source_channel_id: ChannelId },
}

impl ReporterId {
    /// A vertex reporter needs the vertex id and at least one of its two gates.
    pub fn vertex(vertex_id: ExecutionVertexId, input_gate_id: Option<GateId>, output_gate_id: Option<GateId>) -> Result<Self> {
        vertex_id.require("vertexID")?;
        if input_gate_id.is_none() && output_gate_id.is_none() {
            return Err(Error::InvalidArgument(format!("Vertex reporter for {} needs an input or an output gate", vertex_id)));
        }
        for gate in input_gate_id.iter().chain(output_gate_id.iter()) {
            gate.require("gateID")?;
        }
        Ok(ReporterId::Vertex { vertex_id, input_gate_id, output_gate_id })
    }

    pub fn edge(source_channel_id: ChannelId) -> Result<Self> {
        source_channel_id.require("sourceChannelID")?;
        Ok(ReporterId::Edge { source_channel_id })
    }

    /// Resolves gate indices of `vertex` to gate ids.
    pub fn for_vertex_member(vertex: &QosVertex, input_gate_index: Option<usize>, output_gate_index: Option<usize>) -> Result<Self> {
        let input_gate_id = match input_gate_index {
            Some(index) => Some(vertex.input_gate_id(index).cloned().ok_or_else(|| Error::UnknownGraphElement(format!("input gate {} of {}", index, vertex.id)))?),
            None => None,
        };
        let output_gate_id = match output_gate_index {
            Some(index) => Some(vertex.output_gate_id(index).cloned().ok_or_else(|| Error::UnknownGraphElement(format!("output gate {} of {}", index, vertex.id)))?),
            None => None,
        };
        ReporterId::vertex(vertex.id.clone(), input_gate_id, output_gate_id)
    }

    pub fn for_edge(edge: &QosEdge) -> Result<Self> {
        ReporterId::edge(edge.source_channel_id.clone())
    }

    pub fn is_vertex(&self) -> bool {
        matches!(self, ReporterId::Vertex { .. })
    }
}

impl fmt::Display for ReporterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReporterId::Vertex { vertex_id, input_gate_id, output_gate_id } => {
                let input = input_gate_id.as_ref().map(|g| g.as_str()).unwrap_or("-");
                let output = output_gate_id.as_ref().map(|g| g.as_str()).unwrap_or("-");
                write!(f, "vertex {} ({} -> {})", vertex_id, input, output)
            }
            ReporterId::Edge { source_channel_id } => write!(f, "edge {}", source_channel_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vertex_reporter_without_gates_is_rejected() {
        let result = ReporterId::vertex(ExecutionVertexId::new("v"), None, None);
        assert!(matches!(result, Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_empty_ids_are_rejected() {
        assert!(ReporterId::vertex(ExecutionVertexId::new(""), Some(GateId::new("g")), None).is_err());
        assert!(ReporterId::vertex(ExecutionVertexId::new("v"), Some(GateId::new("")), None).is_err());
        assert!(ReporterId::edge(ChannelId::new("")).is_err());
    }

    #[test]
    fn test_gate_combinations_are_distinct_keys() {
        let a = ReporterId::vertex(ExecutionVertexId::new("v"), Some(GateId::new("in0")), Some(GateId::new("out0"))).unwrap();
        let b = ReporterId::vertex(ExecutionVertexId::new("v"), Some(GateId::new("in0")), Some(GateId::new("out1"))).unwrap();
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
    }
}
