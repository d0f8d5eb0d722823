use serde::{Deserialize, Serialize};

use crate::domain::qos_model::id::JobVertexId;

/// How a vertex reporter samples latencies of its gate combination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SamplingStrategy {
    /// Latency is the time between a record read on the input gate and the next emit.
    #[default]
    ReadWrite,
    /// Latency is only measured on tagged records flowing through the vertex.
    ReadReadWrite,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SequenceElementKind {
    Vertex {
        vertex_id: JobVertexId,
        /// `None` if the path enters the vertex from nowhere (path start).
        input_gate_index: Option<usize>,
        /// `None` if the path ends in this vertex.
        output_gate_index: Option<usize>,
    },
    Edge {
        source_vertex_id: JobVertexId,
        target_vertex_id: JobVertexId,
        output_gate_index: usize,
        input_gate_index: usize,
    },
}

/// One element of a constrained path through the job graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceElement {
    pub index_in_sequence: usize,
    pub sampling_strategy: SamplingStrategy,
    pub kind: SequenceElementKind,
}

impl SequenceElement {
    pub fn is_vertex(&self) -> bool {
        matches!(self.kind, SequenceElementKind::Vertex { .. })
    }

    pub fn is_edge(&self) -> bool {
        matches!(self.kind, SequenceElementKind::Edge { .. })
    }

    pub fn input_gate_index(&self) -> Option<usize> {
        match self.kind {
            SequenceElementKind::Vertex { input_gate_index, .. } => input_gate_index,
            SequenceElementKind::Edge { input_gate_index, .. } => Some(input_gate_index),
        }
    }

    pub fn output_gate_index(&self) -> Option<usize> {
        match self.kind {
            SequenceElementKind::Vertex { output_gate_index, .. } => output_gate_index,
            SequenceElementKind::Edge { output_gate_index, .. } => Some(output_gate_index),
        }
    }

    /// Group vertices touched by this element: the vertex itself, or both endpoints of an edge.
    pub fn touched_vertices(&self) -> Vec<&JobVertexId> {
        match &self.kind {
            SequenceElementKind::Vertex { vertex_id, .. } => vec![vertex_id],
            SequenceElementKind::Edge { source_vertex_id, target_vertex_id, .. } => vec![source_vertex_id, target_vertex_id],
        }
    }
}

/// Ordered, alternating vertex/edge path of one latency constraint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathSequence {
    elements: Vec<SequenceElement>,
}

impl PathSequence {
    pub fn new() -> Self {
        Self { elements: Vec::new() }
    }

    pub fn add_vertex(&mut self, vertex_id: JobVertexId, input_gate_index: Option<usize>, output_gate_index: Option<usize>, sampling_strategy: SamplingStrategy) {
        let index_in_sequence = self.elements.len();
        self.elements.push(SequenceElement {
            index_in_sequence,
            sampling_strategy,
            kind: SequenceElementKind::Vertex { vertex_id, input_gate_index, output_gate_index },
        });
    }

    pub fn add_edge(
        &mut self,
        source_vertex_id: JobVertexId,
        output_gate_index: usize,
        target_vertex_id: JobVertexId,
        input_gate_index: usize,
        sampling_strategy: SamplingStrategy,
    ) {
        let index_in_sequence = self.elements.len();
        self.elements.push(SequenceElement {
            index_in_sequence,
            sampling_strategy,
            kind: SequenceElementKind::Edge { source_vertex_id, target_vertex_id, output_gate_index, input_gate_index },
        });
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&SequenceElement> {
        self.elements.get(index)
    }

    pub fn first(&self) -> Option<&SequenceElement> {
        self.elements.first()
    }

    pub fn last(&self) -> Option<&SequenceElement> {
        self.elements.last()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SequenceElement> {
        self.elements.iter()
    }

    pub fn is_first(&self, element: &SequenceElement) -> bool {
        element.index_in_sequence == 0
    }

    pub fn is_last(&self, element: &SequenceElement) -> bool {
        element.index_in_sequence + 1 == self.elements.len()
    }

    /// Index of the vertex element referring to `vertex_id`, if the group vertex appears as a vertex element.
    pub fn vertex_element_index(&self, vertex_id: &JobVertexId) -> Option<usize> {
        self.elements.iter().position(|e| matches!(&e.kind, SequenceElementKind::Vertex { vertex_id: v, .. } if v == vertex_id))
    }
}

impl<'a> IntoIterator for &'a PathSequence {
    type Item = &'a SequenceElement;
    type IntoIter = std::slice::Iter<'a, SequenceElement>;

    fn into_iter(self) -> Self::IntoIter {
        self.elements.iter()
    }
}
