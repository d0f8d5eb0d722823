use std::collections::HashSet;

use crate::domain::qos_model::graph::{QosEdge, QosEdgeKey, QosGraph, QosGraphMember, QosVertex};
use crate::domain::qos_model::id::ExecutionVertexId;
use crate::domain::qos_model::sequence::{PathSequence, SequenceElement, SequenceElementKind};
use crate::error::{Error, Result};

/// Receives the members visited by a [`QosGraphTraversal`], together with the
/// sequence element each member was matched against.
pub trait QosGraphVisitor {
    fn visit_vertex(&mut self, vertex: &QosVertex, element: &SequenceElement);
    fn visit_edge(&mut self, edge_key: QosEdgeKey, edge: &QosEdge, element: &SequenceElement);
}

/// Adapts a pair of closures to [`QosGraphVisitor`].
pub struct FnVisitor<V, E>
where
    V: FnMut(&QosVertex, &SequenceElement),
    E: FnMut(QosEdgeKey, &QosEdge, &SequenceElement),
{
    pub on_vertex: V,
    pub on_edge: E,
}

impl<V, E> QosGraphVisitor for FnVisitor<V, E>
where
    V: FnMut(&QosVertex, &SequenceElement),
    E: FnMut(QosEdgeKey, &QosEdge, &SequenceElement),
{
    fn visit_vertex(&mut self, vertex: &QosVertex, element: &SequenceElement) {
        (self.on_vertex)(vertex, element)
    }

    fn visit_edge(&mut self, edge_key: QosEdgeKey, edge: &QosEdge, element: &SequenceElement) {
        (self.on_edge)(edge_key, edge, element)
    }
}

/// Walks the member graph along a path sequence, starting at a member vertex.
///
/// A traversal remembers which (vertex, sequence index) pairs it has already expanded,
/// so running it from several anchor members of the same manager does not walk shared
/// sub-paths twice.
pub struct QosGraphTraversal<'a> {
    graph: &'a QosGraph,
    sequence: &'a PathSequence,
    expanded_forward: HashSet<(ExecutionVertexId, usize)>,
    covered_backward: HashSet<(ExecutionVertexId, usize)>,
}

impl<'a> QosGraphTraversal<'a> {
    pub fn new(graph: &'a QosGraph, sequence: &'a PathSequence) -> Self {
        Self { graph, sequence, expanded_forward: HashSet::new(), covered_backward: HashSet::new() }
    }

    fn start_vertex(&self, start: &ExecutionVertexId) -> Result<&'a QosVertex> {
        self.graph.vertex(start).ok_or_else(|| Error::UnknownGraphElement(format!("member {}", start)))
    }

    /// Visits the start vertex (if it is a vertex element) and everything downstream of it.
    pub fn traverse_forward(&mut self, start: &ExecutionVertexId, visitor: &mut dyn QosGraphVisitor) -> Result<()> {
        let vertex = self.start_vertex(start)?;
        let sequence = self.sequence;

        if let Some(index) = sequence.vertex_element_index(&vertex.group_vertex_id) {
            self.forward_from(vertex, index, visitor);
        } else if let Some(first) = sequence.first() {
            // The sequence starts with an edge leaving the start vertex's group.
            if let SequenceElementKind::Edge { source_vertex_id, .. } = &first.kind {
                if *source_vertex_id == vertex.group_vertex_id {
                    self.forward_from(vertex, 0, visitor);
                }
            }
        }
        Ok(())
    }

    /// Visits everything upstream of the start vertex.
    ///
    /// With `stop_at_covered_vertex`, an upstream vertex already covered by an earlier
    /// backward traversal ends the walk on that branch; the edge leading to it is still visited.
    pub fn traverse_backward(&mut self, start: &ExecutionVertexId, include_start_vertex: bool, stop_at_covered_vertex: bool, visitor: &mut dyn QosGraphVisitor) -> Result<()> {
        let vertex = self.start_vertex(start)?;
        let sequence = self.sequence;

        if let Some(index) = sequence.vertex_element_index(&vertex.group_vertex_id) {
            if include_start_vertex {
                self.backward_from(vertex, Some(index), stop_at_covered_vertex, visitor);
            } else {
                self.covered_backward.insert((vertex.id.clone(), index));
                self.backward_from(vertex, index.checked_sub(1), stop_at_covered_vertex, visitor);
            }
        } else if let Some(last) = sequence.last() {
            // The sequence ends with an edge entering the start vertex's group.
            if let SequenceElementKind::Edge { target_vertex_id, .. } = &last.kind {
                if *target_vertex_id == vertex.group_vertex_id {
                    self.backward_from(vertex, Some(last.index_in_sequence), stop_at_covered_vertex, visitor);
                }
            }
        }
        Ok(())
    }

    fn forward_from(&mut self, vertex: &'a QosVertex, index: usize, visitor: &mut dyn QosGraphVisitor) {
        let sequence = self.sequence;
        let Some(element) = sequence.get(index) else {
            return;
        };

        match &element.kind {
            SequenceElementKind::Vertex { vertex_id, .. } => {
                if *vertex_id != vertex.group_vertex_id {
                    log::warn!("Member {} does not belong to group vertex {} at sequence position {}", vertex.id, vertex_id, index);
                    return;
                }
                if !self.expanded_forward.insert((vertex.id.clone(), index)) {
                    return;
                }
                visitor.visit_vertex(vertex, element);
                self.forward_from(vertex, index + 1, visitor);
            }
            SequenceElementKind::Edge { output_gate_index, target_vertex_id, .. } => {
                let graph = self.graph;
                for &edge_key in graph.output_edges(&vertex.id, *output_gate_index) {
                    let Some(edge) = graph.edge(edge_key) else { continue };
                    let Some(target) = graph.vertex(&edge.target_vertex_id) else { continue };
                    if target.group_vertex_id != *target_vertex_id {
                        continue;
                    }
                    visitor.visit_edge(edge_key, edge, element);
                    self.forward_from(target, index + 1, visitor);
                }
            }
        }
    }

    fn backward_from(&mut self, vertex: &'a QosVertex, index: Option<usize>, stop_at_covered_vertex: bool, visitor: &mut dyn QosGraphVisitor) {
        let Some(index) = index else {
            return;
        };
        let sequence = self.sequence;
        let Some(element) = sequence.get(index) else {
            return;
        };

        match &element.kind {
            SequenceElementKind::Vertex { vertex_id, .. } => {
                if *vertex_id != vertex.group_vertex_id {
                    log::warn!("Member {} does not belong to group vertex {} at sequence position {}", vertex.id, vertex_id, index);
                    return;
                }
                let newly_covered = self.covered_backward.insert((vertex.id.clone(), index));
                if !newly_covered && stop_at_covered_vertex {
                    return;
                }
                visitor.visit_vertex(vertex, element);
                self.backward_from(vertex, index.checked_sub(1), stop_at_covered_vertex, visitor);
            }
            SequenceElementKind::Edge { input_gate_index, source_vertex_id, .. } => {
                let graph = self.graph;
                for &edge_key in graph.input_edges(&vertex.id, *input_gate_index) {
                    let Some(edge) = graph.edge(edge_key) else { continue };
                    let Some(source) = graph.vertex(&edge.source_vertex_id) else { continue };
                    if source.group_vertex_id != *source_vertex_id {
                        continue;
                    }
                    visitor.visit_edge(edge_key, edge, element);
                    self.backward_from(source, index.checked_sub(1), stop_at_covered_vertex, visitor);
                }
            }
        }
    }
}

/// Enumerates every concrete member path along `sequence` that passes through `anchor`.
///
/// Each path has exactly one member per sequence element, in sequence order.
pub fn member_paths_through(graph: &QosGraph, sequence: &PathSequence, anchor: &ExecutionVertexId) -> Result<Vec<Vec<QosGraphMember>>> {
    let vertex = graph.vertex(anchor).ok_or_else(|| Error::UnknownGraphElement(format!("member {}", anchor)))?;

    // Split position: elements [0, split) are upstream of the anchor, [split, len) downstream.
    let (split, forward_start) = if let Some(index) = sequence.vertex_element_index(&vertex.group_vertex_id) {
        (index, index)
    } else if matches!(sequence.first().map(|e| &e.kind), Some(SequenceElementKind::Edge { source_vertex_id, .. }) if *source_vertex_id == vertex.group_vertex_id) {
        (0, 0)
    } else if matches!(sequence.last().map(|e| &e.kind), Some(SequenceElementKind::Edge { target_vertex_id, .. }) if *target_vertex_id == vertex.group_vertex_id) {
        (sequence.len(), sequence.len())
    } else {
        return Ok(Vec::new());
    };

    let mut prefixes = Vec::new();
    collect_backward(graph, sequence, vertex, split.checked_sub(1), &mut Vec::new(), &mut prefixes);

    let mut suffixes = Vec::new();
    collect_forward(graph, sequence, vertex, forward_start, &mut Vec::new(), &mut suffixes);

    let mut paths = Vec::with_capacity(prefixes.len() * suffixes.len());
    for prefix in &prefixes {
        for suffix in &suffixes {
            let mut path: Vec<QosGraphMember> = prefix.iter().rev().cloned().collect();
            path.extend(suffix.iter().cloned());
            paths.push(path);
        }
    }
    Ok(paths)
}

fn collect_forward(graph: &QosGraph, sequence: &PathSequence, vertex: &QosVertex, index: usize, current: &mut Vec<QosGraphMember>, out: &mut Vec<Vec<QosGraphMember>>) {
    let Some(element) = sequence.get(index) else {
        out.push(current.clone());
        return;
    };

    match &element.kind {
        SequenceElementKind::Vertex { .. } => {
            current.push(QosGraphMember::Vertex(vertex.id.clone()));
            collect_forward(graph, sequence, vertex, index + 1, current, out);
            current.pop();
        }
        SequenceElementKind::Edge { output_gate_index, target_vertex_id, .. } => {
            for &edge_key in graph.output_edges(&vertex.id, *output_gate_index) {
                let Some(edge) = graph.edge(edge_key) else { continue };
                let Some(target) = graph.vertex(&edge.target_vertex_id) else { continue };
                if target.group_vertex_id != *target_vertex_id {
                    continue;
                }
                current.push(QosGraphMember::Edge(edge_key));
                collect_forward(graph, sequence, target, index + 1, current, out);
                current.pop();
            }
        }
    }
}

/// Collects upstream partial paths in reverse order (nearest element first).
fn collect_backward(graph: &QosGraph, sequence: &PathSequence, vertex: &QosVertex, index: Option<usize>, current: &mut Vec<QosGraphMember>, out: &mut Vec<Vec<QosGraphMember>>) {
    let Some(element) = index.and_then(|i| sequence.get(i)) else {
        out.push(current.clone());
        return;
    };
    let next = element.index_in_sequence.checked_sub(1);

    match &element.kind {
        SequenceElementKind::Vertex { .. } => {
            current.push(QosGraphMember::Vertex(vertex.id.clone()));
            collect_backward(graph, sequence, vertex, next, current, out);
            current.pop();
        }
        SequenceElementKind::Edge { input_gate_index, source_vertex_id, .. } => {
            for &edge_key in graph.input_edges(&vertex.id, *input_gate_index) {
                let Some(edge) = graph.edge(edge_key) else { continue };
                let Some(source) = graph.vertex(&edge.source_vertex_id) else { continue };
                if source.group_vertex_id != *source_vertex_id {
                    continue;
                }
                current.push(QosGraphMember::Edge(edge_key));
                collect_backward(graph, sequence, source, next, current, out);
                current.pop();
            }
        }
    }
}
