use serde::{Deserialize, Serialize};
use slotmap::{SlotMap, new_key_type};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use crate::api::job_dto::{DistributionPatternDto, JobDto, SamplingStrategyDto, SequenceElementDto};
use crate::domain::qos_model::constraint::LatencyConstraint;
use crate::domain::qos_model::id::{ChannelId, ConstraintId, ExecutionVertexId, GateId, InstanceId, JobVertexId};
use crate::domain::qos_model::sequence::{PathSequence, SamplingStrategy};
use crate::error::{Error, Result};

new_key_type! {
    /// Arena key of a member edge (channel) in a [`QosGraph`].
    pub struct QosEdgeKey;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DistributionPattern {
    /// All-to-all: every source member is connected to every target member.
    Bipartite,
    /// Members are connected one-to-one (or fan in/out evenly if the counts differ).
    Pointwise,
}

impl From<DistributionPatternDto> for DistributionPattern {
    fn from(dto: DistributionPatternDto) -> Self {
        match dto {
            DistributionPatternDto::Bipartite => DistributionPattern::Bipartite,
            DistributionPatternDto::Pointwise => DistributionPattern::Pointwise,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QosGroupEdge {
    pub source_vertex_id: JobVertexId,
    pub target_vertex_id: JobVertexId,
    pub output_gate_index: usize,
    pub input_gate_index: usize,
    pub distribution_pattern: DistributionPattern,
}

#[derive(Debug, Clone)]
pub struct QosGroupVertex {
    pub id: JobVertexId,
    pub name: String,
    /// Member ids in member-index order.
    pub members: Vec<ExecutionVertexId>,
    /// Keyed by output gate index.
    pub forward_edges: BTreeMap<usize, QosGroupEdge>,
    /// Keyed by input gate index.
    pub backward_edges: BTreeMap<usize, QosGroupEdge>,
}

impl QosGroupVertex {
    pub fn number_of_members(&self) -> usize {
        self.members.len()
    }

    pub fn forward_edge(&self, output_gate_index: usize) -> Option<&QosGroupEdge> {
        self.forward_edges.get(&output_gate_index)
    }
}

/// A member (parallel instance) of a group vertex, pinned to the instance executing it.
#[derive(Debug, Clone)]
pub struct QosVertex {
    pub id: ExecutionVertexId,
    pub name: String,
    pub group_vertex_id: JobVertexId,
    pub member_index: usize,
    pub instance: InstanceId,
    pub input_gate_ids: Vec<GateId>,
    pub output_gate_ids: Vec<GateId>,
}

impl QosVertex {
    pub fn input_gate_id(&self, index: usize) -> Option<&GateId> {
        self.input_gate_ids.get(index)
    }

    pub fn output_gate_id(&self, index: usize) -> Option<&GateId> {
        self.output_gate_ids.get(index)
    }

    pub fn input_gate_index(&self, gate_id: &GateId) -> Option<usize> {
        self.input_gate_ids.iter().position(|g| g == gate_id)
    }

    pub fn output_gate_index(&self, gate_id: &GateId) -> Option<usize> {
        self.output_gate_ids.iter().position(|g| g == gate_id)
    }

    fn ensure_input_gate(&mut self, index: usize) {
        while self.input_gate_ids.len() <= index {
            let next = self.input_gate_ids.len();
            self.input_gate_ids.push(GateId::new(format!("{}/in{}", self.id, next)));
        }
    }

    fn ensure_output_gate(&mut self, index: usize) {
        while self.output_gate_ids.len() <= index {
            let next = self.output_gate_ids.len();
            self.output_gate_ids.push(GateId::new(format!("{}/out{}", self.id, next)));
        }
    }
}

/// A channel between two members.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QosEdge {
    pub source_channel_id: ChannelId,
    pub target_channel_id: ChannelId,
    pub source_vertex_id: ExecutionVertexId,
    pub output_gate_index: usize,
    pub target_vertex_id: ExecutionVertexId,
    pub input_gate_index: usize,
}

/// A vertex or edge of a concrete member path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QosGraphMember {
    Vertex(ExecutionVertexId),
    Edge(QosEdgeKey),
}

/// The path model of a job: group vertices, their members, the member channels and the
/// latency constraints declared on the graph.
///
/// Role computation expects one graph per constraint (see [`QosGraph::split_by_constraint`]).
#[derive(Debug, Clone, Default)]
pub struct QosGraph {
    group_vertices: BTreeMap<JobVertexId, QosGroupVertex>,
    vertices: HashMap<ExecutionVertexId, QosVertex>,
    edges: SlotMap<QosEdgeKey, QosEdge>,
    edges_by_source_channel: HashMap<ChannelId, QosEdgeKey>,
    output_edges: HashMap<(ExecutionVertexId, usize), Vec<QosEdgeKey>>,
    input_edges: HashMap<(ExecutionVertexId, usize), Vec<QosEdgeKey>>,
    constraints: BTreeMap<ConstraintId, LatencyConstraint>,
}

impl QosGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_group_vertex(&mut self, id: JobVertexId, name: impl Into<String>) -> Result<()> {
        id.require("groupVertexID")?;
        if self.group_vertices.contains_key(&id) {
            return Err(Error::ModelError(format!("Group vertex {} was declared twice", id)));
        }
        let group = QosGroupVertex { id: id.clone(), name: name.into(), members: Vec::new(), forward_edges: BTreeMap::new(), backward_edges: BTreeMap::new() };
        self.group_vertices.insert(id, group);
        Ok(())
    }

    pub fn add_member(&mut self, group_vertex_id: &JobVertexId, member_id: ExecutionVertexId, instance: InstanceId) -> Result<()> {
        member_id.require("executionVertexID")?;
        instance.require("instance")?;
        if self.vertices.contains_key(&member_id) {
            return Err(Error::ModelError(format!("Member {} was declared twice", member_id)));
        }

        let group = self.group_vertices.get_mut(group_vertex_id).ok_or_else(|| Error::UnknownGraphElement(format!("group vertex {}", group_vertex_id)))?;
        let member_index = group.members.len();
        group.members.push(member_id.clone());

        let vertex = QosVertex {
            id: member_id.clone(),
            name: format!("{} ({})", group.name, member_index + 1),
            group_vertex_id: group_vertex_id.clone(),
            member_index,
            instance,
            input_gate_ids: Vec::new(),
            output_gate_ids: Vec::new(),
        };
        self.vertices.insert(member_id, vertex);
        Ok(())
    }

    /// Connects two group vertices and wires their members according to the distribution pattern.
    ///
    /// Both group vertices must already have all their members.
    pub fn connect(&mut self, group_edge: QosGroupEdge) -> Result<()> {
        let source_members = self.group_vertex(&group_edge.source_vertex_id)?.members.clone();
        let target_members = self.group_vertex(&group_edge.target_vertex_id)?.members.clone();

        if self.group_vertex(&group_edge.source_vertex_id)?.forward_edges.contains_key(&group_edge.output_gate_index) {
            return Err(Error::ModelError(format!(
                "Output gate {} of group vertex {} is already connected",
                group_edge.output_gate_index, group_edge.source_vertex_id
            )));
        }

        for (source_index, target_index) in member_pairs(source_members.len(), target_members.len(), group_edge.distribution_pattern) {
            self.add_edge(&source_members[source_index], group_edge.output_gate_index, &target_members[target_index], group_edge.input_gate_index);
        }

        if let Some(source) = self.group_vertices.get_mut(&group_edge.source_vertex_id) {
            source.forward_edges.insert(group_edge.output_gate_index, group_edge.clone());
        }
        if let Some(target) = self.group_vertices.get_mut(&group_edge.target_vertex_id) {
            target.backward_edges.insert(group_edge.input_gate_index, group_edge);
        }
        Ok(())
    }

    fn add_edge(&mut self, source: &ExecutionVertexId, output_gate_index: usize, target: &ExecutionVertexId, input_gate_index: usize) {
        if let Some(vertex) = self.vertices.get_mut(source) {
            vertex.ensure_output_gate(output_gate_index);
        }
        if let Some(vertex) = self.vertices.get_mut(target) {
            vertex.ensure_input_gate(input_gate_index);
        }

        let source_channel_id = ChannelId::new(format!("{}[{}]->{}[{}]", source, output_gate_index, target, input_gate_index));
        let target_channel_id = ChannelId::new(format!("{}#in", source_channel_id));
        let edge = QosEdge {
            source_channel_id: source_channel_id.clone(),
            target_channel_id,
            source_vertex_id: source.clone(),
            output_gate_index,
            target_vertex_id: target.clone(),
            input_gate_index,
        };

        let key = self.edges.insert(edge);
        self.edges_by_source_channel.insert(source_channel_id, key);
        self.output_edges.entry((source.clone(), output_gate_index)).or_default().push(key);
        self.input_edges.entry((target.clone(), input_gate_index)).or_default().push(key);
    }

    pub fn add_constraint(&mut self, constraint: LatencyConstraint) -> Result<()> {
        constraint.id.require("constraintID")?;
        for element in &constraint.sequence {
            for vertex_id in element.touched_vertices() {
                if !self.group_vertices.contains_key(vertex_id) {
                    return Err(Error::UnknownGraphElement(format!("group vertex {} on sequence of constraint {}", vertex_id, constraint.id)));
                }
            }
        }
        self.constraints.insert(constraint.id.clone(), constraint);
        Ok(())
    }

    pub fn group_vertex(&self, id: &JobVertexId) -> Result<&QosGroupVertex> {
        self.group_vertices.get(id).ok_or_else(|| Error::UnknownGraphElement(format!("group vertex {}", id)))
    }

    pub fn group_vertices(&self) -> impl Iterator<Item = &QosGroupVertex> {
        self.group_vertices.values()
    }

    pub fn vertex(&self, id: &ExecutionVertexId) -> Option<&QosVertex> {
        self.vertices.get(id)
    }

    pub fn edge(&self, key: QosEdgeKey) -> Option<&QosEdge> {
        self.edges.get(key)
    }

    pub fn edge_by_source_channel(&self, channel_id: &ChannelId) -> Option<QosEdgeKey> {
        self.edges_by_source_channel.get(channel_id).copied()
    }

    pub fn output_edges(&self, vertex: &ExecutionVertexId, output_gate_index: usize) -> &[QosEdgeKey] {
        self.output_edges.get(&(vertex.clone(), output_gate_index)).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn input_edges(&self, vertex: &ExecutionVertexId, input_gate_index: usize) -> &[QosEdgeKey] {
        self.input_edges.get(&(vertex.clone(), input_gate_index)).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Members of a group vertex in member-index order.
    pub fn members(&self, group_vertex_id: &JobVertexId) -> Result<Vec<&QosVertex>> {
        let group = self.group_vertex(group_vertex_id)?;
        group.members.iter().map(|m| self.vertices.get(m).ok_or_else(|| Error::UnknownGraphElement(format!("member {}", m)))).collect()
    }

    pub fn number_of_executing_instances(&self, group_vertex_id: &JobVertexId) -> Result<usize> {
        let instances: BTreeSet<&InstanceId> = self.members(group_vertex_id)?.into_iter().map(|m| &m.instance).collect();
        Ok(instances.len())
    }

    pub fn constraints(&self) -> impl Iterator<Item = &LatencyConstraint> {
        self.constraints.values()
    }

    pub fn number_of_constraints(&self) -> usize {
        self.constraints.len()
    }

    pub fn constraint(&self, id: &ConstraintId) -> Option<&LatencyConstraint> {
        self.constraints.get(id)
    }

    /// The only constraint of this graph. Anything but exactly one constraint is a configuration error.
    pub fn single_constraint(&self) -> Result<&LatencyConstraint> {
        if self.constraints.len() != 1 {
            return Err(Error::ConfigurationError(format!(
                "Anchor vertices can only be found for a single constraint per QoS graph, but the graph holds {} constraints",
                self.constraints.len()
            )));
        }
        self.constraints.values().next().ok_or_else(|| Error::ConfigurationError("QoS graph has no constraint".to_string()))
    }

    /// One graph per constraint, each carrying the full topology and exactly that constraint.
    pub fn split_by_constraint(&self) -> BTreeMap<ConstraintId, Arc<QosGraph>> {
        self.constraints
            .iter()
            .map(|(id, constraint)| {
                let mut graph = self.clone();
                graph.constraints = BTreeMap::from([(id.clone(), constraint.clone())]);
                (id.clone(), Arc::new(graph))
            })
            .collect()
    }

    /// Builds the graph from a job description. Group vertices and members first, then
    /// edges, then constraints, so every reference can be validated.
    pub fn from_dto(dto: &JobDto) -> Result<Self> {
        let mut graph = QosGraph::new();

        for group_dto in &dto.group_vertices {
            let group_id = JobVertexId::new(group_dto.id.clone());
            graph.add_group_vertex(group_id.clone(), group_dto.name.clone())?;
            for member_dto in &group_dto.members {
                graph.add_member(&group_id, ExecutionVertexId::new(member_dto.id.clone()), InstanceId::new(member_dto.instance.clone()))?;
            }
        }

        for edge_dto in &dto.group_edges {
            graph.connect(QosGroupEdge {
                source_vertex_id: JobVertexId::new(edge_dto.source.clone()),
                target_vertex_id: JobVertexId::new(edge_dto.target.clone()),
                output_gate_index: edge_dto.output_gate_index,
                input_gate_index: edge_dto.input_gate_index,
                distribution_pattern: edge_dto.distribution_pattern.into(),
            })?;
        }

        for constraint_dto in &dto.constraints {
            let mut sequence = PathSequence::new();
            for element in &constraint_dto.sequence {
                match element {
                    SequenceElementDto::Vertex { vertex_id, input_gate_index, output_gate_index, sampling_strategy } => {
                        sequence.add_vertex(JobVertexId::new(vertex_id.clone()), *input_gate_index, *output_gate_index, map_sampling_strategy(*sampling_strategy));
                    }
                    SequenceElementDto::Edge { source_vertex_id, target_vertex_id, output_gate_index, input_gate_index, sampling_strategy } => {
                        sequence.add_edge(
                            JobVertexId::new(source_vertex_id.clone()),
                            *output_gate_index,
                            JobVertexId::new(target_vertex_id.clone()),
                            *input_gate_index,
                            map_sampling_strategy(*sampling_strategy),
                        );
                    }
                }
            }
            graph.add_constraint(LatencyConstraint::new(ConstraintId::new(constraint_dto.id.clone()), constraint_dto.name.clone(), sequence, constraint_dto.max_latency_ms))?;
        }

        Ok(graph)
    }
}

pub fn map_sampling_strategy(dto: SamplingStrategyDto) -> SamplingStrategy {
    match dto {
        SamplingStrategyDto::ReadWrite => SamplingStrategy::ReadWrite,
        SamplingStrategyDto::ReadReadWrite => SamplingStrategy::ReadReadWrite,
    }
}

/// Member index pairs connected by a group edge.
///
/// Pointwise edges create `max(n, m)` channels, spreading the smaller side evenly.
fn member_pairs(number_of_sources: usize, number_of_targets: usize, pattern: DistributionPattern) -> Vec<(usize, usize)> {
    if number_of_sources == 0 || number_of_targets == 0 {
        return Vec::new();
    }

    match pattern {
        DistributionPattern::Bipartite => (0..number_of_sources).flat_map(|s| (0..number_of_targets).map(move |t| (s, t))).collect(),
        DistributionPattern::Pointwise => {
            let channels = number_of_sources.max(number_of_targets);
            (0..channels).map(|i| (i * number_of_sources / channels, i * number_of_targets / channels)).collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph_with_two_groups(sources: usize, targets: usize, pattern: DistributionPattern) -> QosGraph {
        let mut graph = QosGraph::new();
        let v1 = JobVertexId::new("V1");
        let v2 = JobVertexId::new("V2");
        graph.add_group_vertex(v1.clone(), "Source").unwrap();
        graph.add_group_vertex(v2.clone(), "Sink").unwrap();
        for i in 0..sources {
            graph.add_member(&v1, ExecutionVertexId::new(format!("v1-{}", i)), InstanceId::new(format!("host-{}", i % 2))).unwrap();
        }
        for i in 0..targets {
            graph.add_member(&v2, ExecutionVertexId::new(format!("v2-{}", i)), InstanceId::new("host-0")).unwrap();
        }
        graph
            .connect(QosGroupEdge { source_vertex_id: v1, target_vertex_id: v2, output_gate_index: 0, input_gate_index: 0, distribution_pattern: pattern })
            .unwrap();
        graph
    }

    #[test]
    fn test_bipartite_creates_all_pairs() {
        let graph = graph_with_two_groups(2, 3, DistributionPattern::Bipartite);
        assert_eq!(graph.output_edges(&ExecutionVertexId::new("v1-0"), 0).len(), 3);
        assert_eq!(graph.input_edges(&ExecutionVertexId::new("v2-2"), 0).len(), 2);
    }

    #[test]
    fn test_pointwise_creates_max_channels() {
        let graph = graph_with_two_groups(2, 4, DistributionPattern::Pointwise);
        let total: usize = (0..2).map(|i| graph.output_edges(&ExecutionVertexId::new(format!("v1-{}", i)), 0).len()).sum();
        assert_eq!(total, 4);
        for i in 0..4 {
            assert_eq!(graph.input_edges(&ExecutionVertexId::new(format!("v2-{}", i)), 0).len(), 1);
        }
    }

    #[test]
    fn test_gate_ids_are_generated_for_connected_gates() {
        let graph = graph_with_two_groups(1, 1, DistributionPattern::Pointwise);
        let source = graph.vertex(&ExecutionVertexId::new("v1-0")).unwrap();
        assert_eq!(source.output_gate_ids.len(), 1);
        assert!(source.input_gate_ids.is_empty());
        assert_eq!(source.output_gate_index(&source.output_gate_ids[0]), Some(0));
    }

    #[test]
    fn test_executing_instances_counted_per_group() {
        let graph = graph_with_two_groups(3, 2, DistributionPattern::Bipartite);
        assert_eq!(graph.number_of_executing_instances(&JobVertexId::new("V1")).unwrap(), 2);
        assert_eq!(graph.number_of_executing_instances(&JobVertexId::new("V2")).unwrap(), 1);
    }

    #[test]
    fn test_constraint_with_unknown_vertex_is_rejected() {
        let mut graph = graph_with_two_groups(1, 1, DistributionPattern::Pointwise);
        let mut sequence = PathSequence::new();
        sequence.add_vertex(JobVertexId::new("Nope"), None, Some(0), SamplingStrategy::ReadWrite);
        let result = graph.add_constraint(LatencyConstraint::new(ConstraintId::new("c1"), "c1", sequence, 100.0));
        assert!(matches!(result, Err(Error::UnknownGraphElement(_))));
    }

    #[test]
    fn test_split_by_constraint_keeps_one_constraint_per_graph() {
        let mut graph = graph_with_two_groups(1, 1, DistributionPattern::Pointwise);
        for name in ["c1", "c2"] {
            let mut sequence = PathSequence::new();
            sequence.add_vertex(JobVertexId::new("V1"), None, Some(0), SamplingStrategy::ReadWrite);
            graph.add_constraint(LatencyConstraint::new(ConstraintId::new(name), name, sequence, 50.0)).unwrap();
        }
        assert!(graph.single_constraint().is_err());

        let split = graph.split_by_constraint();
        assert_eq!(split.len(), 2);
        for (id, single) in split {
            assert_eq!(single.single_constraint().unwrap().id, id);
        }
    }
}
