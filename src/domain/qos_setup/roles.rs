use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;

use crate::domain::qos_model::graph::{QosEdge, QosGraph, QosVertex};
use crate::domain::qos_model::id::{ChannelId, ConstraintId, ExecutionVertexId, InstanceId, JobVertexId, QosManagerId};
use crate::domain::qos_model::reporter_id::ReporterId;
use crate::domain::qos_model::sequence::SamplingStrategy;
use crate::error::{Error, Result};

/// "This instance aggregates `constraint_id`, using these local members of the anchor group vertex."
#[derive(Debug, Clone)]
pub struct ManagerRole {
    pub instance: InstanceId,
    pub constraint_id: ConstraintId,
    pub graph: Arc<QosGraph>,
    pub anchor_vertex_id: JobVertexId,
    pub members_on_instance: Vec<ExecutionVertexId>,
}

impl ManagerRole {
    /// Every anchor member has to belong to the anchor group vertex and run on `instance`.
    pub fn new(instance: InstanceId, constraint_id: ConstraintId, graph: Arc<QosGraph>, anchor_vertex_id: JobVertexId, members_on_instance: Vec<ExecutionVertexId>) -> Result<Self> {
        instance.require("instance")?;
        constraint_id.require("constraintID")?;
        if members_on_instance.is_empty() {
            return Err(Error::InvalidArgument(format!("Manager role for constraint {} on {} has no anchor members", constraint_id, instance)));
        }
        if graph.constraint(&constraint_id).is_none() {
            return Err(Error::InvalidArgument(format!("QoS graph does not hold constraint {}", constraint_id)));
        }

        for member_id in &members_on_instance {
            let member = graph.vertex(member_id).ok_or_else(|| Error::UnknownGraphElement(format!("member {}", member_id)))?;
            if member.group_vertex_id != anchor_vertex_id || member.instance != instance {
                return Err(Error::InvalidArgument(format!("Member {} is not a member of {} on instance {}", member_id, anchor_vertex_id, instance)));
            }
        }

        Ok(ManagerRole { instance, constraint_id, graph, anchor_vertex_id, members_on_instance })
    }

    pub fn manager_id(&self) -> QosManagerId {
        QosManagerId::for_instance(&self.instance)
    }

    pub fn manager_ref(&self) -> ManagerRef {
        ManagerRef { manager_id: self.manager_id(), instance: self.instance.clone(), constraint_id: self.constraint_id.clone() }
    }
}

/// Where a reporter sends its samples.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ManagerRef {
    pub manager_id: QosManagerId,
    pub instance: InstanceId,
    pub constraint_id: ConstraintId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexReporterRole {
    pub reporter_id: ReporterId,
    pub vertex_id: ExecutionVertexId,
    pub group_vertex_id: JobVertexId,
    pub instance: InstanceId,
    pub input_gate_index: Option<usize>,
    pub output_gate_index: Option<usize>,
    pub sampling_strategy: SamplingStrategy,
    /// Stands in for the outer endpoint of a boundary edge; does no sampling of its own.
    pub is_dummy: bool,
    pub manager: ManagerRef,
}

impl VertexReporterRole {
    pub fn new(
        vertex: &QosVertex,
        input_gate_index: Option<usize>,
        output_gate_index: Option<usize>,
        sampling_strategy: SamplingStrategy,
        is_dummy: bool,
        manager: ManagerRef,
    ) -> Result<Self> {
        let reporter_id = ReporterId::for_vertex_member(vertex, input_gate_index, output_gate_index)?;
        Ok(VertexReporterRole {
            reporter_id,
            vertex_id: vertex.id.clone(),
            group_vertex_id: vertex.group_vertex_id.clone(),
            instance: vertex.instance.clone(),
            input_gate_index,
            output_gate_index,
            sampling_strategy,
            is_dummy,
            manager,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeReporterRole {
    pub reporter_id: ReporterId,
    pub source_channel_id: ChannelId,
    pub target_channel_id: ChannelId,
    pub source_vertex_id: ExecutionVertexId,
    pub target_vertex_id: ExecutionVertexId,
    pub output_gate_index: usize,
    pub input_gate_index: usize,
    pub source_instance: InstanceId,
    pub target_instance: InstanceId,
    pub sampling_strategy: SamplingStrategy,
    pub manager: ManagerRef,
}

impl EdgeReporterRole {
    pub fn new(edge: &QosEdge, source: &QosVertex, target: &QosVertex, sampling_strategy: SamplingStrategy, manager: ManagerRef) -> Result<Self> {
        if source.id != edge.source_vertex_id || target.id != edge.target_vertex_id {
            return Err(Error::InvalidArgument(format!("Endpoints {} -> {} do not match edge {}", source.id, target.id, edge.source_channel_id)));
        }
        Ok(EdgeReporterRole {
            reporter_id: ReporterId::for_edge(edge)?,
            source_channel_id: edge.source_channel_id.clone(),
            target_channel_id: edge.target_channel_id.clone(),
            source_vertex_id: edge.source_vertex_id.clone(),
            target_vertex_id: edge.target_vertex_id.clone(),
            output_gate_index: edge.output_gate_index,
            input_gate_index: edge.input_gate_index,
            source_instance: source.instance.clone(),
            target_instance: target.instance.clone(),
            sampling_strategy,
            manager,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReporterRole {
    Vertex(VertexReporterRole),
    Edge(EdgeReporterRole),
}

impl ReporterRole {
    pub fn reporter_id(&self) -> &ReporterId {
        match self {
            ReporterRole::Vertex(role) => &role.reporter_id,
            ReporterRole::Edge(role) => &role.reporter_id,
        }
    }

    pub fn manager(&self) -> &ManagerRef {
        match self {
            ReporterRole::Vertex(role) => &role.manager,
            ReporterRole::Edge(role) => &role.manager,
        }
    }
}

/// All roles co-located on one instance. Accumulated during role computation, read-only afterwards.
#[derive(Debug, Clone)]
pub struct InstanceRoleSet {
    instance: InstanceId,
    manager_roles: Vec<ManagerRole>,
    reporter_roles: Vec<ReporterRole>,
    reporter_keys: HashSet<(ReporterId, QosManagerId)>,
    candidate_chains: Vec<Vec<ExecutionVertexId>>,
}

impl InstanceRoleSet {
    pub fn new(instance: InstanceId) -> Self {
        InstanceRoleSet { instance, manager_roles: Vec::new(), reporter_roles: Vec::new(), reporter_keys: HashSet::new(), candidate_chains: Vec::new() }
    }

    pub fn instance(&self) -> &InstanceId {
        &self.instance
    }

    pub fn manager_id(&self) -> QosManagerId {
        QosManagerId::for_instance(&self.instance)
    }

    pub fn add_manager_role(&mut self, role: ManagerRole) {
        self.manager_roles.push(role);
    }

    /// Returns false if the same reporter already reports to the same manager.
    pub fn add_reporter_role(&mut self, role: ReporterRole) -> bool {
        let key = (role.reporter_id().clone(), role.manager().manager_id.clone());
        if !self.reporter_keys.insert(key) {
            return false;
        }
        self.reporter_roles.push(role);
        true
    }

    pub fn add_candidate_chain(&mut self, chain: Vec<ExecutionVertexId>) -> bool {
        if chain.is_empty() || self.candidate_chains.contains(&chain) {
            return false;
        }
        self.candidate_chains.push(chain);
        true
    }

    pub fn manager_roles(&self) -> &[ManagerRole] {
        &self.manager_roles
    }

    pub fn reporter_roles(&self) -> &[ReporterRole] {
        &self.reporter_roles
    }

    pub fn candidate_chains(&self) -> &[Vec<ExecutionVertexId>] {
        &self.candidate_chains
    }

    pub fn vertex_reporter_roles(&self) -> impl Iterator<Item = &VertexReporterRole> {
        self.reporter_roles.iter().filter_map(|role| match role {
            ReporterRole::Vertex(vertex) => Some(vertex),
            ReporterRole::Edge(_) => None,
        })
    }

    pub fn edge_reporter_roles(&self) -> impl Iterator<Item = &EdgeReporterRole> {
        self.reporter_roles.iter().filter_map(|role| match role {
            ReporterRole::Edge(edge) => Some(edge),
            ReporterRole::Vertex(_) => None,
        })
    }

    pub fn is_manager(&self) -> bool {
        !self.manager_roles.is_empty()
    }

    pub fn summary(&self) -> InstanceRoleSummary {
        let mut managed_constraints = BTreeMap::new();
        for role in &self.manager_roles {
            managed_constraints.insert(role.constraint_id.to_string(), role.members_on_instance.iter().map(|m| m.to_string()).collect());
        }
        let reported_managers: BTreeSet<String> = self.reporter_roles.iter().map(|r| r.manager().manager_id.to_string()).collect();

        InstanceRoleSummary {
            instance: self.instance.to_string(),
            managed_constraints,
            vertex_reporters: self.vertex_reporter_roles().count(),
            dummy_vertex_reporters: self.vertex_reporter_roles().filter(|r| r.is_dummy).count(),
            edge_reporters: self.edge_reporter_roles().count(),
            reports_to: reported_managers.into_iter().collect(),
            candidate_chains: self.candidate_chains.len(),
        }
    }
}

/// Printable overview of one [`InstanceRoleSet`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceRoleSummary {
    pub instance: String,
    /// Constraint id -> anchor members managed on this instance.
    pub managed_constraints: BTreeMap<String, Vec<String>>,
    pub vertex_reporters: usize,
    pub dummy_vertex_reporters: usize,
    pub edge_reporters: usize,
    pub reports_to: Vec<String>,
    pub candidate_chains: usize,
}
