use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::domain::qos_model::graph::{QosEdge, QosEdgeKey, QosGraph, QosVertex};
use crate::domain::qos_model::id::{ConstraintId, ExecutionVertexId, InstanceId, JobVertexId, QosManagerId};
use crate::domain::qos_model::sequence::{PathSequence, SequenceElement};
use crate::domain::qos_model::traversal::{QosGraphTraversal, QosGraphVisitor};
use crate::domain::qos_setup::anchor::select_anchor_vertex;
use crate::domain::qos_setup::chain_discovery::CandidateChainFinder;
use crate::domain::qos_setup::roles::{EdgeReporterRole, InstanceRoleSet, ManagerRef, ManagerRole, ReporterRole, VertexReporterRole};
use crate::error::{Error, Result};

/// Role table of a job, one entry per instance that holds any role.
pub type RoleTable = BTreeMap<InstanceId, InstanceRoleSet>;

/// Computes which instances manage which constraints and which members report to them.
///
/// Runs once per job during deployment. Every map is ordered, so the same graphs always
/// produce the same role table.
#[derive(Debug)]
pub struct QosSetup {
    qos_graphs: BTreeMap<ConstraintId, Arc<QosGraph>>,
    instance_roles: RoleTable,
    qos_manager_ids: BTreeSet<QosManagerId>,
}

impl QosSetup {
    pub fn new(qos_graphs: BTreeMap<ConstraintId, Arc<QosGraph>>) -> Self {
        QosSetup { qos_graphs, instance_roles: BTreeMap::new(), qos_manager_ids: BTreeSet::new() }
    }

    pub fn compute_qos_roles(&mut self) -> Result<()> {
        self.compute_qos_manager_roles()?;
        self.compute_qos_reporter_roles()
    }

    pub fn roles(&self) -> &RoleTable {
        &self.instance_roles
    }

    pub fn into_roles(self) -> RoleTable {
        self.instance_roles
    }

    pub fn qos_manager_ids(&self) -> &BTreeSet<QosManagerId> {
        &self.qos_manager_ids
    }

    pub fn manager_ids_by_constraint(&self) -> BTreeMap<ConstraintId, BTreeSet<QosManagerId>> {
        let mut result: BTreeMap<ConstraintId, BTreeSet<QosManagerId>> = BTreeMap::new();
        for role_set in self.instance_roles.values() {
            for role in role_set.manager_roles() {
                result.entry(role.constraint_id.clone()).or_default().insert(role.manager_id());
            }
        }
        result
    }

    /// Asks `finder` for chainable member sequences along every constraint and stores each
    /// chain with the instance it was found on.
    pub fn compute_candidate_chains(&mut self, finder: &dyn CandidateChainFinder) {
        for (constraint_id, graph) in &self.qos_graphs {
            let instance_roles = &mut self.instance_roles;
            finder.find_chains_along_constraint(constraint_id, graph, &mut |instance: InstanceId, chain: Vec<ExecutionVertexId>| {
                let role_set = instance_roles.entry(instance.clone()).or_insert_with(|| InstanceRoleSet::new(instance.clone()));
                if role_set.add_candidate_chain(chain) {
                    log::debug!("Candidate chain for constraint {} registered on {}", constraint_id, instance);
                }
            });
        }
    }

    fn role_set_mut(&mut self, instance: &InstanceId) -> &mut InstanceRoleSet {
        self.instance_roles.entry(instance.clone()).or_insert_with(|| InstanceRoleSet::new(instance.clone()))
    }

    fn compute_qos_manager_roles(&mut self) -> Result<()> {
        let mut anchor_blacklist: BTreeSet<JobVertexId> = BTreeSet::new();
        let graphs: Vec<Arc<QosGraph>> = self.qos_graphs.values().cloned().collect();

        for graph in graphs {
            let constraint_id = graph.single_constraint()?.id.clone();
            let anchor_vertex_id = select_anchor_vertex(&graph, &mut anchor_blacklist)?;

            let partitions = partition_members_by_instance(&graph, &anchor_vertex_id)?;
            let manager_count = partitions.len();
            for (instance, members) in partitions {
                let role = ManagerRole::new(instance.clone(), constraint_id.clone(), Arc::clone(&graph), anchor_vertex_id.clone(), members)?;
                self.qos_manager_ids.insert(role.manager_id());
                self.role_set_mut(&instance).add_manager_role(role);
            }

            tracing::info!(constraint = %constraint_id, anchor = %anchor_vertex_id, managers = manager_count, "Anchor vertex selected");
        }

        log::info!("Running {} QoS managers in total", self.qos_manager_ids.len());
        Ok(())
    }

    fn compute_qos_reporter_roles(&mut self) -> Result<()> {
        let manager_roles: Vec<ManagerRole> = self.instance_roles.values().flat_map(|set| set.manager_roles().iter().cloned()).collect();

        for manager_role in &manager_roles {
            let reporters = collect_reporter_roles(manager_role)?;
            let mut added = 0;
            for (instance, role) in reporters {
                if self.role_set_mut(&instance).add_reporter_role(role) {
                    added += 1;
                }
            }
            log::debug!("{} reporter roles report to {} for constraint {}", added, manager_role.manager_id(), manager_role.constraint_id);
        }
        Ok(())
    }
}

/// Anchor group vertex members, grouped by their executing instance.
pub fn partition_members_by_instance(graph: &QosGraph, anchor_vertex_id: &JobVertexId) -> Result<BTreeMap<InstanceId, Vec<ExecutionVertexId>>> {
    let mut partitions: BTreeMap<InstanceId, Vec<ExecutionVertexId>> = BTreeMap::new();
    for member in graph.members(anchor_vertex_id)? {
        partitions.entry(member.instance.clone()).or_default().push(member.id.clone());
    }
    Ok(partitions)
}

/// Walks the constraint path from every anchor member of `manager_role` and returns each
/// reporter role together with the instance it has to be deployed on.
pub fn collect_reporter_roles(manager_role: &ManagerRole) -> Result<Vec<(InstanceId, ReporterRole)>> {
    let graph = manager_role.graph.as_ref();
    let constraint = graph.constraint(&manager_role.constraint_id).ok_or_else(|| Error::UnknownGraphElement(format!("constraint {}", manager_role.constraint_id)))?;

    let mut collector = ReporterRoleCollector { graph, sequence: &constraint.sequence, manager: manager_role.manager_ref(), roles: Vec::new(), error: None };
    let mut traversal = QosGraphTraversal::new(graph, &constraint.sequence);

    for anchor_member in &manager_role.members_on_instance {
        traversal.traverse_forward(anchor_member, &mut collector)?;
        traversal.traverse_backward(anchor_member, false, true, &mut collector)?;
    }

    match collector.error {
        Some(error) => Err(error),
        None => Ok(collector.roles),
    }
}

struct ReporterRoleCollector<'a> {
    graph: &'a QosGraph,
    sequence: &'a PathSequence,
    manager: ManagerRef,
    roles: Vec<(InstanceId, ReporterRole)>,
    error: Option<Error>,
}

impl ReporterRoleCollector<'_> {
    fn record(&mut self, result: Result<()>) {
        if let Err(error) = result {
            self.error.get_or_insert(error);
        }
    }

    fn add_vertex_reporter(&mut self, vertex: &QosVertex, input_gate_index: Option<usize>, output_gate_index: Option<usize>, element: &SequenceElement, is_dummy: bool) -> Result<()> {
        let role = VertexReporterRole::new(vertex, input_gate_index, output_gate_index, element.sampling_strategy, is_dummy, self.manager.clone())?;
        self.roles.push((vertex.instance.clone(), ReporterRole::Vertex(role)));
        Ok(())
    }

    fn add_edge_reporter(&mut self, edge: &QosEdge, element: &SequenceElement) -> Result<()> {
        let source = self.graph.vertex(&edge.source_vertex_id).ok_or_else(|| Error::UnknownGraphElement(format!("member {}", edge.source_vertex_id)))?;
        let target = self.graph.vertex(&edge.target_vertex_id).ok_or_else(|| Error::UnknownGraphElement(format!("member {}", edge.target_vertex_id)))?;

        let role = EdgeReporterRole::new(edge, source, target, element.sampling_strategy, self.manager.clone())?;
        self.roles.push((source.instance.clone(), ReporterRole::Edge(role.clone())));
        self.roles.push((target.instance.clone(), ReporterRole::Edge(role)));

        // Boundary edges: the outer endpoint gets a dummy reporter so the manager sees a complete path.
        if self.sequence.is_first(element) {
            self.add_vertex_reporter(source, None, Some(edge.output_gate_index), element, true)?;
        }
        if self.sequence.is_last(element) {
            self.add_vertex_reporter(target, Some(edge.input_gate_index), None, element, true)?;
        }
        Ok(())
    }
}

impl QosGraphVisitor for ReporterRoleCollector<'_> {
    fn visit_vertex(&mut self, vertex: &QosVertex, element: &SequenceElement) {
        let result = self.add_vertex_reporter(vertex, element.input_gate_index(), element.output_gate_index(), element, false);
        self.record(result);
    }

    fn visit_edge(&mut self, _edge_key: QosEdgeKey, edge: &QosEdge, element: &SequenceElement) {
        let result = self.add_edge_reporter(edge, element);
        self.record(result);
    }
}
