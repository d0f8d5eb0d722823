use serde::Serialize;
use std::collections::HashMap;

use crate::config::QosConfig;
use crate::domain::clock::clock::SharedClock;
use crate::domain::qos_manager::qos_data::{EdgeQosData, VertexQosData};
use crate::domain::qos_manager::sequence_summary::{MemberQosData, PathSummary};
use crate::domain::qos_model::constraint::LatencyConstraint;
use crate::domain::qos_model::graph::QosGraphMember;
use crate::domain::qos_model::id::{ChannelId, ConstraintId, ExecutionVertexId, QosManagerId};
use crate::domain::qos_model::reporter_id::ReporterId;
use crate::domain::qos_model::traversal::member_paths_through;
use crate::domain::qos_reporter::statistics::QosSample;
use crate::domain::qos_setup::qos_setup::collect_reporter_roles;
use crate::domain::qos_setup::roles::{ManagerRole, ReporterRole};
use crate::error::{Error, Result};

/// A member path whose fresh summary exceeds the constraint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QosViolation {
    pub constraint_id: ConstraintId,
    pub members: Vec<String>,
    pub max_latency_ms: f64,
    pub summary: PathSummary,
}

/// Manager side view of one constraint: the latest measurements of every member
/// reporting to this manager, folded into path summaries on demand.
#[derive(Debug)]
pub struct QosManagerModel {
    role: ManagerRole,
    clock: SharedClock,
    vertex_data: HashMap<ExecutionVertexId, VertexQosData>,
    edge_data: HashMap<ChannelId, EdgeQosData>,
}

impl QosManagerModel {
    pub fn new(role: ManagerRole, config: &QosConfig, clock: SharedClock) -> Result<Self> {
        let now_ms = clock.now_millis();
        let mut vertex_data: HashMap<ExecutionVertexId, VertexQosData> = HashMap::new();
        let mut edge_data = HashMap::new();

        for (_, reporter) in collect_reporter_roles(&role)? {
            match reporter {
                ReporterRole::Vertex(vertex) => {
                    vertex_data
                        .entry(vertex.vertex_id.clone())
                        .or_insert_with(|| VertexQosData::new(vertex.vertex_id.clone(), config.value_history_capacity))
                        .prepare_for_reports_on((vertex.input_gate_index, vertex.output_gate_index));
                }
                ReporterRole::Edge(edge) => {
                    edge_data
                        .entry(edge.source_channel_id.clone())
                        .or_insert_with(|| EdgeQosData::new(edge.source_channel_id.clone(), config.value_history_capacity, config.initial_buffer_size, now_ms));
                }
            }
        }

        log::info!(
            "QoS manager {} models constraint {} with {} vertices and {} edges",
            role.manager_id(),
            role.constraint_id,
            vertex_data.len(),
            edge_data.len()
        );
        Ok(QosManagerModel { role, clock, vertex_data, edge_data })
    }

    pub fn manager_id(&self) -> QosManagerId {
        self.role.manager_id()
    }

    pub fn constraint_id(&self) -> &ConstraintId {
        &self.role.constraint_id
    }

    /// Stores a sample. Returns false (and logs) if no member of this model matches its reporter.
    pub fn process_sample(&mut self, sample: &QosSample, timestamp_ms: i64) -> bool {
        match (sample, sample.reporter_id()) {
            (QosSample::Vertex(statistics), ReporterId::Vertex { vertex_id, input_gate_id, output_gate_id }) => {
                let Some(vertex) = self.role.graph.vertex(vertex_id) else {
                    log::warn!("Sample from unknown vertex {} ignored", vertex_id);
                    return false;
                };
                let input_gate_index = input_gate_id.as_ref().and_then(|gate| vertex.input_gate_index(gate));
                let output_gate_index = output_gate_id.as_ref().and_then(|gate| vertex.output_gate_index(gate));

                match self.vertex_data.get_mut(vertex_id) {
                    Some(data) if data.is_prepared_for((input_gate_index, output_gate_index)) => {
                        data.add_statistics((input_gate_index, output_gate_index), statistics, timestamp_ms);
                        true
                    }
                    _ => {
                        log::warn!("Manager {} does not expect reports from {}", self.role.manager_id(), sample.reporter_id());
                        false
                    }
                }
            }
            (QosSample::Edge(statistics), ReporterId::Edge { source_channel_id }) => match self.edge_data.get_mut(source_channel_id) {
                Some(data) => {
                    data.add_statistics(statistics, timestamp_ms);
                    true
                }
                None => {
                    log::warn!("Manager {} does not expect reports from {}", self.role.manager_id(), sample.reporter_id());
                    false
                }
            },
            _ => {
                log::error!("Sample kind does not match reporter {}", sample.reporter_id());
                false
            }
        }
    }

    /// Remembers a buffer size set on a channel. Summaries of paths through the channel are
    /// stale until new measurements arrive.
    pub fn record_buffer_size(&mut self, source_channel_id: &ChannelId, buffer_size: i32) -> Result<()> {
        let now_ms = self.clock.now_millis();
        let data = self.edge_data.get_mut(source_channel_id).ok_or_else(|| Error::UnknownGraphElement(format!("channel {}", source_channel_id)))?;
        data.record_buffer_size(buffer_size, now_ms);
        Ok(())
    }

    pub fn buffer_size(&self, source_channel_id: &ChannelId) -> Option<i32> {
        self.edge_data.get(source_channel_id).and_then(EdgeQosData::buffer_size)
    }

    /// Every member path of the constraint through one of this manager's anchor members.
    pub fn member_sequences(&self) -> Result<Vec<Vec<QosGraphMember>>> {
        let constraint = self.constraint()?;
        let mut paths = Vec::new();
        for anchor in &self.role.members_on_instance {
            paths.extend(member_paths_through(&self.role.graph, &constraint.sequence, anchor)?);
        }
        Ok(paths)
    }

    pub fn summarize(&self, path: &[QosGraphMember]) -> Result<PathSummary> {
        let constraint = self.constraint()?;
        let mut members = Vec::with_capacity(path.len());
        for member in path {
            members.push(match member {
                QosGraphMember::Vertex(vertex_id) => MemberQosData::Vertex(self.vertex_data.get(vertex_id)),
                QosGraphMember::Edge(edge_key) => {
                    let edge = self.role.graph.edge(*edge_key).ok_or_else(|| Error::UnknownGraphElement("member edge".to_string()))?;
                    MemberQosData::Edge(self.edge_data.get(&edge.source_channel_id))
                }
            });
        }

        let mut summary = PathSummary::new(&constraint.sequence);
        summary.update(&members)?;
        Ok(summary)
    }

    /// Fresh member paths whose latency exceeds the constraint.
    pub fn find_violations(&self) -> Result<Vec<QosViolation>> {
        let constraint = self.constraint()?;
        let mut violations = Vec::new();

        for path in self.member_sequences()? {
            let summary = self.summarize(&path)?;
            if !summary.is_fresh() || summary.path_latency_ms() <= constraint.max_latency_ms {
                continue;
            }
            violations.push(QosViolation {
                constraint_id: constraint.id.clone(),
                members: path.iter().map(|member| self.describe(member)).collect(),
                max_latency_ms: constraint.max_latency_ms,
                summary,
            });
        }

        if !violations.is_empty() {
            tracing::info!(manager = %self.role.manager_id(), constraint = %constraint.id, violations = violations.len(), "Latency constraint violated");
        }
        Ok(violations)
    }

    fn constraint(&self) -> Result<&LatencyConstraint> {
        self.role.graph.constraint(&self.role.constraint_id).ok_or_else(|| Error::UnknownGraphElement(format!("constraint {}", self.role.constraint_id)))
    }

    fn describe(&self, member: &QosGraphMember) -> String {
        match member {
            QosGraphMember::Vertex(vertex_id) => vertex_id.to_string(),
            QosGraphMember::Edge(edge_key) => self.role.graph.edge(*edge_key).map(|edge| edge.source_channel_id.to_string()).unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::clock::clock_mock::MockClock;
    use crate::domain::qos_model::graph::{DistributionPattern, QosGraph, QosGroupEdge};
    use crate::domain::qos_model::id::{InstanceId, JobVertexId};
    use crate::domain::qos_model::sequence::{PathSequence, SamplingStrategy};
    use crate::domain::qos_reporter::statistics::EdgeStatistics;
    use std::sync::Arc;
    use tracing_test::traced_test;

    fn single_edge_role() -> ManagerRole {
        let mut graph = QosGraph::new();
        for group in ["V1", "V2"] {
            graph.add_group_vertex(JobVertexId::new(group), group).unwrap();
            graph.add_member(&JobVertexId::new(group), ExecutionVertexId::new(group.to_lowercase()), InstanceId::new("host")).unwrap();
        }
        graph
            .connect(QosGroupEdge {
                source_vertex_id: JobVertexId::new("V1"),
                target_vertex_id: JobVertexId::new("V2"),
                output_gate_index: 0,
                input_gate_index: 0,
                distribution_pattern: DistributionPattern::Pointwise,
            })
            .unwrap();
        let mut sequence = PathSequence::new();
        sequence.add_edge(JobVertexId::new("V1"), 0, JobVertexId::new("V2"), 0, SamplingStrategy::ReadWrite);
        graph.add_constraint(LatencyConstraint::new(ConstraintId::new("c1"), "c1", sequence, 5.0)).unwrap();

        ManagerRole::new(InstanceId::new("host"), ConstraintId::new("c1"), Arc::new(graph), JobVertexId::new("V1"), vec![ExecutionVertexId::new("v1")]).unwrap()
    }

    #[test]
    #[traced_test]
    fn test_violations_are_traced() {
        let mut model = QosManagerModel::new(single_edge_role(), &QosConfig::default(), Arc::new(MockClock::new(0))).unwrap();
        let channel = ChannelId::new("v1[0]->v2[0]");
        let sample = QosSample::Edge(EdgeStatistics {
            reporter_id: ReporterId::edge(channel.clone()).unwrap(),
            channel_latency_ms: Some(9.0),
            output_buffer_lifetime_ms: Some(4.0),
            records_per_buffer: None,
            records_per_sec: None,
        });
        assert!(model.process_sample(&sample, 1));
        assert_eq!(model.buffer_size(&channel), Some(QosConfig::default().initial_buffer_size));

        let violations = model.find_violations().unwrap();
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].summary.output_buffer_latency_ms(), 2.0);
        assert!(logs_contain("Latency constraint violated"));
    }
}
