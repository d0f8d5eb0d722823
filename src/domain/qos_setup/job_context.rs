use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::api::job_dto::JobDto;
use crate::config::QosConfig;
use crate::domain::clock::clock::SharedClock;
use crate::domain::qos_manager::qos_model::QosManagerModel;
use crate::domain::qos_model::graph::QosGraph;
use crate::domain::qos_model::id::{ConstraintId, InstanceId, JobId, QosManagerId};
use crate::domain::qos_reporter::reporter_config::{EdgeReporterConfig, ReporterConfigCenter, VertexReporterConfig};
use crate::domain::qos_setup::chain_discovery::CandidateChainFinder;
use crate::domain::qos_setup::qos_setup::{QosSetup, RoleTable};
use crate::domain::qos_setup::roles::InstanceRoleSet;
use crate::error::Result;

/// Deployed QoS state of one job: the role table plus the settings every instance runs with.
#[derive(Debug, Clone)]
pub struct QosJobContext {
    job_id: JobId,
    config: QosConfig,
    roles: Arc<RoleTable>,
    manager_ids_by_constraint: BTreeMap<ConstraintId, BTreeSet<QosManagerId>>,
}

impl QosJobContext {
    pub fn deploy(job_id: JobId, qos_graphs: BTreeMap<ConstraintId, Arc<QosGraph>>, config: QosConfig, chain_finder: Option<&dyn CandidateChainFinder>) -> Result<Self> {
        job_id.require("jobID")?;
        config.validate()?;

        let mut setup = QosSetup::new(qos_graphs);
        setup.compute_qos_roles()?;
        if let Some(finder) = chain_finder {
            setup.compute_candidate_chains(finder);
        }

        let manager_ids_by_constraint = setup.manager_ids_by_constraint();
        let roles = setup.into_roles();
        log::info!("Deployed QoS roles of job {} on {} instances", job_id, roles.len());

        Ok(QosJobContext { job_id, config, roles: Arc::new(roles), manager_ids_by_constraint })
    }

    /// Builds the QoS graph of `job`, splits it by constraint and deploys it.
    pub fn from_job(job: &JobDto, config: QosConfig, chain_finder: Option<&dyn CandidateChainFinder>) -> Result<Self> {
        let graph = QosGraph::from_dto(job)?;
        QosJobContext::deploy(JobId::new(job.job_id.clone()), graph.split_by_constraint(), config, chain_finder)
    }

    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    pub fn config(&self) -> &QosConfig {
        &self.config
    }

    pub fn roles(&self) -> Arc<RoleTable> {
        Arc::clone(&self.roles)
    }

    pub fn roles_for(&self, instance: &InstanceId) -> Option<&InstanceRoleSet> {
        self.roles.get(instance)
    }

    pub fn instances(&self) -> impl Iterator<Item = &InstanceId> {
        self.roles.keys()
    }

    pub fn manager_ids_for(&self, constraint_id: &ConstraintId) -> Option<&BTreeSet<QosManagerId>> {
        self.manager_ids_by_constraint.get(constraint_id)
    }

    /// Publishes the reporter roles of `instance` to its config center. Returns the number of
    /// configurations that were new to the center.
    pub fn announce_reporters(&self, instance: &InstanceId, center: &ReporterConfigCenter) -> usize {
        let Some(role_set) = self.roles_for(instance) else {
            return 0;
        };
        let vertex_count = role_set.vertex_reporter_roles().filter(|role| center.add_vertex_reporter(VertexReporterConfig::from(*role))).count();
        let edge_count = role_set.edge_reporter_roles().filter(|role| center.add_edge_reporter(EdgeReporterConfig::from(*role))).count();
        log::debug!("Announced {} vertex and {} edge reporters on {}", vertex_count, edge_count, instance);
        vertex_count + edge_count
    }

    /// One manager model per constraint managed on `instance`.
    pub fn manager_models(&self, instance: &InstanceId, clock: SharedClock) -> Result<Vec<QosManagerModel>> {
        let Some(role_set) = self.roles_for(instance) else {
            return Ok(Vec::new());
        };
        role_set.manager_roles().iter().map(|role| QosManagerModel::new(role.clone(), &self.config, Arc::clone(&clock))).collect()
    }
}
