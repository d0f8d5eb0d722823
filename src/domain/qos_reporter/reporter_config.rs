use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

use crate::domain::qos_model::id::{ChannelId, ExecutionVertexId, QosManagerId};
use crate::domain::qos_model::reporter_id::ReporterId;
use crate::domain::qos_model::sequence::SamplingStrategy;
use crate::domain::qos_reporter::report_scheduler::ReportScheduler;
use crate::domain::qos_setup::roles::{EdgeReporterRole, VertexReporterRole};

/// Reporter configuration for one vertex gate combination, as shipped to the hosting instance.
///
/// A dummy configuration only marks a sequence endpoint and takes no samples.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VertexReporterConfig {
    pub reporter_id: ReporterId,
    pub vertex_id: ExecutionVertexId,
    pub input_gate_index: Option<usize>,
    pub output_gate_index: Option<usize>,
    pub sampling_strategy: SamplingStrategy,
    #[serde(default)]
    pub is_dummy: bool,
    pub manager_id: QosManagerId,
}

impl From<&VertexReporterRole> for VertexReporterConfig {
    fn from(role: &VertexReporterRole) -> Self {
        VertexReporterConfig {
            reporter_id: role.reporter_id.clone(),
            vertex_id: role.vertex_id.clone(),
            input_gate_index: role.input_gate_index,
            output_gate_index: role.output_gate_index,
            sampling_strategy: role.sampling_strategy,
            is_dummy: role.is_dummy,
            manager_id: role.manager.manager_id.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeReporterConfig {
    pub reporter_id: ReporterId,
    pub source_channel_id: ChannelId,
    pub target_channel_id: ChannelId,
    pub source_vertex_id: ExecutionVertexId,
    pub target_vertex_id: ExecutionVertexId,
    pub output_gate_index: usize,
    pub input_gate_index: usize,
    pub manager_id: QosManagerId,
}

impl From<&EdgeReporterRole> for EdgeReporterConfig {
    fn from(role: &EdgeReporterRole) -> Self {
        EdgeReporterConfig {
            reporter_id: role.reporter_id.clone(),
            source_channel_id: role.source_channel_id.clone(),
            target_channel_id: role.target_channel_id.clone(),
            source_vertex_id: role.source_vertex_id.clone(),
            target_vertex_id: role.target_vertex_id.clone(),
            output_gate_index: role.output_gate_index,
            input_gate_index: role.input_gate_index,
            manager_id: role.manager.manager_id.clone(),
        }
    }
}

/// Notified whenever a new reporter configuration becomes known on an instance.
pub trait QosReporterConfigListener: Send + Sync {
    fn new_vertex_reporter(&self, config: &VertexReporterConfig);

    fn new_edge_reporter(&self, config: &EdgeReporterConfig);
}

/// Collects the reporter configurations of one instance and fans them out to listeners.
///
/// Listeners registered late are replayed every configuration known so far.
pub struct ReporterConfigCenter {
    aggregation_interval_ms: i64,
    vertex_configs: RwLock<Vec<VertexReporterConfig>>,
    edge_configs: RwLock<Vec<EdgeReporterConfig>>,
    known: Mutex<HashSet<(ReporterId, QosManagerId)>>,
    listeners: RwLock<Vec<Arc<dyn QosReporterConfigListener>>>,
}

impl ReporterConfigCenter {
    pub fn new(aggregation_interval_ms: i64) -> Self {
        ReporterConfigCenter {
            aggregation_interval_ms,
            vertex_configs: RwLock::new(Vec::new()),
            edge_configs: RwLock::new(Vec::new()),
            known: Mutex::new(HashSet::new()),
            listeners: RwLock::new(Vec::new()),
        }
    }

    pub fn aggregation_interval_ms(&self) -> i64 {
        self.aggregation_interval_ms
    }

    pub fn add_listener(&self, listener: Arc<dyn QosReporterConfigListener>) {
        let mut listeners = self.listeners.write();
        for config in self.vertex_configs.read().iter() {
            listener.new_vertex_reporter(config);
        }
        for config in self.edge_configs.read().iter() {
            listener.new_edge_reporter(config);
        }
        listeners.push(listener);
    }

    /// Returns false for a configuration that is already known.
    pub fn add_vertex_reporter(&self, config: VertexReporterConfig) -> bool {
        if !self.known.lock().insert((config.reporter_id.clone(), config.manager_id.clone())) {
            return false;
        }
        let listeners = self.listeners.read();
        self.vertex_configs.write().push(config.clone());
        for listener in listeners.iter() {
            listener.new_vertex_reporter(&config);
        }
        true
    }

    pub fn add_edge_reporter(&self, config: EdgeReporterConfig) -> bool {
        if !self.known.lock().insert((config.reporter_id.clone(), config.manager_id.clone())) {
            return false;
        }
        let listeners = self.listeners.read();
        self.edge_configs.write().push(config.clone());
        for listener in listeners.iter() {
            listener.new_edge_reporter(&config);
        }
        true
    }

    pub fn vertex_reporters_for(&self, vertex_id: &ExecutionVertexId) -> Vec<VertexReporterConfig> {
        self.vertex_configs.read().iter().filter(|config| config.vertex_id == *vertex_id).cloned().collect()
    }

    pub fn edge_reporters(&self) -> Vec<EdgeReporterConfig> {
        self.edge_configs.read().clone()
    }
}

/// Wires the vertex reporter configurations of one local task into its [`ReportScheduler`].
pub struct TaskReporterBinding {
    vertex_id: ExecutionVertexId,
    scheduler: Arc<ReportScheduler>,
}

impl TaskReporterBinding {
    pub fn new(vertex_id: ExecutionVertexId, scheduler: Arc<ReportScheduler>) -> Self {
        TaskReporterBinding { vertex_id, scheduler }
    }
}

impl QosReporterConfigListener for TaskReporterBinding {
    fn new_vertex_reporter(&self, config: &VertexReporterConfig) {
        if config.vertex_id != self.vertex_id {
            return;
        }
        if config.is_dummy {
            log::debug!("Reporter {} on task {} is a dummy, no sampling", config.reporter_id, self.vertex_id);
            return;
        }
        if let Err(e) = self.scheduler.add_reporter(config.input_gate_index, config.output_gate_index, config.reporter_id.clone()) {
            log::error!("Cannot register reporter {} on task {}: {}", config.reporter_id, self.vertex_id, e);
        }
    }

    fn new_edge_reporter(&self, _config: &EdgeReporterConfig) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::clock::clock_mock::MockClock;
    use crate::domain::qos_model::id::{GateId, InstanceId};
    use crate::domain::qos_reporter::report_forwarder::ChannelReportForwarder;

    fn vertex_config(vertex: &str, manager: &str) -> VertexReporterConfig {
        VertexReporterConfig {
            reporter_id: ReporterId::vertex(ExecutionVertexId::new(vertex), Some(GateId::new(format!("{}/in0", vertex))), Some(GateId::new(format!("{}/out0", vertex)))).unwrap(),
            vertex_id: ExecutionVertexId::new(vertex),
            input_gate_index: Some(0),
            output_gate_index: Some(0),
            sampling_strategy: SamplingStrategy::ReadWrite,
            is_dummy: false,
            manager_id: QosManagerId::for_instance(&InstanceId::new(manager)),
        }
    }

    #[test]
    fn test_binding_registers_only_its_own_vertex() {
        let (forwarder, _receiver) = ChannelReportForwarder::new(1000);
        let scheduler = Arc::new(ReportScheduler::new(Arc::new(forwarder), Arc::new(MockClock::new(0)), 1, 1));
        let center = ReporterConfigCenter::new(1000);
        center.add_listener(Arc::new(TaskReporterBinding::new(ExecutionVertexId::new("v1"), Arc::clone(&scheduler))));

        assert!(center.add_vertex_reporter(vertex_config("v1", "host-0")));
        assert!(center.add_vertex_reporter(vertex_config("v2", "host-0")));
        assert!(!center.add_vertex_reporter(vertex_config("v1", "host-0")));

        assert_eq!(scheduler.number_of_reporters(), 1);
    }

    #[test]
    fn test_binding_skips_dummy_reporters() {
        let (forwarder, _receiver) = ChannelReportForwarder::new(1000);
        let scheduler = Arc::new(ReportScheduler::new(Arc::new(forwarder), Arc::new(MockClock::new(0)), 1, 1));
        let center = ReporterConfigCenter::new(1000);
        center.add_listener(Arc::new(TaskReporterBinding::new(ExecutionVertexId::new("v1"), Arc::clone(&scheduler))));

        let dummy = VertexReporterConfig { is_dummy: true, ..vertex_config("v1", "host-0") };
        assert!(center.add_vertex_reporter(dummy));
        assert_eq!(scheduler.number_of_reporters(), 0);
        assert_eq!(center.vertex_reporters_for(&ExecutionVertexId::new("v1")).len(), 1);
    }

    #[test]
    fn test_late_listener_is_replayed() {
        let center = ReporterConfigCenter::new(1000);
        center.add_vertex_reporter(vertex_config("v1", "host-0"));

        let (forwarder, _receiver) = ChannelReportForwarder::new(1000);
        let scheduler = Arc::new(ReportScheduler::new(Arc::new(forwarder), Arc::new(MockClock::new(0)), 1, 1));
        center.add_listener(Arc::new(TaskReporterBinding::new(ExecutionVertexId::new("v1"), Arc::clone(&scheduler))));

        assert_eq!(scheduler.number_of_reporters(), 1);
        assert_eq!(center.vertex_reporters_for(&ExecutionVertexId::new("v1")).len(), 1);
    }

    #[test]
    fn test_same_reporter_for_two_managers_is_kept_twice() {
        let center = ReporterConfigCenter::new(1000);
        assert!(center.add_vertex_reporter(vertex_config("v1", "host-0")));
        assert!(center.add_vertex_reporter(vertex_config("v1", "host-1")));
        assert_eq!(center.vertex_reporters_for(&ExecutionVertexId::new("v1")).len(), 2);
    }
}
