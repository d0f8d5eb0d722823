use std::sync::Arc;

use crate::domain::qos_reporter::report_scheduler::ReportScheduler;

/// Told about every record a task emits on an output gate.
pub trait OutputGateQosReportingListener: Send + Sync {
    fn record_emitted(&self, output_gate_index: usize);
}

/// Told about every record a task receives on an input gate.
pub trait InputGateQosReportingListener: Send + Sync {
    fn record_received(&self, input_gate_index: usize);
}

/// Feeds the gates of one task into its [`ReportScheduler`].
#[derive(Debug, Clone)]
pub struct VertexReporterHook {
    scheduler: Arc<ReportScheduler>,
}

impl VertexReporterHook {
    pub fn new(scheduler: Arc<ReportScheduler>) -> Self {
        VertexReporterHook { scheduler }
    }
}

impl OutputGateQosReportingListener for VertexReporterHook {
    fn record_emitted(&self, output_gate_index: usize) {
        self.scheduler.record_emitted(output_gate_index);
    }
}

impl InputGateQosReportingListener for VertexReporterHook {
    fn record_received(&self, input_gate_index: usize) {
        self.scheduler.record_received(input_gate_index);
    }
}
