use arc_swap::ArcSwap;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;

use crate::domain::clock::clock::SharedClock;
use crate::domain::qos_model::reporter_id::ReporterId;
use crate::domain::qos_reporter::report_forwarder::ReportForwarder;
use crate::domain::qos_reporter::statistics::{QosSample, VertexStatistics};
use crate::error::{Error, Result};

/// Traffic counters of one reporter since its last report.
#[derive(Debug)]
struct ReporterState {
    records_received: u64,
    records_emitted: u64,
    time_of_first_receive_ms: Option<i64>,
    time_of_last_report_ms: i64,
    /// Events between two "is a report due" checks.
    probe_interval: u64,
    events_until_check: u64,
}

/// Reporter of one gate combination of a task.
#[derive(Debug)]
pub struct VertexQosReporter {
    reporter_id: ReporterId,
    input_gate_index: Option<usize>,
    output_gate_index: Option<usize>,
    state: Mutex<ReporterState>,
}

impl VertexQosReporter {
    fn new(reporter_id: ReporterId, input_gate_index: Option<usize>, output_gate_index: Option<usize>, now_ms: i64) -> Self {
        let state = ReporterState {
            records_received: 0,
            records_emitted: 0,
            time_of_first_receive_ms: None,
            time_of_last_report_ms: now_ms,
            probe_interval: 1,
            events_until_check: 1,
        };
        VertexQosReporter { reporter_id, input_gate_index, output_gate_index, state: Mutex::new(state) }
    }

    pub fn reporter_id(&self) -> &ReporterId {
        &self.reporter_id
    }

    pub fn input_gate_index(&self) -> Option<usize> {
        self.input_gate_index
    }

    pub fn output_gate_index(&self) -> Option<usize> {
        self.output_gate_index
    }

    pub fn probe_interval(&self) -> u64 {
        self.state.lock().probe_interval
    }

    fn record_received(&self, clock: &SharedClock, interval_ms: i64) -> Option<(QosSample, i64)> {
        let mut state = self.state.lock();
        if state.records_received == 0 {
            state.time_of_first_receive_ms = Some(clock.now_millis());
        }
        state.records_received += 1;
        self.count_down(&mut state, clock, interval_ms)
    }

    fn record_emitted(&self, clock: &SharedClock, interval_ms: i64) -> Option<(QosSample, i64)> {
        let mut state = self.state.lock();
        state.records_emitted += 1;
        self.count_down(&mut state, clock, interval_ms)
    }

    fn count_down(&self, state: &mut ReporterState, clock: &SharedClock, interval_ms: i64) -> Option<(QosSample, i64)> {
        state.events_until_check = state.events_until_check.saturating_sub(1);
        if state.events_until_check > 0 {
            return None;
        }
        state.events_until_check = state.probe_interval;

        let now_ms = clock.now_millis();
        if !self.has_data(state) || now_ms < state.time_of_last_report_ms + interval_ms {
            return None;
        }
        Some((self.take_report(state, now_ms), now_ms))
    }

    /// Both configured sides must have seen traffic.
    fn has_data(&self, state: &ReporterState) -> bool {
        let input_ok = self.input_gate_index.is_none() || state.records_received > 0;
        let output_ok = self.output_gate_index.is_none() || state.records_emitted > 0;
        input_ok && output_ok && (state.records_received > 0 || state.records_emitted > 0)
    }

    fn take_report(&self, state: &mut ReporterState, now_ms: i64) -> QosSample {
        let seconds = (now_ms - state.time_of_last_report_ms) as f64 / 1000.0;

        let records_consumed_per_sec = self.input_gate_index.map(|_| state.records_received as f64 / seconds);
        let records_emitted_per_sec = self.output_gate_index.map(|_| state.records_emitted as f64 / seconds);
        let latency_ms = match (self.input_gate_index, self.output_gate_index, state.time_of_first_receive_ms) {
            (Some(_), Some(_), Some(first_receive)) if state.records_received > 0 => Some((now_ms - first_receive) as f64 / state.records_received as f64),
            _ => None,
        };

        let events = state.records_received + state.records_emitted;
        state.probe_interval = events.div_ceil(10).max(1);
        state.events_until_check = state.probe_interval;
        state.records_received = 0;
        state.records_emitted = 0;
        state.time_of_first_receive_ms = None;
        state.time_of_last_report_ms = now_ms;

        QosSample::Vertex(VertexStatistics { reporter_id: self.reporter_id.clone(), latency_ms, records_consumed_per_sec, records_emitted_per_sec })
    }
}

type GateReporters = ArcSwap<Vec<Arc<VertexQosReporter>>>;

/// Samples the traffic of one task for all gate combinations it reports on.
///
/// `record_received`/`record_emitted` run on the task thread for every record and only
/// read the per-gate reporter lists. Registration happens on a control thread; it
/// publishes a new list per gate instead of mutating the one readers may hold.
#[derive(Debug)]
pub struct ReportScheduler {
    forwarder: Arc<dyn ReportForwarder>,
    clock: SharedClock,
    reporters: DashMap<ReporterId, Arc<VertexQosReporter>>,
    reporters_by_input_gate: Vec<GateReporters>,
    reporters_by_output_gate: Vec<GateReporters>,
    registration: Mutex<()>,
}

impl ReportScheduler {
    pub fn new(forwarder: Arc<dyn ReportForwarder>, clock: SharedClock, no_of_input_gates: usize, no_of_output_gates: usize) -> Self {
        ReportScheduler {
            forwarder,
            clock,
            reporters: DashMap::new(),
            reporters_by_input_gate: (0..no_of_input_gates).map(|_| ArcSwap::from_pointee(Vec::new())).collect(),
            reporters_by_output_gate: (0..no_of_output_gates).map(|_| ArcSwap::from_pointee(Vec::new())).collect(),
            registration: Mutex::new(()),
        }
    }

    /// Registers a reporter. Returns `Ok(false)` if `reporter_id` is already registered.
    pub fn add_reporter(&self, input_gate_index: Option<usize>, output_gate_index: Option<usize>, reporter_id: ReporterId) -> Result<bool> {
        if input_gate_index.is_none() && output_gate_index.is_none() {
            return Err(Error::InvalidArgument(format!("Reporter {} has neither input nor output gate", reporter_id)));
        }
        let input_slot = match input_gate_index {
            Some(index) => Some(self.reporters_by_input_gate.get(index).ok_or_else(|| Error::InvalidArgument(format!("Task has no input gate {}", index)))?),
            None => None,
        };
        let output_slot = match output_gate_index {
            Some(index) => Some(self.reporters_by_output_gate.get(index).ok_or_else(|| Error::InvalidArgument(format!("Task has no output gate {}", index)))?),
            None => None,
        };

        let _guard = self.registration.lock();
        if self.reporters.contains_key(&reporter_id) {
            return Ok(false);
        }

        let reporter = Arc::new(VertexQosReporter::new(reporter_id.clone(), input_gate_index, output_gate_index, self.clock.now_millis()));
        for slot in input_slot.into_iter().chain(output_slot) {
            let mut next = Vec::clone(&slot.load());
            next.push(Arc::clone(&reporter));
            slot.store(Arc::new(next));
        }
        self.reporters.insert(reporter_id.clone(), reporter);

        log::debug!("Registered vertex reporter {}", reporter_id);
        Ok(true)
    }

    pub fn contains_reporter(&self, reporter_id: &ReporterId) -> bool {
        self.reporters.contains_key(reporter_id)
    }

    pub fn reporter(&self, reporter_id: &ReporterId) -> Option<Arc<VertexQosReporter>> {
        self.reporters.get(reporter_id).map(|entry| Arc::clone(entry.value()))
    }

    pub fn number_of_reporters(&self) -> usize {
        self.reporters.len()
    }

    pub fn record_received(&self, input_gate_index: usize) {
        let Some(slot) = self.reporters_by_input_gate.get(input_gate_index) else {
            return;
        };
        let interval_ms = self.forwarder.aggregation_interval_ms();
        for reporter in slot.load().iter() {
            if let Some((sample, timestamp)) = reporter.record_received(&self.clock, interval_ms) {
                self.forwarder.forward(sample, timestamp);
            }
        }
    }

    pub fn record_emitted(&self, output_gate_index: usize) {
        let Some(slot) = self.reporters_by_output_gate.get(output_gate_index) else {
            return;
        };
        let interval_ms = self.forwarder.aggregation_interval_ms();
        for reporter in slot.load().iter() {
            if let Some((sample, timestamp)) = reporter.record_emitted(&self.clock, interval_ms) {
                self.forwarder.forward(sample, timestamp);
            }
        }
    }
}
