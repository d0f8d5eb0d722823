use crossbeam::channel::{Receiver, RecvTimeoutError};
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;

use crate::domain::qos_model::id::GateId;
use crate::domain::runtime::halt::TaskThreadHalt;
use crate::domain::runtime::reporting::InputGateQosReportingListener;
use crate::error::{Error, Result};

/// Input side of a task. Reading parks the task thread while a chain has halted it.
pub struct StreamInputGate<T> {
    gate_index: usize,
    gate_id: GateId,
    receiver: Receiver<T>,
    halt: TaskThreadHalt,
    poll_interval: Duration,
    listener: RwLock<Option<Arc<dyn InputGateQosReportingListener>>>,
}

impl<T> StreamInputGate<T> {
    pub fn new(gate_index: usize, gate_id: GateId, receiver: Receiver<T>, poll_interval: Duration) -> Self {
        StreamInputGate { gate_index, gate_id, receiver, halt: TaskThreadHalt::new(), poll_interval, listener: RwLock::new(None) }
    }

    pub fn gate_index(&self) -> usize {
        self.gate_index
    }

    pub fn gate_id(&self) -> &GateId {
        &self.gate_id
    }

    pub fn set_reporting_listener(&self, listener: Arc<dyn InputGateQosReportingListener>) {
        *self.listener.write() = Some(listener);
    }

    pub fn report_record_received(&self) {
        if let Some(listener) = self.listener.read().as_ref() {
            listener.record_received(self.gate_index);
        }
    }

    /// Blocks until a record arrives. Returns `None` once every sender is gone.
    pub fn read_record(&self) -> Option<T> {
        loop {
            self.halt.park_if_halted();
            match self.receiver.recv_timeout(self.poll_interval) {
                Ok(record) => {
                    self.report_record_received();
                    return Some(record);
                }
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => return None,
            }
        }
    }

    /// Takes the records queued on this gate without reporting them.
    pub fn drain_pending(&self) -> Vec<T> {
        self.receiver.try_iter().collect()
    }

    pub fn halt_task_thread(&self) -> bool {
        self.halt.halt()
    }

    pub fn wake_task_thread(&self) -> bool {
        self.halt.wake()
    }

    pub fn is_task_thread_halted(&self) -> bool {
        self.halt.is_halted()
    }

    pub fn wait_until_parked(&self, timeout: Duration) -> bool {
        self.halt.wait_until_parked(timeout)
    }

    pub fn await_parked(&self, timeout: Duration) -> Result<()> {
        self.halt.await_parked(timeout).map_err(|e| match e {
            Error::GateError(reason) => Error::GateError(format!("input gate {}: {}", self.gate_id, reason)),
            other => other,
        })
    }
}
