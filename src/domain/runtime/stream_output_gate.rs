use crossbeam::queue::SegQueue;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::time::Duration;

use crate::domain::qos_model::id::GateId;
use crate::domain::runtime::chain::{ChainLink, RuntimeChain};
use crate::domain::runtime::channel_selector::ChannelSelector;
use crate::domain::runtime::output_gate::OutputGate;
use crate::domain::runtime::qos_action::QosAction;
use crate::domain::runtime::reporting::OutputGateQosReportingListener;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    Running,
    Suspended,
    Closed,
}

/// Output gate of a task that also executes QoS actions.
///
/// Actions may be queued from any thread. They are applied on the task thread, right after
/// the next record has been emitted, so channel state is only touched by its owner.
pub struct StreamOutputGate<T> {
    gate_index: usize,
    gate_id: GateId,
    inner: Mutex<Box<dyn OutputGate<T>>>,
    selector: Mutex<Box<dyn ChannelSelector<T>>>,
    actions: SegQueue<QosAction<T>>,
    state: Mutex<GateState>,
    chain: Mutex<Option<Arc<RuntimeChain<T>>>>,
    listener: RwLock<Option<Arc<dyn OutputGateQosReportingListener>>>,
    chain_establish_timeout: Duration,
}

impl<T: Clone + Send + 'static> StreamOutputGate<T> {
    pub fn new(gate_index: usize, inner: Box<dyn OutputGate<T>>, selector: Box<dyn ChannelSelector<T>>, chain_establish_timeout: Duration) -> Self {
        StreamOutputGate {
            gate_index,
            gate_id: inner.gate_id().clone(),
            inner: Mutex::new(inner),
            selector: Mutex::new(selector),
            actions: SegQueue::new(),
            state: Mutex::new(GateState::Running),
            chain: Mutex::new(None),
            listener: RwLock::new(None),
            chain_establish_timeout,
        }
    }

    pub fn gate_index(&self) -> usize {
        self.gate_index
    }

    pub fn gate_id(&self) -> &GateId {
        &self.gate_id
    }

    pub fn state(&self) -> GateState {
        *self.state.lock()
    }

    pub fn chain(&self) -> Option<Arc<RuntimeChain<T>>> {
        self.chain.lock().clone()
    }

    pub fn pending_actions(&self) -> usize {
        self.actions.len()
    }

    pub fn set_reporting_listener(&self, listener: Arc<dyn OutputGateQosReportingListener>) {
        *self.listener.write() = Some(listener);
    }

    pub fn report_record_emitted(&self) {
        if let Some(listener) = self.listener.read().as_ref() {
            listener.record_emitted(self.gate_index);
        }
    }

    /// Queues `action` for the task thread. Safe to call from any thread.
    pub fn enqueue_action(&self, action: QosAction<T>) {
        self.actions.push(action);
    }

    pub fn write_record(&self, record: T) -> Result<()> {
        let state = self.state();
        if state != GateState::Running {
            return Err(Error::GateError(format!("Cannot write to gate {} in state {:?}", self.gate_id, state)));
        }

        self.report_record_emitted();
        let channels = self.select_channels(&record);
        match self.chain() {
            Some(chain) => chain.write_record(record)?,
            None => self.write_to_channels(record, &channels)?,
        }

        self.process_pending_actions()
    }

    fn select_channels(&self, record: &T) -> Vec<usize> {
        let number_of_channels = self.inner.lock().number_of_channels();
        self.selector.lock().select_channels(record, number_of_channels)
    }

    fn write_to_channels(&self, record: T, channels: &[usize]) -> Result<()> {
        let Some((last, rest)) = channels.split_last() else {
            log::debug!("Selector picked no channel on gate {}, record dropped", self.gate_id);
            return Ok(());
        };
        let mut inner = self.inner.lock();
        for &channel_index in rest {
            inner.write_record(record.clone(), channel_index)?;
        }
        inner.write_record(record, *last)
    }

    pub fn flush(&self) -> Result<()> {
        self.inner.lock().flush()
    }

    /// Applies queued actions in arrival order.
    pub fn process_pending_actions(&self) -> Result<()> {
        while let Some(action) = self.actions.pop() {
            self.apply(action)?;
        }
        Ok(())
    }

    fn apply(&self, action: QosAction<T>) -> Result<()> {
        log::debug!("Applying {:?} on gate {}", action, self.gate_id);
        match action {
            QosAction::LimitBufferSize(_) => Ok(()),
            QosAction::SetOutputBufferLifetimeTarget(target) => {
                let mut inner = self.inner.lock();
                match inner.channel_index(target.source_channel_id()) {
                    Some(channel_index) => inner.set_output_buffer_lifetime_target(channel_index, target.target_lifetime_ms()),
                    None => {
                        log::warn!("Gate {} has no channel {}, output buffer lifetime target ignored", self.gate_id, target.source_channel_id());
                        Ok(())
                    }
                }
            }
            QosAction::EstablishChain(chain) => self.establish_chain(chain),
            QosAction::DropChain => {
                self.drop_chain();
                Ok(())
            }
        }
    }

    fn establish_chain(&self, chain: Arc<RuntimeChain<T>>) -> Result<()> {
        let result = if self.state() == GateState::Running {
            self.install_chain(&chain)
        } else {
            log::info!("Gate {} is not running, {:?} not installed", self.gate_id, chain);
            Ok(())
        };
        chain.signal_tasks_are_successfully_chained();
        result
    }

    fn install_chain(&self, chain: &Arc<RuntimeChain<T>>) -> Result<()> {
        self.flush()?;

        let mut halted_here = Vec::new();
        if let Err(e) = self.halt_links(chain, &mut halted_here) {
            for link in halted_here {
                link.input_gate.wake_task_thread();
            }
            log::warn!("Aborted {:?}: {}", chain, e);
            return Err(e);
        }

        for link in chain.links() {
            if let Some(previous) = link.output_gate.take_chain() {
                previous.wake_links_not_in(chain);
            }
        }
        let previous = self.chain.lock().replace(Arc::clone(chain));
        if let Some(previous) = previous {
            previous.wake_links_not_in(chain);
        }

        if let Err(e) = self.drain_into(chain) {
            self.drop_chain();
            return Err(e);
        }

        log::info!("Established {:?}", chain);
        Ok(())
    }

    /// Halts every link and flushes its output gate. `halted_here` collects the links whose
    /// halt was requested by this call, so they can be woken if a later link fails.
    fn halt_links<'a>(&self, chain: &'a RuntimeChain<T>, halted_here: &mut Vec<&'a ChainLink<T>>) -> Result<()> {
        for link in chain.links() {
            if link.input_gate.halt_task_thread() {
                halted_here.push(link);
            }
            link.input_gate.await_parked(self.chain_establish_timeout)?;
            link.output_gate.flush()?;
        }
        Ok(())
    }

    /// Records already queued on the links are pushed through the chain, tail first.
    fn drain_into(&self, chain: &RuntimeChain<T>) -> Result<()> {
        for (link_index, link) in chain.links().iter().enumerate().rev() {
            for record in link.input_gate.drain_pending() {
                chain.write_record_from(link_index, record)?;
            }
        }
        Ok(())
    }

    fn take_chain(&self) -> Option<Arc<RuntimeChain<T>>> {
        self.chain.lock().take()
    }

    /// Wakes the chained tasks. Each chain wakes its links at most once.
    pub fn drop_chain(&self) {
        if let Some(chain) = self.take_chain() {
            chain.wake_links();
            log::info!("Dropped {:?}", chain);
        }
    }

    pub fn request_suspend(&self) -> Result<()> {
        self.leave_running(GateState::Suspended)
    }

    pub fn request_close(&self) -> Result<()> {
        self.leave_running(GateState::Closed)
    }

    /// A suspended gate accepts records again. Closed gates stay closed.
    pub fn resume(&self) -> bool {
        let mut state = self.state.lock();
        if *state == GateState::Suspended {
            *state = GateState::Running;
            return true;
        }
        false
    }

    fn leave_running(&self, target: GateState) -> Result<()> {
        {
            let mut state = self.state.lock();
            if *state == GateState::Closed {
                return Ok(());
            }
            *state = target;
        }
        self.drop_chain();
        self.flush()
    }
}
