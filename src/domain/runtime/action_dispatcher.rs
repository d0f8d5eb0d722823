use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::message::qos_message::{EstablishChainAction, QosActionMessage, QosActionPayload};
use crate::domain::qos_model::id::{ExecutionVertexId, GateId, JobId};
use crate::domain::runtime::chain::{ChainLink, ChainedTask, RuntimeChain};
use crate::domain::runtime::qos_action::QosAction;
use crate::domain::runtime::stream_input_gate::StreamInputGate;
use crate::domain::runtime::stream_output_gate::StreamOutputGate;
use crate::error::{Error, Result};

/// Gates and user code of one task running on this instance.
pub struct LocalTask<T> {
    pub vertex_id: ExecutionVertexId,
    pub input_gates: Vec<Arc<StreamInputGate<T>>>,
    pub output_gates: Vec<Arc<StreamOutputGate<T>>>,
    pub task: Arc<dyn ChainedTask<T>>,
}

impl<T: Clone + Send + 'static> LocalTask<T> {
    fn output_gate(&self, gate_id: &GateId) -> Option<&Arc<StreamOutputGate<T>>> {
        self.output_gates.iter().find(|gate| gate.gate_id() == gate_id)
    }
}

#[derive(Debug)]
pub enum DispatchOutcome<T> {
    Enqueued,
    /// The chain is queued on its head. Callers may wait on [`RuntimeChain::wait_until_chained`].
    ChainEnqueued(Arc<RuntimeChain<T>>),
    Skipped,
}

/// Routes incoming action messages of one job to the output gates of local tasks.
pub struct QosActionDispatcher<T> {
    job_id: JobId,
    tasks: RwLock<HashMap<ExecutionVertexId, LocalTask<T>>>,
}

impl<T: Clone + Send + 'static> QosActionDispatcher<T> {
    pub fn new(job_id: JobId) -> Self {
        QosActionDispatcher { job_id, tasks: RwLock::new(HashMap::new()) }
    }

    pub fn register_task(&self, task: LocalTask<T>) -> Result<()> {
        let mut tasks = self.tasks.write();
        if tasks.contains_key(&task.vertex_id) {
            return Err(Error::InvalidArgument(format!("Task {} is already registered", task.vertex_id)));
        }
        tasks.insert(task.vertex_id.clone(), task);
        Ok(())
    }

    pub fn unregister_task(&self, vertex_id: &ExecutionVertexId) -> bool {
        self.tasks.write().remove(vertex_id).is_some()
    }

    pub fn dispatch(&self, message: QosActionMessage) -> DispatchOutcome<T> {
        if message.job_id != self.job_id {
            log::warn!("Dropping {} for job {}, this dispatcher serves {}", message.payload.kind(), message.job_id, self.job_id);
            return DispatchOutcome::Skipped;
        }

        let kind = message.payload.kind();
        let outcome = match message.payload {
            QosActionPayload::LimitBufferSize(action) => {
                let (vertex_id, gate_id) = (action.vertex_id().clone(), action.output_gate_id().clone());
                self.enqueue(&vertex_id, &gate_id, QosAction::LimitBufferSize(action))
            }
            QosActionPayload::SetOutputBufferLifetimeTarget(action) => {
                let (vertex_id, gate_id) = (action.vertex_id().clone(), action.output_gate_id().clone());
                self.enqueue(&vertex_id, &gate_id, QosAction::SetOutputBufferLifetimeTarget(action))
            }
            QosActionPayload::EstablishChain(action) => self.enqueue_chain(&action),
            QosActionPayload::DropChain(action) => self.enqueue(action.vertex_id(), action.output_gate_id(), QosAction::DropChain),
        };

        match outcome {
            Ok(outcome) => outcome,
            Err(e) => {
                log::warn!("Skipping {} action: {}", kind, e);
                DispatchOutcome::Skipped
            }
        }
    }

    fn enqueue(&self, vertex_id: &ExecutionVertexId, gate_id: &GateId, action: QosAction<T>) -> Result<DispatchOutcome<T>> {
        let tasks = self.tasks.read();
        let task = tasks.get(vertex_id).ok_or_else(|| Error::UnknownGraphElement(format!("task {}", vertex_id)))?;
        let gate = task.output_gate(gate_id).ok_or_else(|| Error::UnknownGraphElement(format!("output gate {} of {}", gate_id, vertex_id)))?;
        gate.enqueue_action(action);
        Ok(DispatchOutcome::Enqueued)
    }

    /// Chains are built from the first input and output gate of every task.
    fn enqueue_chain(&self, action: &EstablishChainAction) -> Result<DispatchOutcome<T>> {
        let tasks = self.tasks.read();
        let lookup = |vertex_id: &ExecutionVertexId| tasks.get(vertex_id).ok_or_else(|| Error::UnknownGraphElement(format!("task {}", vertex_id)));

        let (head_id, rest) = action.vertex_ids().split_first().ok_or_else(|| Error::InvalidArgument("empty chain".to_string()))?;
        let head_gate = lookup(head_id)?
            .output_gates
            .first()
            .cloned()
            .ok_or_else(|| Error::UnknownGraphElement(format!("output gate of {}", head_id)))?;

        let mut links = Vec::with_capacity(rest.len());
        for vertex_id in rest {
            let task = lookup(vertex_id)?;
            let missing_gate = || Error::UnknownGraphElement(format!("gates of {}", vertex_id));
            links.push(ChainLink {
                vertex_id: vertex_id.clone(),
                input_gate: task.input_gates.first().cloned().ok_or_else(missing_gate)?,
                output_gate: task.output_gates.first().cloned().ok_or_else(missing_gate)?,
                task: Arc::clone(&task.task),
            });
        }

        let chain = Arc::new(RuntimeChain::new(head_id.clone(), links)?);
        head_gate.enqueue_action(QosAction::EstablishChain(Arc::clone(&chain)));
        Ok(DispatchOutcome::ChainEnqueued(chain))
    }
}
