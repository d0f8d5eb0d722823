use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::domain::qos_model::id::{ChainId, ExecutionVertexId};
use crate::domain::runtime::stream_input_gate::StreamInputGate;
use crate::domain::runtime::stream_output_gate::StreamOutputGate;
use crate::error::{Error, Result};

/// User code of a task. Emitted records are pushed to `output`.
pub trait ChainedTask<T>: Send + Sync {
    fn process_record(&self, record: T, output: &mut Vec<T>);
}

impl<T, F> ChainedTask<T> for F
where
    F: Fn(T, &mut Vec<T>) + Send + Sync,
{
    fn process_record(&self, record: T, output: &mut Vec<T>) {
        self(record, output)
    }
}

/// A task whose thread is bypassed while it is part of a chain.
pub struct ChainLink<T> {
    pub vertex_id: ExecutionVertexId,
    pub input_gate: Arc<StreamInputGate<T>>,
    pub output_gate: Arc<StreamOutputGate<T>>,
    pub task: Arc<dyn ChainedTask<T>>,
}

impl<T> Clone for ChainLink<T> {
    fn clone(&self) -> Self {
        ChainLink {
            vertex_id: self.vertex_id.clone(),
            input_gate: Arc::clone(&self.input_gate),
            output_gate: Arc::clone(&self.output_gate),
            task: Arc::clone(&self.task),
        }
    }
}

/// Tasks executed on the head task's thread.
///
/// The head writes its records into the first link; every link runs its task inline and hands
/// the output to the next link. Records leaving the last link go to its regular output gate.
pub struct RuntimeChain<T> {
    chain_id: ChainId,
    head_vertex_id: ExecutionVertexId,
    links: Vec<ChainLink<T>>,
    chained: Mutex<bool>,
    chained_signal: Condvar,
}

impl<T> RuntimeChain<T> {
    pub fn new(head_vertex_id: ExecutionVertexId, links: Vec<ChainLink<T>>) -> Result<Self> {
        if links.is_empty() {
            return Err(Error::InvalidArgument(format!("Chain headed by {} has no chained tasks", head_vertex_id)));
        }
        if links.iter().any(|link| link.vertex_id == head_vertex_id) {
            return Err(Error::InvalidArgument(format!("Chain headed by {} contains its head twice", head_vertex_id)));
        }
        Ok(RuntimeChain {
            chain_id: ChainId::random(),
            head_vertex_id,
            links,
            chained: Mutex::new(false),
            chained_signal: Condvar::new(),
        })
    }

    pub fn chain_id(&self) -> &ChainId {
        &self.chain_id
    }

    pub fn head_vertex_id(&self) -> &ExecutionVertexId {
        &self.head_vertex_id
    }

    pub fn links(&self) -> &[ChainLink<T>] {
        &self.links
    }

    pub fn vertex_ids(&self) -> Vec<ExecutionVertexId> {
        std::iter::once(self.head_vertex_id.clone()).chain(self.links.iter().map(|link| link.vertex_id.clone())).collect()
    }

    pub fn contains_link(&self, vertex_id: &ExecutionVertexId) -> bool {
        self.links.iter().any(|link| &link.vertex_id == vertex_id)
    }

    pub fn wake_links(&self) {
        for link in &self.links {
            link.input_gate.wake_task_thread();
        }
    }

    /// Wakes every link that `successor` does not take over.
    pub fn wake_links_not_in(&self, successor: &RuntimeChain<T>) {
        for link in self.links.iter().filter(|link| !successor.contains_link(&link.vertex_id)) {
            link.input_gate.wake_task_thread();
        }
    }

    pub(crate) fn signal_tasks_are_successfully_chained(&self) {
        let mut chained = self.chained.lock();
        *chained = true;
        self.chained_signal.notify_all();
    }

    pub fn is_chained(&self) -> bool {
        *self.chained.lock()
    }

    /// Returns false if the head did not process the chain within `timeout`.
    pub fn wait_until_chained(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut chained = self.chained.lock();
        while !*chained {
            if self.chained_signal.wait_until(&mut chained, deadline).timed_out() {
                return *chained;
            }
        }
        true
    }
}

impl<T: Clone + Send + 'static> RuntimeChain<T> {
    /// Entry point for records emitted by the head task.
    pub fn write_record(&self, record: T) -> Result<()> {
        self.write_record_from(0, record)
    }

    /// Runs `record` through the links starting at `link_index`.
    pub fn write_record_from(&self, link_index: usize, record: T) -> Result<()> {
        if link_index >= self.links.len() {
            return Err(Error::GateError(format!("Chain {} has no link {}", self.chain_id, link_index)));
        }

        let last = self.links.len() - 1;
        let mut batch = vec![record];
        for (index, link) in self.links.iter().enumerate().skip(link_index) {
            let mut output = Vec::new();
            for record in batch.drain(..) {
                link.input_gate.report_record_received();
                link.task.process_record(record, &mut output);
            }
            if index == last {
                for record in output {
                    link.output_gate.write_record(record)?;
                }
                return Ok(());
            }
            for _ in &output {
                link.output_gate.report_record_emitted();
            }
            batch = output;
        }
        Ok(())
    }
}

impl<T> fmt::Debug for RuntimeChain<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let vertices: Vec<&str> = self.links.iter().map(|link| link.vertex_id.as_str()).collect();
        write!(f, "RuntimeChain({}: {} -> {})", self.chain_id, self.head_vertex_id, vertices.join(" -> "))
    }
}
