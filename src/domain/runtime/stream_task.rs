use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::domain::qos_model::id::ExecutionVertexId;
use crate::domain::runtime::chain::ChainedTask;
use crate::domain::runtime::stream_input_gate::StreamInputGate;
use crate::domain::runtime::stream_output_gate::StreamOutputGate;
use crate::error::Result;

/// A task with one input and one output gate, driven by its own thread.
pub struct StreamTask<T> {
    vertex_id: ExecutionVertexId,
    input_gate: Arc<StreamInputGate<T>>,
    output_gate: Arc<StreamOutputGate<T>>,
    task: Arc<dyn ChainedTask<T>>,
}

impl<T: Clone + Send + 'static> StreamTask<T> {
    pub fn new(vertex_id: ExecutionVertexId, input_gate: Arc<StreamInputGate<T>>, output_gate: Arc<StreamOutputGate<T>>, task: Arc<dyn ChainedTask<T>>) -> Self {
        StreamTask { vertex_id, input_gate, output_gate, task }
    }

    pub fn vertex_id(&self) -> &ExecutionVertexId {
        &self.vertex_id
    }

    /// Processes records until the input is exhausted, then flushes. Returns the number of
    /// records read. Queued QoS actions run after each record written to the output gate.
    pub fn run(&self) -> Result<u64> {
        let mut processed = 0;
        let mut output = Vec::new();
        while let Some(record) = self.input_gate.read_record() {
            processed += 1;
            self.task.process_record(record, &mut output);
            for record in output.drain(..) {
                self.output_gate.write_record(record)?;
            }
        }
        self.output_gate.flush()?;
        log::debug!("Task {} finished after {} records", self.vertex_id, processed);
        Ok(processed)
    }

    pub fn spawn(self) -> Result<JoinHandle<Result<u64>>> {
        let handle = thread::Builder::new().name(format!("Task-{}", self.vertex_id)).spawn(move || {
            let result = self.run();
            if let Err(e) = &result {
                log::error!("Task {} failed: {}", self.vertex_id, e);
            }
            result
        })?;
        Ok(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::message::qos_message::LimitBufferSizeAction;
    use crate::domain::qos_model::id::{ChannelId, GateId};
    use crate::domain::runtime::channel_selector::BroadcastSelector;
    use crate::domain::runtime::output_gate::ChannelOutputGate;
    use crate::domain::runtime::qos_action::QosAction;
    use crossbeam::channel::unbounded;
    use std::time::Duration;

    fn even_only_task(records: &[u32]) -> (StreamTask<u32>, Arc<StreamOutputGate<u32>>) {
        let (sender, receiver) = unbounded();
        for &record in records {
            sender.send(record).unwrap();
        }
        drop(sender);

        let input = Arc::new(StreamInputGate::new(0, GateId::new("t/in0"), receiver, Duration::from_millis(5)));
        let output = Arc::new(StreamOutputGate::new(0, Box::new(ChannelOutputGate::new(GateId::new("t/out0"))), Box::new(BroadcastSelector), Duration::from_millis(100)));
        let filter: Arc<dyn ChainedTask<u32>> = Arc::new(|record: u32, output: &mut Vec<u32>| {
            if record % 2 == 0 {
                output.push(record);
            }
        });
        (StreamTask::new(ExecutionVertexId::new("t"), input, Arc::clone(&output), filter), output)
    }

    fn limit_buffer_size() -> QosAction<u32> {
        QosAction::LimitBufferSize(LimitBufferSizeAction::new(ExecutionVertexId::new("t"), GateId::new("t/out0"), ChannelId::new("c0"), 64).unwrap())
    }

    #[test]
    fn test_actions_wait_while_nothing_is_written() {
        let (task, output) = even_only_task(&[1, 3, 5]);
        output.enqueue_action(limit_buffer_size());

        assert_eq!(task.run().unwrap(), 3);
        assert_eq!(output.pending_actions(), 1);
    }

    #[test]
    fn test_actions_run_after_a_write() {
        let (task, output) = even_only_task(&[1, 2]);
        output.enqueue_action(limit_buffer_size());

        assert_eq!(task.run().unwrap(), 2);
        assert_eq!(output.pending_actions(), 0);
    }
}
