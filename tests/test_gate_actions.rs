use crossbeam::channel::{Receiver, Sender, unbounded};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use stream_qos::domain::clock::clock_mock::MockClock;
use stream_qos::domain::message::qos_message::{
    DropChainAction, EstablishChainAction, LimitBufferSizeAction, QosActionMessage, QosActionPayload, SetOutputBufferLifetimeTargetAction,
};
use stream_qos::domain::qos_model::id::{ChannelId, ExecutionVertexId, GateId, JobId};
use stream_qos::domain::runtime::action_dispatcher::{DispatchOutcome, LocalTask, QosActionDispatcher};
use stream_qos::domain::runtime::chain::{ChainLink, ChainedTask, RuntimeChain};
use stream_qos::domain::runtime::channel::BufferedOutputChannel;
use stream_qos::domain::runtime::channel_selector::{ChannelSelector, RoundRobinSelector};
use stream_qos::domain::runtime::output_gate::{ChannelOutputGate, OutputGate};
use stream_qos::domain::runtime::qos_action::QosAction;
use stream_qos::domain::runtime::stream_input_gate::StreamInputGate;
use stream_qos::domain::runtime::stream_output_gate::{GateState, StreamOutputGate};
use stream_qos::domain::runtime::stream_task::StreamTask;
use stream_qos::error::{Error, Result};

const TIMEOUT: Duration = Duration::from_secs(5);
const POLL: Duration = Duration::from_millis(5);

/// Output gate that records what was done to it.
#[derive(Clone)]
struct RecordingGate {
    gate_id: GateId,
    lifetime_targets: Arc<Mutex<Vec<(usize, i32)>>>,
    written: Arc<Mutex<Vec<u32>>>,
}

impl RecordingGate {
    fn new() -> Self {
        RecordingGate { gate_id: GateId::new("recording/out0"), lifetime_targets: Arc::default(), written: Arc::default() }
    }
}

impl OutputGate<u32> for RecordingGate {
    fn gate_id(&self) -> &GateId {
        &self.gate_id
    }

    fn number_of_channels(&self) -> usize {
        2
    }

    fn channel_index(&self, channel_id: &ChannelId) -> Option<usize> {
        match channel_id.as_str() {
            "c0" => Some(0),
            "c1" => Some(1),
            _ => None,
        }
    }

    fn write_record(&mut self, record: u32, _channel_index: usize) -> Result<()> {
        self.written.lock().push(record);
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    fn set_output_buffer_lifetime_target(&mut self, channel_index: usize, target_ms: i32) -> Result<()> {
        self.lifetime_targets.lock().push((channel_index, target_ms));
        Ok(())
    }
}

fn lifetime_target(channel: &str, target_ms: i32) -> QosAction<u32> {
    QosAction::SetOutputBufferLifetimeTarget(
        SetOutputBufferLifetimeTargetAction::new(ExecutionVertexId::new("recording"), GateId::new("recording/out0"), ChannelId::new(channel), target_ms).unwrap(),
    )
}

#[test]
fn test_actions_are_applied_in_arrival_order() {
    let recording = RecordingGate::new();
    let gate: StreamOutputGate<u32> = StreamOutputGate::new(0, Box::new(recording.clone()), Box::new(RoundRobinSelector::default()), TIMEOUT);

    gate.enqueue_action(lifetime_target("c0", 5));
    gate.enqueue_action(lifetime_target("c1", 7));
    gate.enqueue_action(lifetime_target("c0", 50));
    assert!(recording.lifetime_targets.lock().is_empty());

    gate.write_record(1).unwrap();
    assert_eq!(*recording.lifetime_targets.lock(), vec![(0, 5), (1, 7), (0, 50)]);
    assert_eq!(*recording.written.lock(), vec![1]);
}

#[test]
fn test_unknown_channel_does_not_block_later_actions() {
    let recording = RecordingGate::new();
    let gate: StreamOutputGate<u32> = StreamOutputGate::new(0, Box::new(recording.clone()), Box::new(RoundRobinSelector::default()), TIMEOUT);

    gate.enqueue_action(lifetime_target("missing", 5));
    gate.enqueue_action(QosAction::LimitBufferSize(
        LimitBufferSizeAction::new(ExecutionVertexId::new("recording"), GateId::new("recording/out0"), ChannelId::new("c0"), 128).unwrap(),
    ));
    gate.enqueue_action(lifetime_target("c1", 9));

    gate.write_record(1).unwrap();
    assert_eq!(*recording.lifetime_targets.lock(), vec![(1, 9)]);
    assert_eq!(gate.pending_actions(), 0);
}

/// A -> B -> C on one instance. A is driven by the test thread, B and C by their own threads.
struct Pipeline {
    dispatcher: QosActionDispatcher<u32>,
    head: Arc<StreamOutputGate<u32>>,
    inputs: Vec<Arc<StreamInputGate<u32>>>,
    sink: Receiver<u32>,
    threads: Vec<JoinHandle<Result<u64>>>,
}

fn output_gate(vertex: &str, target: Sender<u32>) -> Arc<StreamOutputGate<u32>> {
    let mut inner = ChannelOutputGate::new(GateId::new(format!("{}/out0", vertex)));
    inner.add_channel(Box::new(BufferedOutputChannel::new(ChannelId::new(format!("{}-c0", vertex)), target, Arc::new(MockClock::new(0)), 1))).unwrap();
    Arc::new(StreamOutputGate::new(0, Box::new(inner), Box::new(RoundRobinSelector::default()), TIMEOUT))
}

fn pipeline() -> Pipeline {
    let dispatcher = QosActionDispatcher::new(JobId::new("job-1"));
    let increment: Arc<dyn ChainedTask<u32>> = Arc::new(|record: u32, output: &mut Vec<u32>| output.push(record + 1));

    let (to_b, b_receiver) = unbounded();
    let (to_c, c_receiver) = unbounded();
    let (to_sink, sink) = unbounded();

    let head = output_gate("a", to_b);
    dispatcher
        .register_task(LocalTask { vertex_id: ExecutionVertexId::new("a"), input_gates: Vec::new(), output_gates: vec![Arc::clone(&head)], task: Arc::clone(&increment) })
        .unwrap();

    let mut inputs = Vec::new();
    let mut threads = Vec::new();
    for (vertex, receiver, target) in [("b", b_receiver, to_c), ("c", c_receiver, to_sink)] {
        let input = Arc::new(StreamInputGate::new(0, GateId::new(format!("{}/in0", vertex)), receiver, POLL));
        let output = output_gate(vertex, target);
        let vertex_id = ExecutionVertexId::new(vertex);
        dispatcher
            .register_task(LocalTask { vertex_id: vertex_id.clone(), input_gates: vec![Arc::clone(&input)], output_gates: vec![Arc::clone(&output)], task: Arc::clone(&increment) })
            .unwrap();
        threads.push(StreamTask::new(vertex_id, Arc::clone(&input), output, Arc::clone(&increment)).spawn().unwrap());
        inputs.push(input);
    }

    Pipeline { dispatcher, head, inputs, sink, threads }
}

fn message(payload: QosActionPayload) -> QosActionMessage {
    QosActionMessage::new(JobId::new("job-1"), payload).unwrap()
}

fn establish_chain(pipeline: &Pipeline) -> Arc<RuntimeChain<u32>> {
    let vertices = ["a", "b", "c"].into_iter().map(ExecutionVertexId::new).collect();
    let outcome = pipeline.dispatcher.dispatch(message(QosActionPayload::EstablishChain(EstablishChainAction::new(vertices).unwrap())));
    match outcome {
        DispatchOutcome::ChainEnqueued(chain) => chain,
        other => panic!("chain not enqueued: {:?}", other),
    }
}

fn shut_down(pipeline: Pipeline) {
    let Pipeline { dispatcher, head, inputs, sink, threads } = pipeline;
    drop(dispatcher);
    drop(head);
    drop(inputs);
    for thread in threads {
        assert!(thread.join().unwrap().is_ok());
    }
    drop(sink);
}

#[test]
fn test_chain_bypasses_and_resumes_task_threads() {
    let pipeline = pipeline();
    let chain = establish_chain(&pipeline);

    pipeline.head.write_record(1).unwrap();
    assert!(chain.wait_until_chained(TIMEOUT));
    assert!(pipeline.inputs.iter().all(|input| input.is_task_thread_halted()));

    pipeline.head.write_record(10).unwrap();
    assert_eq!(pipeline.sink.recv_timeout(TIMEOUT).unwrap(), 3);
    assert_eq!(pipeline.sink.recv_timeout(TIMEOUT).unwrap(), 12);

    let drop_action = DropChainAction::new(ExecutionVertexId::new("a"), GateId::new("a/out0")).unwrap();
    assert!(matches!(pipeline.dispatcher.dispatch(message(QosActionPayload::DropChain(drop_action))), DispatchOutcome::Enqueued));
    pipeline.head.write_record(20).unwrap();
    assert_eq!(pipeline.sink.recv_timeout(TIMEOUT).unwrap(), 22);
    assert!(pipeline.head.chain().is_none());
    assert!(pipeline.inputs.iter().all(|input| !input.is_task_thread_halted()));
    assert!(pipeline.inputs.iter().all(|input| !input.wake_task_thread()));

    pipeline.head.write_record(30).unwrap();
    assert_eq!(pipeline.sink.recv_timeout(TIMEOUT).unwrap(), 32);

    drop(chain);
    shut_down(pipeline);
}

#[test]
fn test_suspend_wakes_chained_tasks() {
    let pipeline = pipeline();
    let chain = establish_chain(&pipeline);
    pipeline.head.write_record(1).unwrap();
    assert!(chain.wait_until_chained(TIMEOUT));
    assert_eq!(pipeline.sink.recv_timeout(TIMEOUT).unwrap(), 3);

    pipeline.head.request_suspend().unwrap();
    assert_eq!(pipeline.head.state(), GateState::Suspended);
    assert!(pipeline.head.chain().is_none());
    assert!(pipeline.inputs.iter().all(|input| !input.is_task_thread_halted()));

    drop(chain);
    shut_down(pipeline);
}

#[test]
fn test_chain_on_closed_gate_still_signals_completion() {
    let pipeline = pipeline();
    let chain = establish_chain(&pipeline);
    pipeline.head.request_close().unwrap();

    // A closed gate takes no records, so the chain is applied by the next explicit drain.
    pipeline.head.process_pending_actions().unwrap();
    assert!(chain.wait_until_chained(TIMEOUT));
    assert!(pipeline.head.chain().is_none());
    assert!(pipeline.inputs.iter().all(|input| !input.is_task_thread_halted()));

    drop(chain);
    shut_down(pipeline);
}

#[test]
fn test_dispatcher_skips_foreign_and_unknown_targets() {
    let pipeline = pipeline();

    let foreign = QosActionMessage::new(
        JobId::new("other-job"),
        QosActionPayload::DropChain(DropChainAction::new(ExecutionVertexId::new("a"), GateId::new("a/out0")).unwrap()),
    )
    .unwrap();
    assert!(matches!(pipeline.dispatcher.dispatch(foreign), DispatchOutcome::Skipped));

    let unknown_vertex = LimitBufferSizeAction::new(ExecutionVertexId::new("z"), GateId::new("z/out0"), ChannelId::new("z-c0"), 64).unwrap();
    assert!(matches!(pipeline.dispatcher.dispatch(message(QosActionPayload::LimitBufferSize(unknown_vertex))), DispatchOutcome::Skipped));

    let unknown_gate = LimitBufferSizeAction::new(ExecutionVertexId::new("a"), GateId::new("a/out7"), ChannelId::new("a-c0"), 64).unwrap();
    assert!(matches!(pipeline.dispatcher.dispatch(message(QosActionPayload::LimitBufferSize(unknown_gate))), DispatchOutcome::Skipped));

    let unknown_chain = EstablishChainAction::new(vec![ExecutionVertexId::new("a"), ExecutionVertexId::new("z")]).unwrap();
    assert!(matches!(pipeline.dispatcher.dispatch(message(QosActionPayload::EstablishChain(unknown_chain))), DispatchOutcome::Skipped));

    assert_eq!(pipeline.head.pending_actions(), 0);
    shut_down(pipeline);
}

/// Forwards records straight to `target`, but cannot be flushed.
struct UnflushableGate {
    gate_id: GateId,
    target: Sender<u32>,
}

impl OutputGate<u32> for UnflushableGate {
    fn gate_id(&self) -> &GateId {
        &self.gate_id
    }

    fn number_of_channels(&self) -> usize {
        1
    }

    fn channel_index(&self, _channel_id: &ChannelId) -> Option<usize> {
        None
    }

    fn write_record(&mut self, record: u32, _channel_index: usize) -> Result<()> {
        self.target.send(record).map_err(|e| Error::GateError(e.to_string()))
    }

    fn flush(&mut self) -> Result<()> {
        Err(Error::GateError("flush failed".to_string()))
    }

    fn set_output_buffer_lifetime_target(&mut self, _channel_index: usize, _target_ms: i32) -> Result<()> {
        Ok(())
    }
}

#[derive(Default)]
struct CountingSelector {
    calls: Arc<AtomicUsize>,
    inner: RoundRobinSelector,
}

impl ChannelSelector<u32> for CountingSelector {
    fn select_channels(&mut self, record: &u32, number_of_channels: usize) -> Vec<usize> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.select_channels(record, number_of_channels)
    }
}

fn increment() -> Arc<dyn ChainedTask<u32>> {
    Arc::new(|record: u32, output: &mut Vec<u32>| output.push(record + 1))
}

fn link(vertex: &str, input_gate: &Arc<StreamInputGate<u32>>, output_gate: &Arc<StreamOutputGate<u32>>) -> ChainLink<u32> {
    ChainLink { vertex_id: ExecutionVertexId::new(vertex), input_gate: Arc::clone(input_gate), output_gate: Arc::clone(output_gate), task: increment() }
}

fn spawn_task(vertex: &str, input_gate: &Arc<StreamInputGate<u32>>, output_gate: &Arc<StreamOutputGate<u32>>) -> JoinHandle<Result<u64>> {
    StreamTask::new(ExecutionVertexId::new(vertex), Arc::clone(input_gate), Arc::clone(output_gate), increment()).spawn().unwrap()
}

#[test]
fn test_failed_flush_during_chaining_wakes_halted_tasks() {
    let (to_b, b_receiver) = unbounded();
    let (to_c, c_receiver) = unbounded();
    let (to_sink, sink) = unbounded();

    let head = output_gate("a", to_b);
    let b_input = Arc::new(StreamInputGate::new(0, GateId::new("b/in0"), b_receiver, POLL));
    let b_output = output_gate("b", to_c);
    let c_input = Arc::new(StreamInputGate::new(0, GateId::new("c/in0"), c_receiver, POLL));
    let c_output: Arc<StreamOutputGate<u32>> =
        Arc::new(StreamOutputGate::new(0, Box::new(UnflushableGate { gate_id: GateId::new("c/out0"), target: to_sink }), Box::new(RoundRobinSelector::default()), TIMEOUT));
    let b_thread = spawn_task("b", &b_input, &b_output);
    let c_thread = spawn_task("c", &c_input, &c_output);

    let chain = Arc::new(RuntimeChain::new(ExecutionVertexId::new("a"), vec![link("b", &b_input, &b_output), link("c", &c_input, &c_output)]).unwrap());
    head.enqueue_action(QosAction::EstablishChain(Arc::clone(&chain)));

    assert!(matches!(head.write_record(1), Err(Error::GateError(_))));
    assert!(chain.is_chained());
    assert!(head.chain().is_none());
    assert!(!b_input.is_task_thread_halted());
    assert!(!c_input.is_task_thread_halted());

    // Both task threads keep running on their own.
    assert_eq!(sink.recv_timeout(TIMEOUT).unwrap(), 3);
    head.write_record(10).unwrap();
    assert_eq!(sink.recv_timeout(TIMEOUT).unwrap(), 12);

    drop(chain);
    drop(head);
    drop(b_output);
    drop(c_output);
    assert!(b_thread.join().unwrap().is_ok());
    assert!(matches!(c_thread.join().unwrap(), Err(Error::GateError(_))));
}

#[test]
fn test_chain_is_aborted_when_a_task_does_not_halt() {
    let (to_b, b_receiver) = unbounded();
    let (to_sink, _sink) = unbounded();

    let mut inner = ChannelOutputGate::new(GateId::new("a/out0"));
    inner.add_channel(Box::new(BufferedOutputChannel::new(ChannelId::new("a-c0"), to_b, Arc::new(MockClock::new(0)), 1))).unwrap();
    let head: StreamOutputGate<u32> = StreamOutputGate::new(0, Box::new(inner), Box::new(RoundRobinSelector::default()), Duration::from_millis(50));

    // No thread reads from b, so it never parks.
    let b_input = Arc::new(StreamInputGate::new(0, GateId::new("b/in0"), b_receiver, POLL));
    let b_output = output_gate("b", to_sink);
    let chain = Arc::new(RuntimeChain::new(ExecutionVertexId::new("a"), vec![link("b", &b_input, &b_output)]).unwrap());
    head.enqueue_action(QosAction::EstablishChain(Arc::clone(&chain)));

    assert!(matches!(head.write_record(1), Err(Error::GateError(_))));
    assert!(chain.is_chained());
    assert!(head.chain().is_none());
    assert!(!b_input.is_task_thread_halted());
    assert_eq!(b_input.drain_pending(), vec![1]);
}

#[test]
fn test_selector_runs_for_chained_records() {
    let (to_b, b_receiver) = unbounded();
    let (to_sink, sink) = unbounded();

    let calls = Arc::new(AtomicUsize::new(0));
    let mut inner = ChannelOutputGate::new(GateId::new("a/out0"));
    inner.add_channel(Box::new(BufferedOutputChannel::new(ChannelId::new("a-c0"), to_b, Arc::new(MockClock::new(0)), 1))).unwrap();
    let selector = CountingSelector { calls: Arc::clone(&calls), ..CountingSelector::default() };
    let head: StreamOutputGate<u32> = StreamOutputGate::new(0, Box::new(inner), Box::new(selector), TIMEOUT);

    let b_input = Arc::new(StreamInputGate::new(0, GateId::new("b/in0"), b_receiver, POLL));
    let b_output = output_gate("b", to_sink);
    let b_thread = spawn_task("b", &b_input, &b_output);

    let chain = Arc::new(RuntimeChain::new(ExecutionVertexId::new("a"), vec![link("b", &b_input, &b_output)]).unwrap());
    head.enqueue_action(QosAction::EstablishChain(Arc::clone(&chain)));
    head.write_record(1).unwrap();
    assert!(chain.wait_until_chained(TIMEOUT));
    assert_eq!(sink.recv_timeout(TIMEOUT).unwrap(), 2);

    head.write_record(2).unwrap();
    head.write_record(3).unwrap();
    assert_eq!(sink.recv_timeout(TIMEOUT).unwrap(), 3);
    assert_eq!(sink.recv_timeout(TIMEOUT).unwrap(), 4);
    assert_eq!(calls.load(Ordering::SeqCst), 3);

    head.drop_chain();
    drop(chain);
    drop(head);
    drop(b_output);
    assert!(b_thread.join().unwrap().is_ok());
}
