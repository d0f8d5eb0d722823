use crossbeam::channel::unbounded;
use std::sync::Arc;
use std::time::Duration;

use stream_qos::domain::clock::clock_mock::MockClock;
use stream_qos::domain::message::qos_message::SetOutputBufferLifetimeTargetAction;
use stream_qos::domain::qos_model::id::{ChannelId, ExecutionVertexId, GateId};
use stream_qos::domain::runtime::channel::BufferedOutputChannel;
use stream_qos::domain::runtime::channel_selector::BroadcastSelector;
use stream_qos::domain::runtime::output_gate::ChannelOutputGate;
use stream_qos::domain::runtime::qos_action::QosAction;
use stream_qos::domain::runtime::stream_output_gate::StreamOutputGate;

// Runs alone in this binary: the captured logger is process wide.
#[test]
fn test_unknown_channel_is_logged_and_skipped() {
    let mut logger = logtest::Logger::start();

    let (sender, receiver) = unbounded();
    let mut inner = ChannelOutputGate::new(GateId::new("v/out0"));
    inner.add_channel(Box::new(BufferedOutputChannel::new(ChannelId::new("known"), sender, Arc::new(MockClock::new(0)), 1))).unwrap();
    let gate: StreamOutputGate<u32> = StreamOutputGate::new(0, Box::new(inner), Box::new(BroadcastSelector), Duration::from_secs(1));

    let action = SetOutputBufferLifetimeTargetAction::new(ExecutionVertexId::new("v"), GateId::new("v/out0"), ChannelId::new("unknown"), 10).unwrap();
    gate.enqueue_action(QosAction::SetOutputBufferLifetimeTarget(action));
    gate.write_record(7).unwrap();
    gate.write_record(8).unwrap();

    assert_eq!(receiver.try_iter().collect::<Vec<_>>(), vec![7, 8]);
    let mut warnings = Vec::new();
    while let Some(record) = logger.pop() {
        if record.level() == log::Level::Warn {
            warnings.push(record.args().to_string());
        }
    }
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].contains("unknown"));
}
