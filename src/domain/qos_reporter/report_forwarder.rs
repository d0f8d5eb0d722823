use crossbeam::channel::{Receiver, Sender, unbounded};

use crate::domain::qos_reporter::statistics::{QosSample, TimestampedSample};

/// Local forwarding point for completed samples.
///
/// Transport to the managers is the forwarder's business. The aggregation interval is
/// the minimum time a reporter waits between two reports.
pub trait ReportForwarder: std::fmt::Debug + Send + Sync {
    fn aggregation_interval_ms(&self) -> i64;

    fn forward(&self, sample: QosSample, timestamp_ms: i64);
}

/// Forwards samples into an unbounded channel, e.g. to a thread batching them per manager.
#[derive(Debug, Clone)]
pub struct ChannelReportForwarder {
    aggregation_interval_ms: i64,
    sender: Sender<TimestampedSample>,
}

impl ChannelReportForwarder {
    pub fn new(aggregation_interval_ms: i64) -> (Self, Receiver<TimestampedSample>) {
        let (sender, receiver) = unbounded();
        (ChannelReportForwarder { aggregation_interval_ms, sender }, receiver)
    }
}

impl ReportForwarder for ChannelReportForwarder {
    fn aggregation_interval_ms(&self) -> i64 {
        self.aggregation_interval_ms
    }

    fn forward(&self, sample: QosSample, timestamp_ms: i64) {
        if self.sender.send(TimestampedSample { timestamp_ms, sample }).is_err() {
            log::warn!("Dropping QoS sample, nobody is receiving reports anymore");
        }
    }
}
