use crossbeam::channel::Sender;

use crate::domain::clock::clock::SharedClock;
use crate::domain::qos_model::id::ChannelId;
use crate::error::{Error, Result};

/// Sending end of one channel of an output gate.
pub trait OutputChannel<T>: Send {
    fn channel_id(&self) -> &ChannelId;

    fn write_record(&mut self, record: T) -> Result<()>;

    fn flush(&mut self) -> Result<()>;

    /// Maximum time a buffer may stay open before it is flushed.
    fn set_output_buffer_lifetime_target(&mut self, target_ms: i32);

    fn output_buffer_lifetime_target_ms(&self) -> Option<i32>;
}

/// Collects records into a buffer that is shipped to the receiver when it is full or
/// older than the lifetime target.
pub struct BufferedOutputChannel<T> {
    channel_id: ChannelId,
    sink: Sender<T>,
    clock: SharedClock,
    buffer: Vec<T>,
    max_records_per_buffer: usize,
    lifetime_target_ms: Option<i32>,
    buffer_opened_at_ms: Option<i64>,
    buffers_sent: u64,
}

impl<T: Send> BufferedOutputChannel<T> {
    pub fn new(channel_id: ChannelId, sink: Sender<T>, clock: SharedClock, max_records_per_buffer: usize) -> Self {
        let max_records_per_buffer = max_records_per_buffer.max(1);
        BufferedOutputChannel {
            channel_id,
            sink,
            clock,
            buffer: Vec::with_capacity(max_records_per_buffer),
            max_records_per_buffer,
            lifetime_target_ms: None,
            buffer_opened_at_ms: None,
            buffers_sent: 0,
        }
    }

    pub fn buffered_records(&self) -> usize {
        self.buffer.len()
    }

    pub fn buffers_sent(&self) -> u64 {
        self.buffers_sent
    }

    fn deadline_passed(&self) -> bool {
        match (self.lifetime_target_ms, self.buffer_opened_at_ms) {
            (Some(target), Some(opened)) => self.clock.now_millis() - opened >= i64::from(target),
            _ => false,
        }
    }
}

impl<T: Send> OutputChannel<T> for BufferedOutputChannel<T> {
    fn channel_id(&self) -> &ChannelId {
        &self.channel_id
    }

    fn write_record(&mut self, record: T) -> Result<()> {
        if self.buffer.is_empty() {
            self.buffer_opened_at_ms = Some(self.clock.now_millis());
        }
        self.buffer.push(record);

        if self.buffer.len() >= self.max_records_per_buffer || self.deadline_passed() {
            self.flush()?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        for record in self.buffer.drain(..) {
            self.sink.send(record).map_err(|_| Error::GateError(format!("Receiver of channel {} is gone", self.channel_id)))?;
        }
        self.buffer_opened_at_ms = None;
        self.buffers_sent += 1;
        Ok(())
    }

    fn set_output_buffer_lifetime_target(&mut self, target_ms: i32) {
        self.lifetime_target_ms = Some(target_ms);
    }

    fn output_buffer_lifetime_target_ms(&self) -> Option<i32> {
        self.lifetime_target_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::clock::clock_mock::MockClock;
    use crossbeam::channel::unbounded;
    use std::sync::Arc;

    #[test]
    fn test_full_buffer_is_sent() {
        let (sender, receiver) = unbounded();
        let mut channel = BufferedOutputChannel::new(ChannelId::new("c"), sender, Arc::new(MockClock::new(0)), 2);
        channel.write_record(1).unwrap();
        assert!(receiver.try_recv().is_err());
        channel.write_record(2).unwrap();
        assert_eq!(receiver.try_iter().collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(channel.buffers_sent(), 1);
    }

    #[test]
    fn test_lifetime_target_flushes_old_buffer() {
        let clock = MockClock::new(0);
        let (sender, receiver) = unbounded();
        let mut channel = BufferedOutputChannel::new(ChannelId::new("c"), sender, Arc::new(clock.clone()), 100);
        channel.set_output_buffer_lifetime_target(10);

        channel.write_record("a").unwrap();
        clock.advance(10);
        channel.write_record("b").unwrap();
        assert_eq!(receiver.try_iter().count(), 2);
        assert_eq!(channel.buffered_records(), 0);
    }
}
