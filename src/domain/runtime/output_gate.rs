use bimap::BiMap;

use crate::domain::qos_model::id::{ChannelId, GateId};
use crate::domain::runtime::channel::OutputChannel;
use crate::error::{Error, Result};

/// The gate a [`StreamOutputGate`](crate::domain::runtime::stream_output_gate::StreamOutputGate) wraps.
pub trait OutputGate<T>: Send {
    fn gate_id(&self) -> &GateId;

    fn number_of_channels(&self) -> usize;

    fn channel_index(&self, channel_id: &ChannelId) -> Option<usize>;

    fn write_record(&mut self, record: T, channel_index: usize) -> Result<()>;

    fn flush(&mut self) -> Result<()>;

    fn set_output_buffer_lifetime_target(&mut self, channel_index: usize, target_ms: i32) -> Result<()>;
}

/// Output gate over a list of channels, addressable by index or channel id.
pub struct ChannelOutputGate<T> {
    gate_id: GateId,
    channels: Vec<Box<dyn OutputChannel<T>>>,
    channel_indices: BiMap<ChannelId, usize>,
}

impl<T> ChannelOutputGate<T> {
    pub fn new(gate_id: GateId) -> Self {
        ChannelOutputGate { gate_id, channels: Vec::new(), channel_indices: BiMap::new() }
    }

    /// Returns the index of the new channel.
    pub fn add_channel(&mut self, channel: Box<dyn OutputChannel<T>>) -> Result<usize> {
        let channel_id = channel.channel_id().clone();
        if self.channel_indices.contains_left(&channel_id) {
            return Err(Error::GateError(format!("Channel {} is already connected to gate {}", channel_id, self.gate_id)));
        }
        let index = self.channels.len();
        self.channels.push(channel);
        self.channel_indices.insert(channel_id, index);
        Ok(index)
    }

    pub fn channel_id(&self, index: usize) -> Option<&ChannelId> {
        self.channel_indices.get_by_right(&index)
    }

    fn channel_mut(&mut self, index: usize) -> Result<&mut Box<dyn OutputChannel<T>>> {
        let gate_id = &self.gate_id;
        self.channels.get_mut(index).ok_or_else(|| Error::GateError(format!("Gate {} has no channel {}", gate_id, index)))
    }
}

impl<T: Send> OutputGate<T> for ChannelOutputGate<T> {
    fn gate_id(&self) -> &GateId {
        &self.gate_id
    }

    fn number_of_channels(&self) -> usize {
        self.channels.len()
    }

    fn channel_index(&self, channel_id: &ChannelId) -> Option<usize> {
        self.channel_indices.get_by_left(channel_id).copied()
    }

    fn write_record(&mut self, record: T, channel_index: usize) -> Result<()> {
        self.channel_mut(channel_index)?.write_record(record)
    }

    fn flush(&mut self) -> Result<()> {
        for channel in &mut self.channels {
            channel.flush()?;
        }
        Ok(())
    }

    fn set_output_buffer_lifetime_target(&mut self, channel_index: usize, target_ms: i32) -> Result<()> {
        self.channel_mut(channel_index)?.set_output_buffer_lifetime_target(target_ms);
        Ok(())
    }
}
