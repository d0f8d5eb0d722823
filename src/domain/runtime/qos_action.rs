use std::fmt;
use std::sync::Arc;

use crate::domain::message::qos_message::{LimitBufferSizeAction, SetOutputBufferLifetimeTargetAction};
use crate::domain::runtime::chain::RuntimeChain;

/// Control action queued on a [`StreamOutputGate`](crate::domain::runtime::stream_output_gate::StreamOutputGate).
pub enum QosAction<T> {
    LimitBufferSize(LimitBufferSizeAction),
    SetOutputBufferLifetimeTarget(SetOutputBufferLifetimeTargetAction),
    EstablishChain(Arc<RuntimeChain<T>>),
    DropChain,
}

impl<T> fmt::Debug for QosAction<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QosAction::LimitBufferSize(action) => write!(f, "LimitBufferSize({}, {})", action.source_channel_id(), action.buffer_size()),
            QosAction::SetOutputBufferLifetimeTarget(action) => write!(f, "SetOutputBufferLifetimeTarget({}, {}ms)", action.source_channel_id(), action.target_lifetime_ms()),
            QosAction::EstablishChain(chain) => write!(f, "EstablishChain({})", chain.chain_id()),
            QosAction::DropChain => write!(f, "DropChain"),
        }
    }
}
