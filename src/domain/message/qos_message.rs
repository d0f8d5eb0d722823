use serde::{Deserialize, Serialize};

use crate::domain::qos_model::id::{ChannelId, ExecutionVertexId, GateId, JobId};
use crate::error::{Error, Result};

/// Control action sent from a manager to the instance executing the targeted vertex.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "QosActionMessageFields")]
pub struct QosActionMessage {
    pub job_id: JobId,
    pub payload: QosActionPayload,
}

#[derive(Deserialize)]
struct QosActionMessageFields {
    job_id: JobId,
    payload: QosActionPayload,
}

impl TryFrom<QosActionMessageFields> for QosActionMessage {
    type Error = Error;

    fn try_from(fields: QosActionMessageFields) -> Result<Self> {
        QosActionMessage::new(fields.job_id, fields.payload)
    }
}

impl QosActionMessage {
    pub fn new(job_id: JobId, payload: QosActionPayload) -> Result<Self> {
        job_id.require("jobID")?;
        Ok(QosActionMessage { job_id, payload })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum QosActionPayload {
    LimitBufferSize(LimitBufferSizeAction),
    SetOutputBufferLifetimeTarget(SetOutputBufferLifetimeTargetAction),
    EstablishChain(EstablishChainAction),
    DropChain(DropChainAction),
}

impl QosActionPayload {
    pub fn kind(&self) -> &'static str {
        match self {
            QosActionPayload::LimitBufferSize(_) => "LimitBufferSize",
            QosActionPayload::SetOutputBufferLifetimeTarget(_) => "SetOutputBufferLifetimeTarget",
            QosActionPayload::EstablishChain(_) => "EstablishChain",
            QosActionPayload::DropChain(_) => "DropChain",
        }
    }
}

/// Limits the output buffer size of one channel. All four fields are mandatory; decoding
/// runs the same validation as [`LimitBufferSizeAction::new`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "LimitBufferSizeFields")]
pub struct LimitBufferSizeAction {
    vertex_id: ExecutionVertexId,
    output_gate_id: GateId,
    source_channel_id: ChannelId,
    buffer_size: i32,
}

#[derive(Deserialize)]
struct LimitBufferSizeFields {
    vertex_id: ExecutionVertexId,
    output_gate_id: GateId,
    source_channel_id: ChannelId,
    buffer_size: i32,
}

impl TryFrom<LimitBufferSizeFields> for LimitBufferSizeAction {
    type Error = Error;

    fn try_from(fields: LimitBufferSizeFields) -> Result<Self> {
        LimitBufferSizeAction::new(fields.vertex_id, fields.output_gate_id, fields.source_channel_id, fields.buffer_size)
    }
}

impl LimitBufferSizeAction {
    pub fn new(vertex_id: ExecutionVertexId, output_gate_id: GateId, source_channel_id: ChannelId, buffer_size: i32) -> Result<Self> {
        vertex_id.require("vertexID")?;
        output_gate_id.require("outputGateID")?;
        source_channel_id.require("sourceChannelID")?;
        if buffer_size <= 0 {
            return Err(Error::InvalidArgument(format!("Argument bufferSize must be greater than zero, got {}", buffer_size)));
        }
        Ok(LimitBufferSizeAction { vertex_id, output_gate_id, source_channel_id, buffer_size })
    }

    pub fn vertex_id(&self) -> &ExecutionVertexId {
        &self.vertex_id
    }

    pub fn output_gate_id(&self) -> &GateId {
        &self.output_gate_id
    }

    pub fn source_channel_id(&self) -> &ChannelId {
        &self.source_channel_id
    }

    pub fn buffer_size(&self) -> i32 {
        self.buffer_size
    }
}

/// Sets the flush deadline of one output channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "OutputBufferLifetimeFields")]
pub struct SetOutputBufferLifetimeTargetAction {
    vertex_id: ExecutionVertexId,
    output_gate_id: GateId,
    source_channel_id: ChannelId,
    target_lifetime_ms: i32,
}

#[derive(Deserialize)]
struct OutputBufferLifetimeFields {
    vertex_id: ExecutionVertexId,
    output_gate_id: GateId,
    source_channel_id: ChannelId,
    target_lifetime_ms: i32,
}

impl TryFrom<OutputBufferLifetimeFields> for SetOutputBufferLifetimeTargetAction {
    type Error = Error;

    fn try_from(fields: OutputBufferLifetimeFields) -> Result<Self> {
        SetOutputBufferLifetimeTargetAction::new(fields.vertex_id, fields.output_gate_id, fields.source_channel_id, fields.target_lifetime_ms)
    }
}

impl SetOutputBufferLifetimeTargetAction {
    pub fn new(vertex_id: ExecutionVertexId, output_gate_id: GateId, source_channel_id: ChannelId, target_lifetime_ms: i32) -> Result<Self> {
        vertex_id.require("vertexID")?;
        output_gate_id.require("outputGateID")?;
        source_channel_id.require("sourceChannelID")?;
        if target_lifetime_ms < 0 {
            return Err(Error::InvalidArgument(format!("Argument targetLifetime must not be negative, got {}", target_lifetime_ms)));
        }
        Ok(SetOutputBufferLifetimeTargetAction { vertex_id, output_gate_id, source_channel_id, target_lifetime_ms })
    }

    pub fn vertex_id(&self) -> &ExecutionVertexId {
        &self.vertex_id
    }

    pub fn output_gate_id(&self) -> &GateId {
        &self.output_gate_id
    }

    pub fn source_channel_id(&self) -> &ChannelId {
        &self.source_channel_id
    }

    pub fn target_lifetime_ms(&self) -> i32 {
        self.target_lifetime_ms
    }
}

/// Chains the listed vertices, head first. All of them run on the receiving instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "EstablishChainFields")]
pub struct EstablishChainAction {
    vertex_ids: Vec<ExecutionVertexId>,
}

#[derive(Deserialize)]
struct EstablishChainFields {
    vertex_ids: Vec<ExecutionVertexId>,
}

impl TryFrom<EstablishChainFields> for EstablishChainAction {
    type Error = Error;

    fn try_from(fields: EstablishChainFields) -> Result<Self> {
        EstablishChainAction::new(fields.vertex_ids)
    }
}

impl EstablishChainAction {
    pub fn new(vertex_ids: Vec<ExecutionVertexId>) -> Result<Self> {
        if vertex_ids.len() < 2 {
            return Err(Error::InvalidArgument(format!("A chain needs at least two vertices, got {}", vertex_ids.len())));
        }
        for vertex_id in &vertex_ids {
            vertex_id.require("vertexID")?;
        }
        Ok(EstablishChainAction { vertex_ids })
    }

    pub fn vertex_ids(&self) -> &[ExecutionVertexId] {
        &self.vertex_ids
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "DropChainFields")]
pub struct DropChainAction {
    vertex_id: ExecutionVertexId,
    output_gate_id: GateId,
}

#[derive(Deserialize)]
struct DropChainFields {
    vertex_id: ExecutionVertexId,
    output_gate_id: GateId,
}

impl TryFrom<DropChainFields> for DropChainAction {
    type Error = Error;

    fn try_from(fields: DropChainFields) -> Result<Self> {
        DropChainAction::new(fields.vertex_id, fields.output_gate_id)
    }
}

impl DropChainAction {
    pub fn new(vertex_id: ExecutionVertexId, output_gate_id: GateId) -> Result<Self> {
        vertex_id.require("vertexID")?;
        output_gate_id.require("outputGateID")?;
        Ok(DropChainAction { vertex_id, output_gate_id })
    }

    pub fn vertex_id(&self) -> &ExecutionVertexId {
        &self.vertex_id
    }

    pub fn output_gate_id(&self) -> &GateId {
        &self.output_gate_id
    }
}
