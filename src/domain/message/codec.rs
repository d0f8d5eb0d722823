use bytes::{Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder, LengthDelimitedCodec};

use crate::domain::message::qos_message::QosActionMessage;
use crate::error::Error;

/// Length-delimited frames carrying one bincode encoded [`QosActionMessage`] each.
///
/// Fields are encoded in declaration order with fixed-width integers.
pub struct QosActionCodec {
    codec: LengthDelimitedCodec,
}

impl QosActionCodec {
    pub fn new() -> Self {
        Self { codec: LengthDelimitedCodec::new() }
    }
}

impl Default for QosActionCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Encoder<QosActionMessage> for QosActionCodec {
    type Error = Error;

    fn encode(&mut self, item: QosActionMessage, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let bytes = bincode::serialize(&item)?;
        self.codec.encode(Bytes::from(bytes), dst)?;
        Ok(())
    }
}

impl Decoder for QosActionCodec {
    type Item = QosActionMessage;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.codec.decode(src)? {
            Some(frame) => Ok(Some(bincode::deserialize(&frame)?)),
            None => Ok(None),
        }
    }
}
