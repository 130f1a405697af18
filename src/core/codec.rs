use crate::config::DEFAULT_MAX_FRAME_SIZE;
use crate::core::frame::{read_length, Frame, HANDSHAKE_FIXED_LEN, LENGTH_PREFIX_LEN};
use crate::error::{constants, ProtocolError, Result};
use crate::protocol::message::Message;
use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};
use tracing::{trace, warn};

/// Framing rules for one direction of a peer wire stream.
///
/// The first frame decoded is always the handshake (sized by its leading
/// `pstrlen` byte); every frame after it is length-prefixed. The codec only
/// ever cuts a frame once all of its bytes are in `src`, so chunk boundaries
/// inside the length prefix, the id byte or the payload are all handled the
/// same way: the partial tail stays in `src` for the next call.
#[derive(Debug, Clone)]
pub struct PeerWireCodec {
    handshake_received: bool,
    max_frame_size: usize,
}

impl Default for PeerWireCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_SIZE)
    }
}

impl PeerWireCodec {
    pub fn new(max_frame_size: usize) -> Self {
        Self {
            handshake_received: false,
            max_frame_size,
        }
    }

    /// A codec for a stream whose handshake has already been consumed.
    pub fn after_handshake(max_frame_size: usize) -> Self {
        Self {
            handshake_received: true,
            max_frame_size,
        }
    }

    pub fn handshake_received(&self) -> bool {
        self.handshake_received
    }

    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }

    fn decode_handshake(&mut self, src: &mut BytesMut) -> Option<Frame> {
        let pstrlen = *src.first()? as usize;
        let total = pstrlen + HANDSHAKE_FIXED_LEN;

        if src.len() < total {
            src.reserve(total - src.len());
            return None;
        }

        self.handshake_received = true;
        trace!(bytes = total, "Handshake frame complete");
        Some(Frame::Handshake(src.split_to(total).freeze()))
    }
}

impl Decoder for PeerWireCodec {
    type Item = Frame;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>> {
        if !self.handshake_received {
            return Ok(self.decode_handshake(src));
        }

        if src.len() < LENGTH_PREFIX_LEN {
            return Ok(None);
        }

        let length = read_length(src) as usize;
        if length > self.max_frame_size {
            warn!(length, max = self.max_frame_size, "{}", constants::ERR_OVERSIZED_FRAME);
            return Err(ProtocolError::ProtocolViolation {
                length,
                max: self.max_frame_size,
            });
        }

        let total = LENGTH_PREFIX_LEN + length;
        if src.len() < total {
            src.reserve(total - src.len());
            return Ok(None);
        }

        Ok(Some(Frame::Message(src.split_to(total).freeze())))
    }
}

impl Encoder<Message> for PeerWireCodec {
    type Error = ProtocolError;

    fn encode(&mut self, item: Message, dst: &mut BytesMut) -> Result<()> {
        item.encode_into(dst);
        Ok(())
    }
}

impl Encoder<&Message> for PeerWireCodec {
    type Error = ProtocolError;

    fn encode(&mut self, item: &Message, dst: &mut BytesMut) -> Result<()> {
        item.encode_into(dst);
        Ok(())
    }
}
