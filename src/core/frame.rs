use crate::error::DecodeError;
use bytes::{BufMut, Bytes, BytesMut};

/// Size of the big-endian length prefix on every post-handshake frame.
pub const LENGTH_PREFIX_LEN: usize = 4;

/// Fixed part of a handshake: pstrlen(1) + reserved(8) + info_hash(20) + peer_id(20).
pub const HANDSHAKE_FIXED_LEN: usize = 49;

/// A complete unit cut from the inbound stream.
///
/// Both variants hold the full wire bytes of the unit, so a `Message` frame
/// still starts with its 4-byte length prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// The one-time handshake at the start of the stream.
    Handshake(Bytes),
    /// A length-prefixed frame (keep-alive or tagged message).
    Message(Bytes),
}

impl Frame {
    /// Raw wire bytes of this frame.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Frame::Handshake(bytes) | Frame::Message(bytes) => bytes,
        }
    }

    pub fn into_bytes(self) -> Bytes {
        match self {
            Frame::Handshake(bytes) | Frame::Message(bytes) => bytes,
        }
    }

    pub fn is_handshake(&self) -> bool {
        matches!(self, Frame::Handshake(_))
    }

    /// Declared body length, for length-prefixed frames.
    pub fn length(&self) -> Option<u32> {
        match self {
            Frame::Handshake(_) => None,
            Frame::Message(bytes) => FrameHeader::parse(bytes).ok().map(|h| h.length),
        }
    }

    /// Message id, for tagged frames. Keep-alives and handshakes have none.
    pub fn id(&self) -> Option<u8> {
        match self {
            Frame::Handshake(_) => None,
            Frame::Message(bytes) => FrameHeader::parse(bytes).ok().and_then(|h| h.id),
        }
    }
}

/// Length prefix and optional id byte shared by every post-handshake frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub length: u32,
    pub id: Option<u8>,
}

impl FrameHeader {
    /// Header for a tagged frame whose payload is `payload_len` bytes.
    pub fn tagged(id: u8, payload_len: usize) -> Self {
        Self {
            length: (1 + payload_len) as u32,
            id: Some(id),
        }
    }

    pub fn keep_alive() -> Self {
        Self {
            length: 0,
            id: None,
        }
    }

    pub fn put(&self, buf: &mut BytesMut) {
        buf.put_u32(self.length);
        if let Some(id) = self.id {
            buf.put_u8(id);
        }
    }

    /// Parse the header of a complete frame and check the body is fully present.
    ///
    /// `frame` must hold exactly one frame: the declared length has to match
    /// the bytes that follow the prefix.
    pub fn parse(frame: &[u8]) -> Result<Self, DecodeError> {
        if frame.len() < LENGTH_PREFIX_LEN {
            return Err(DecodeError::InvalidLength {
                expected: LENGTH_PREFIX_LEN,
                actual: frame.len(),
            });
        }

        let length = read_length(frame);
        let expected = LENGTH_PREFIX_LEN + length as usize;
        if frame.len() != expected {
            return Err(DecodeError::InvalidLength {
                expected,
                actual: frame.len(),
            });
        }

        let id = if length == 0 {
            None
        } else {
            Some(frame[LENGTH_PREFIX_LEN])
        };

        Ok(Self { length, id })
    }

    /// Bytes following the id byte.
    pub fn payload<'a>(&self, frame: &'a [u8]) -> &'a [u8] {
        match self.id {
            Some(_) => &frame[LENGTH_PREFIX_LEN + 1..],
            None => &[],
        }
    }
}

/// Read the big-endian length prefix. `buf` must hold at least 4 bytes.
#[inline]
pub(crate) fn read_length(buf: &[u8]) -> u32 {
    u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]])
}
