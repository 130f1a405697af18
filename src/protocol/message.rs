//! Message variants and their binary layouts.
//!
//! Every message after the handshake is a frame `[length(4)] [id(1)] [payload]`,
//! except the keep-alive which is a bare zero length. Encoding always derives
//! the length prefix from the payload being written.
//!
//! | id | message        | payload                         |
//! |----|----------------|---------------------------------|
//! | 0  | Choke          | -                               |
//! | 1  | Unchoke        | -                               |
//! | 2  | Interested     | -                               |
//! | 3  | NotInterested  | -                               |
//! | 4  | Have           | piece index (i32)               |
//! | 5  | Bitfield       | raw bits                        |
//! | 6  | Request        | index, begin, length (i32 x 3)  |
//! | 7  | Piece          | index, begin (i32 x 2), block   |
//! | 8  | Cancel         | index, begin, length (i32 x 3)  |
//! | 9  | Port           | listen port (i16)               |
//!
//! Any other id decodes to [`Message::Unknown`] carrying the raw payload.

use crate::core::frame::{FrameHeader, LENGTH_PREFIX_LEN};
use crate::error::DecodeError;
use crate::protocol::bitfield::Bitfield;
use crate::protocol::dispatcher::EventRouter;
use crate::protocol::handshake::Handshake;
use bytes::{BufMut, Bytes, BytesMut};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageId {
    Choke = 0,
    Unchoke = 1,
    Interested = 2,
    NotInterested = 3,
    Have = 4,
    Bitfield = 5,
    Request = 6,
    Piece = 7,
    Cancel = 8,
    Port = 9,
}

impl MessageId {
    pub const ALL: [MessageId; 10] = [
        MessageId::Choke,
        MessageId::Unchoke,
        MessageId::Interested,
        MessageId::NotInterested,
        MessageId::Have,
        MessageId::Bitfield,
        MessageId::Request,
        MessageId::Piece,
        MessageId::Cancel,
        MessageId::Port,
    ];

    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for MessageId {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        MessageId::ALL.get(value as usize).copied().ok_or(value)
    }
}

/// Index/begin/length triple shared by Request and Cancel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockRequest {
    pub index: i32,
    pub begin: i32,
    pub length: i32,
}

impl BlockRequest {
    pub const ENCODED_LEN: usize = 12;

    pub fn new(index: i32, begin: i32, length: i32) -> Self {
        Self {
            index,
            begin,
            length,
        }
    }

    fn put(&self, buf: &mut BytesMut) {
        buf.put_i32(self.index);
        buf.put_i32(self.begin);
        buf.put_i32(self.length);
    }

    fn read(payload: &[u8]) -> Result<Self, DecodeError> {
        expect_len(payload, Self::ENCODED_LEN)?;
        Ok(Self {
            index: read_i32(payload, 0),
            begin: read_i32(payload, 4),
            length: read_i32(payload, 8),
        })
    }
}

/// A delivered sub-range of a piece.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub index: i32,
    pub begin: i32,
    pub data: Bytes,
}

impl Block {
    /// index + begin
    pub const PREFIX_LEN: usize = 8;

    pub fn new(index: i32, begin: i32, data: impl Into<Bytes>) -> Self {
        Self {
            index,
            begin,
            data: data.into(),
        }
    }
}

/// Every message that can appear on a peer wire stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Handshake(Handshake),
    KeepAlive,
    Choke,
    Unchoke,
    Interested,
    NotInterested,
    Have { piece_index: i32 },
    Bitfield(Bitfield),
    Request(BlockRequest),
    Piece(Block),
    Cancel(BlockRequest),
    Port { listen_port: i16 },
    /// A tagged frame whose id has no known layout.
    ///
    /// Only meaningful for ids outside [`MessageId::ALL`]: a known id written
    /// this way decodes back as that id's message, or fails its length check.
    /// Build it with [`Message::unknown`] to have that enforced.
    Unknown { id: u8, payload: Bytes },
}

impl Message {
    /// An [`Message::Unknown`] frame, or `None` if `id` has a known layout.
    pub fn unknown(id: u8, payload: impl Into<Bytes>) -> Option<Self> {
        if MessageId::try_from(id).is_ok() {
            return None;
        }
        Some(Message::Unknown {
            id,
            payload: payload.into(),
        })
    }

    /// Wire id of a tagged message.
    pub fn id(&self) -> Option<u8> {
        let id = match self {
            Message::Handshake(_) | Message::KeepAlive => return None,
            Message::Choke => MessageId::Choke,
            Message::Unchoke => MessageId::Unchoke,
            Message::Interested => MessageId::Interested,
            Message::NotInterested => MessageId::NotInterested,
            Message::Have { .. } => MessageId::Have,
            Message::Bitfield(_) => MessageId::Bitfield,
            Message::Request(_) => MessageId::Request,
            Message::Piece(_) => MessageId::Piece,
            Message::Cancel(_) => MessageId::Cancel,
            Message::Port { .. } => MessageId::Port,
            Message::Unknown { id, .. } => return Some(*id),
        };
        Some(id.as_u8())
    }

    fn payload_len(&self) -> usize {
        match self {
            Message::Handshake(_)
            | Message::KeepAlive
            | Message::Choke
            | Message::Unchoke
            | Message::Interested
            | Message::NotInterested => 0,
            Message::Have { .. } => 4,
            Message::Bitfield(bits) => bits.len(),
            Message::Request(_) | Message::Cancel(_) => BlockRequest::ENCODED_LEN,
            Message::Piece(block) => Block::PREFIX_LEN + block.data.len(),
            Message::Port { .. } => 2,
            Message::Unknown { payload, .. } => payload.len(),
        }
    }

    /// Total bytes this message occupies on the wire.
    pub fn encoded_len(&self) -> usize {
        match self {
            Message::Handshake(hs) => hs.encoded_len(),
            Message::KeepAlive => LENGTH_PREFIX_LEN,
            _ => LENGTH_PREFIX_LEN + 1 + self.payload_len(),
        }
    }

    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        self.encode_into(&mut buf);
        buf.freeze()
    }

    pub fn encode_into(&self, buf: &mut BytesMut) {
        buf.reserve(self.encoded_len());

        let id = match (self, self.id()) {
            (Message::Handshake(hs), _) => return hs.encode_into(buf),
            (_, Some(id)) => id,
            (_, None) => return FrameHeader::keep_alive().put(buf),
        };
        FrameHeader::tagged(id, self.payload_len()).put(buf);

        match self {
            Message::Have { piece_index } => buf.put_i32(*piece_index),
            Message::Bitfield(bits) => buf.put_slice(bits.as_bytes()),
            Message::Request(req) | Message::Cancel(req) => req.put(buf),
            Message::Piece(block) => {
                buf.put_i32(block.index);
                buf.put_i32(block.begin);
                buf.put_slice(&block.data);
            }
            Message::Port { listen_port } => buf.put_i16(*listen_port),
            Message::Unknown { payload, .. } => buf.put_slice(payload),
            _ => {}
        }
    }

    /// Decode one complete length-prefixed frame as whatever its tag says.
    ///
    /// Unrecognized ids produce [`Message::Unknown`]; this path never returns
    /// [`DecodeError::IdMismatch`].
    pub fn decode(frame: &[u8]) -> Result<Self, DecodeError> {
        let header = FrameHeader::parse(frame)?;
        match header.id {
            None => Ok(Message::KeepAlive),
            Some(id) => EventRouter::decode_payload(id, header.payload(frame)),
        }
    }

    /// Decode one complete frame, requiring it to carry `expected`'s tag.
    pub fn decode_as(expected: MessageId, frame: &[u8]) -> Result<Self, DecodeError> {
        let header = FrameHeader::parse(frame)?;
        let actual = header.id.ok_or(DecodeError::EmptyFrame)?;
        if actual != expected.as_u8() {
            return Err(DecodeError::IdMismatch {
                expected: expected.as_u8(),
                actual,
            });
        }
        EventRouter::decode_payload(actual, header.payload(frame))
    }

    /// Decode a handshake from the start of a stream.
    pub fn decode_handshake(data: &[u8]) -> Result<Self, DecodeError> {
        Handshake::decode(data).map(Message::Handshake)
    }
}

impl From<Handshake> for Message {
    fn from(hs: Handshake) -> Self {
        Message::Handshake(hs)
    }
}

#[inline]
fn read_i32(payload: &[u8], at: usize) -> i32 {
    i32::from_be_bytes([payload[at], payload[at + 1], payload[at + 2], payload[at + 3]])
}

/// Fixed-size payloads must match their layout exactly.
fn expect_len(payload: &[u8], expected: usize) -> Result<(), DecodeError> {
    if payload.len() != expected {
        return Err(DecodeError::InvalidLength {
            expected: LENGTH_PREFIX_LEN + 1 + expected,
            actual: LENGTH_PREFIX_LEN + 1 + payload.len(),
        });
    }
    Ok(())
}

// Per-variant payload decoders. `payload` is the frame body after the id byte.

pub(crate) fn decode_choke(payload: &[u8]) -> Result<Message, DecodeError> {
    expect_len(payload, 0).map(|_| Message::Choke)
}

pub(crate) fn decode_unchoke(payload: &[u8]) -> Result<Message, DecodeError> {
    expect_len(payload, 0).map(|_| Message::Unchoke)
}

pub(crate) fn decode_interested(payload: &[u8]) -> Result<Message, DecodeError> {
    expect_len(payload, 0).map(|_| Message::Interested)
}

pub(crate) fn decode_not_interested(payload: &[u8]) -> Result<Message, DecodeError> {
    expect_len(payload, 0).map(|_| Message::NotInterested)
}

pub(crate) fn decode_have(payload: &[u8]) -> Result<Message, DecodeError> {
    expect_len(payload, 4)?;
    Ok(Message::Have {
        piece_index: read_i32(payload, 0),
    })
}

pub(crate) fn decode_bitfield(payload: &[u8]) -> Result<Message, DecodeError> {
    Ok(Message::Bitfield(Bitfield::from_bytes(payload)))
}

pub(crate) fn decode_request(payload: &[u8]) -> Result<Message, DecodeError> {
    BlockRequest::read(payload).map(Message::Request)
}

pub(crate) fn decode_piece(payload: &[u8]) -> Result<Message, DecodeError> {
    if payload.len() < Block::PREFIX_LEN {
        return Err(DecodeError::InvalidLength {
            expected: LENGTH_PREFIX_LEN + 1 + Block::PREFIX_LEN,
            actual: LENGTH_PREFIX_LEN + 1 + payload.len(),
        });
    }
    Ok(Message::Piece(Block {
        index: read_i32(payload, 0),
        begin: read_i32(payload, 4),
        data: Bytes::copy_from_slice(&payload[Block::PREFIX_LEN..]),
    }))
}

pub(crate) fn decode_cancel(payload: &[u8]) -> Result<Message, DecodeError> {
    BlockRequest::read(payload).map(Message::Cancel)
}

pub(crate) fn decode_port(payload: &[u8]) -> Result<Message, DecodeError> {
    expect_len(payload, 2)?;
    Ok(Message::Port {
        listen_port: i16::from_be_bytes([payload[0], payload[1]]),
    })
}

pub(crate) fn decode_unknown(id: u8, payload: &[u8]) -> Message {
    Message::Unknown {
        id,
        payload: Bytes::copy_from_slice(payload),
    }
}
