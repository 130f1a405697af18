//! The one-time handshake that opens every peer wire stream.
//!
//! Unlike every later message the handshake carries no length prefix; its
//! size is implied by the leading `pstrlen` byte:
//!
//! ```text
//! [pstrlen(1)] [pstr(pstrlen)] [reserved(8)] [info_hash(20)] [peer_id(20)]
//! ```
//!
//! Total size is therefore `49 + pstrlen`.

use crate::config::PROTOCOL_STRING;
use crate::core::frame::HANDSHAKE_FIXED_LEN;
use crate::error::DecodeError;
use bytes::{BufMut, Bytes, BytesMut};
use std::fmt;
use std::str::FromStr;

/// Length of the info hash and peer id fields.
pub const ID_LEN: usize = 20;

/// Length of the reserved extension bits.
pub const RESERVED_LEN: usize = 8;

/// Fixed 20-byte identifier of the shared resource.
///
/// Renders as lowercase hex, which is the stable textual identifier used in
/// logs and lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InfoHash(pub [u8; ID_LEN]);

impl InfoHash {
    pub fn as_bytes(&self) -> &[u8; ID_LEN] {
        &self.0
    }

    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let array: [u8; ID_LEN] = bytes.try_into().ok()?;
        Some(Self(array))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for InfoHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for InfoHash {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut out = [0u8; ID_LEN];
        hex::decode_to_slice(s, &mut out)?;
        Ok(Self(out))
    }
}

impl From<[u8; ID_LEN]> for InfoHash {
    fn from(bytes: [u8; ID_LEN]) -> Self {
        Self(bytes)
    }
}

/// Fixed 20-byte identifier of a peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PeerId(pub [u8; ID_LEN]);

impl PeerId {
    pub fn as_bytes(&self) -> &[u8; ID_LEN] {
        &self.0
    }

    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let array: [u8; ID_LEN] = bytes.try_into().ok()?;
        Some(Self(array))
    }

    /// Build a peer id from text, truncating or zero-padding to 20 bytes.
    pub fn from_text(text: &str) -> Self {
        let mut out = [0u8; ID_LEN];
        let len = text.len().min(ID_LEN);
        out[..len].copy_from_slice(&text.as_bytes()[..len]);
        Self(out)
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.0))
    }
}

impl From<[u8; ID_LEN]> for PeerId {
    fn from(bytes: [u8; ID_LEN]) -> Self {
        Self(bytes)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handshake {
    pstr: Bytes,
    pub reserved: [u8; RESERVED_LEN],
    pub info_hash: InfoHash,
    pub peer_id: PeerId,
}

impl Handshake {
    /// Handshake with the standard protocol string and no reserved bits set.
    pub fn new(info_hash: impl Into<InfoHash>, peer_id: impl Into<PeerId>) -> Self {
        Self {
            pstr: Bytes::from_static(PROTOCOL_STRING.as_bytes()),
            reserved: [0u8; RESERVED_LEN],
            info_hash: info_hash.into(),
            peer_id: peer_id.into(),
        }
    }

    /// Replace the protocol string. Returns `None` if it does not fit in a
    /// one-byte length.
    pub fn with_protocol(mut self, pstr: impl Into<Bytes>) -> Option<Self> {
        let pstr = pstr.into();
        if pstr.len() > u8::MAX as usize {
            return None;
        }
        self.pstr = pstr;
        Some(self)
    }

    pub fn protocol(&self) -> &[u8] {
        &self.pstr
    }

    pub fn pstrlen(&self) -> u8 {
        self.pstr.len() as u8
    }

    /// Size on the wire: `49 + pstrlen`.
    pub fn encoded_len(&self) -> usize {
        HANDSHAKE_FIXED_LEN + self.pstr.len()
    }

    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        self.encode_into(&mut buf);
        buf.freeze()
    }

    pub fn encode_into(&self, buf: &mut BytesMut) {
        buf.reserve(self.encoded_len());
        buf.put_u8(self.pstrlen());
        buf.put_slice(&self.pstr);
        buf.put_slice(&self.reserved);
        buf.put_slice(&self.info_hash.0);
        buf.put_slice(&self.peer_id.0);
    }

    /// Decode a handshake from the front of `data`.
    ///
    /// `data` must hold at least `pstrlen + 49` bytes; anything past that is
    /// not examined.
    pub fn decode(data: &[u8]) -> Result<Self, DecodeError> {
        let Some(&pstrlen) = data.first() else {
            return Err(DecodeError::InvalidLength {
                expected: HANDSHAKE_FIXED_LEN,
                actual: 0,
            });
        };

        let pstrlen = pstrlen as usize;
        let expected = pstrlen + HANDSHAKE_FIXED_LEN;
        if data.len() < expected {
            return Err(DecodeError::InvalidLength {
                expected,
                actual: data.len(),
            });
        }

        let reserved_at = 1 + pstrlen;
        let info_hash_at = reserved_at + RESERVED_LEN;
        let peer_id_at = info_hash_at + ID_LEN;

        let mut reserved = [0u8; RESERVED_LEN];
        reserved.copy_from_slice(&data[reserved_at..info_hash_at]);

        let mut info_hash = [0u8; ID_LEN];
        info_hash.copy_from_slice(&data[info_hash_at..peer_id_at]);

        let mut peer_id = [0u8; ID_LEN];
        peer_id.copy_from_slice(&data[peer_id_at..peer_id_at + ID_LEN]);

        Ok(Self {
            pstr: Bytes::copy_from_slice(&data[1..reserved_at]),
            reserved,
            info_hash: InfoHash(info_hash),
            peer_id: PeerId(peer_id),
        })
    }
}
