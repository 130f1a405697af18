use bytes::Bytes;

/// Raw piece-availability bits carried by a Bitfield message.
///
/// Bit `i` is piece `i`, numbered from the high bit of the first byte. The
/// wire payload is exactly [`Bitfield::as_bytes`]; no piece count travels with
/// it, so spare trailing bits are kept as received.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Bitfield {
    bits: Vec<u8>,
}

impl Bitfield {
    /// An all-clear bitfield large enough for `piece_count` pieces.
    pub fn with_piece_count(piece_count: usize) -> Self {
        Self {
            bits: vec![0; piece_count.div_ceil(8)],
        }
    }

    pub fn from_bytes(bytes: impl AsRef<[u8]>) -> Self {
        Self {
            bits: bytes.as_ref().to_vec(),
        }
    }

    pub fn has_piece(&self, index: usize) -> bool {
        match self.bits.get(index / 8) {
            Some(byte) => (byte >> (7 - index % 8)) & 1 == 1,
            None => false,
        }
    }

    /// Set the bit for `index`. Indices past the end are ignored.
    pub fn set_piece(&mut self, index: usize) {
        if let Some(byte) = self.bits.get_mut(index / 8) {
            *byte |= 1 << (7 - index % 8);
        }
    }

    pub fn clear_piece(&mut self, index: usize) {
        if let Some(byte) = self.bits.get_mut(index / 8) {
            *byte &= !(1 << (7 - index % 8));
        }
    }

    /// Number of set bits.
    pub fn count(&self) -> usize {
        self.bits.iter().map(|b| b.count_ones() as usize).sum()
    }

    /// Number of addressable bits (8 per byte).
    pub fn capacity(&self) -> usize {
        self.bits.len() * 8
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bits
    }

    pub fn to_bytes(&self) -> Bytes {
        Bytes::copy_from_slice(&self.bits)
    }

    /// Byte length on the wire.
    pub fn len(&self) -> usize {
        self.bits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }
}

impl From<Vec<u8>> for Bitfield {
    fn from(bits: Vec<u8>) -> Self {
        Self { bits }
    }
}
