//! Incremental frame reassembly over an arbitrarily chunked byte stream.
//!
//! Chunks are appended to one pending buffer; every complete frame at the
//! front of the buffer is handed out, in arrival order, as soon as it is
//! whole. Only the genuinely incomplete tail is kept back, so a fully
//! received frame is never held behind a later frame that is still arriving.
//!
//! ```rust
//! use peer_wire::core::reassembler::FrameReassembler;
//!
//! let mut reassembler = FrameReassembler::after_handshake(1024);
//! assert_eq!(reassembler.feed(&[0, 0]).count(), 0);
//!
//! let frames: Vec<_> = reassembler.feed(&[0, 1, 0]).collect();
//! assert_eq!(frames.len(), 1);
//! assert_eq!(frames[0].as_ref().unwrap().id(), Some(0));
//! ```

use crate::core::codec::PeerWireCodec;
use crate::core::frame::Frame;
use crate::error::Result;
use bytes::BytesMut;
use tokio_util::codec::Decoder;

/// Initial capacity of the pending buffer
const INITIAL_BUFFER_CAPACITY: usize = 16 * 1024;

/// Pending-bytes buffer plus the framing rules applied to it.
#[derive(Debug)]
pub struct FrameReassembler {
    pending: BytesMut,
    codec: PeerWireCodec,
}

impl FrameReassembler {
    /// A reassembler expecting the handshake first.
    pub fn new(max_frame_size: usize) -> Self {
        Self::with_codec(PeerWireCodec::new(max_frame_size))
    }

    /// A reassembler for a stream positioned after the handshake.
    pub fn after_handshake(max_frame_size: usize) -> Self {
        Self::with_codec(PeerWireCodec::after_handshake(max_frame_size))
    }

    pub fn with_codec(codec: PeerWireCodec) -> Self {
        Self {
            pending: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            codec,
        }
    }

    /// Append a chunk to the pending buffer without extracting anything.
    pub fn push(&mut self, chunk: &[u8]) {
        self.pending.extend_from_slice(chunk);
    }

    /// Cut the next complete frame off the front of the pending buffer.
    ///
    /// Returns `Ok(None)` when the buffer holds only an incomplete tail.
    pub fn next_frame(&mut self) -> Result<Option<Frame>> {
        self.codec.decode(&mut self.pending)
    }

    /// Append `chunk` and lazily yield every frame it completes.
    pub fn feed(&mut self, chunk: &[u8]) -> Frames<'_> {
        self.push(chunk);
        self.frames()
    }

    /// Lazily yield the complete frames already buffered.
    pub fn frames(&mut self) -> Frames<'_> {
        Frames {
            reassembler: self,
            failed: false,
        }
    }

    /// Number of buffered bytes not yet part of an emitted frame.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn handshake_received(&self) -> bool {
        self.codec.handshake_received()
    }

    pub fn max_frame_size(&self) -> usize {
        self.codec.max_frame_size()
    }

    /// Drop any buffered tail.
    pub fn clear(&mut self) {
        self.pending.clear();
    }
}

/// Iterator over the frames currently extractable from a [`FrameReassembler`].
///
/// Ends at the first incomplete tail. A framing error is yielded once and
/// ends the iteration.
pub struct Frames<'a> {
    reassembler: &'a mut FrameReassembler,
    failed: bool,
}

impl Iterator for Frames<'_> {
    type Item = Result<Frame>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        match self.reassembler.next_frame() {
            Ok(Some(frame)) => Some(Ok(frame)),
            Ok(None) => None,
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}
