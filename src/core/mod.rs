//! # Core Framing Components
//!
//! Low-level framing for the peer wire protocol: turning an arbitrarily
//! chunked byte stream into complete frames, and frames back into bytes.
//!
//! ## Components
//! - **Frame**: one complete unit cut from the stream (the handshake, or a
//!   length-prefixed message)
//! - **Codec**: Tokio codec holding the framing rules, usable with `Framed`
//! - **Reassembler**: owns the pending-bytes buffer and yields frames as
//!   chunks arrive
//!
//! ## Wire Format
//! ```text
//! handshake (once):  [pstrlen(1)] [pstr(pstrlen)] [reserved(8)] [info_hash(20)] [peer_id(20)]
//! every other frame: [length(4, BE)] [id(1)] [payload(length - 1)]
//! keep-alive:        [0, 0, 0, 0]
//! ```
//!
//! ## Limits
//! - Declared frame lengths above the configured maximum are rejected before
//!   any buffering, so a hostile length prefix cannot grow memory unbounded

pub mod codec;
pub mod frame;
pub mod reassembler;
