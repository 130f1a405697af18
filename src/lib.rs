//! # Peer Wire
//!
//! The peer-to-peer wire protocol of a file-sharing swarm: binary message
//! layouts, reassembly of an arbitrarily chunked byte stream into frames, and
//! the per-connection lifecycle (handshake gating, inactivity timeout,
//! ordered outbound writes).
//!
//! ## Layers
//! - [`protocol`]: message variants, the handshake and the id routing table
//! - [`core`]: frames, the Tokio codec and the incremental reassembler
//! - [`service`]: the connection state machine and its async driver
//! - [`config`], [`error`], [`utils`]: configuration, errors, logging,
//!   metrics and timeouts
//!
//! ## Quick Start
//! ```rust
//! use peer_wire::core::reassembler::FrameReassembler;
//! use peer_wire::protocol::dispatcher::EventRouter;
//! use peer_wire::protocol::message::Message;
//!
//! let mut reassembler = FrameReassembler::after_handshake(1024);
//! let wire = Message::Have { piece_index: 7 }.encode();
//!
//! let mut decoded = Vec::new();
//! for chunk in wire.chunks(3) {
//!     for frame in reassembler.feed(chunk) {
//!         decoded.push(EventRouter::route(&frame.unwrap()).unwrap());
//!     }
//! }
//! assert_eq!(decoded.len(), 1);
//! assert_eq!(decoded[0].kind.name(), "have");
//! ```
//!
//! Obtaining the stream (listening, dialing) and deciding what to send are
//! left to the caller.

pub mod config;
pub mod core;
pub mod error;
pub mod protocol;
pub mod service;
pub mod utils;

pub use config::{ConnectionConfig, LoggingConfig, PeerWireConfig};
pub use error::{DecodeError, ProtocolError, Result};
pub use protocol::handshake::{Handshake, InfoHash, PeerId};
pub use protocol::message::Message;
pub use service::{ConnectionHandle, PeerConnection, PeerEvent, PeerEvents, PeerState};
