//! # Connection Service
//!
//! Per-connection lifecycle: handshake gating, inactivity timeout, ordered
//! outbound writes and event delivery.
//!
//! - [`state`]: the I/O-free state machine
//! - [`connection`]: the Tokio task that drives it over an `AsyncRead + AsyncWrite` stream

pub mod connection;
pub mod state;

pub use connection::{ConnectionHandle, ConnectionInfo, PeerConnection, PeerEvents};
pub use state::{CloseReason, ConnectionState, PeerEvent, PeerState};
