//! # Protocol Messages
//!
//! Message variants, the handshake, and the id routing table.
//!
//! - [`message`]: the tagged message union and its binary layouts
//! - [`handshake`]: the non-length-prefixed opening message
//! - [`bitfield`]: piece-availability bits
//! - [`dispatcher`]: the static id -> decoder/notification table

pub mod bitfield;
pub mod dispatcher;
pub mod handshake;
pub mod message;
