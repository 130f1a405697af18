//! Per-connection protocol state, independent of any I/O.
//!
//! [`ConnectionState`] is driven by discrete reactions (bytes arrived, write
//! flushed, timer fired, close requested) and answers each with the events
//! to deliver. It owns the reassembly buffer, the handshake gate, the
//! inactivity deadline and the outbound queue. The async driver in
//! [`connection`](super::connection) is one way to feed it.

use crate::config::ConnectionConfig;
use crate::core::reassembler::FrameReassembler;
use crate::error::{constants, ProtocolError, Result};
use crate::protocol::dispatcher::{EventKind, EventRouter};
use crate::protocol::handshake::{InfoHash, PeerId};
use crate::protocol::message::Message;
use crate::utils::metrics::global_metrics;
use bytes::Bytes;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, trace, warn};

/// Lifecycle of one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerState {
    /// Bound to a stream, no handshake received yet.
    AwaitingHandshake,
    /// Handshake received; length-prefixed frames flow.
    Active,
    /// Terminal.
    Closed,
}

/// Why a connection closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// The application asked for it.
    Requested,
    /// No bytes arrived before the inactivity deadline.
    InactivityTimeout,
    /// The peer ended its side of the stream.
    EndOfStream,
    /// Reading from or writing to the transport failed.
    TransportError,
    /// The peer sent bytes that cannot be framed or decoded.
    ProtocolError,
}

/// One notification delivered to the application.
#[derive(Debug)]
pub enum PeerEvent {
    /// A decoded frame, tagged with its notification channel.
    Message { kind: EventKind, message: Message },
    /// A failure on this connection. Does not by itself close it.
    Error(ProtocolError),
    /// The connection reached its terminal state.
    Closed(CloseReason),
}

impl PeerEvent {
    /// Symbolic notification name.
    pub fn name(&self) -> &'static str {
        match self {
            PeerEvent::Message { kind, .. } => kind.name(),
            PeerEvent::Error(_) => "error",
            PeerEvent::Closed(_) => "closed",
        }
    }
}

#[derive(Debug)]
pub struct ConnectionState {
    state: PeerState,
    peer_id: Option<PeerId>,
    info_hash: Option<InfoHash>,
    reassembler: FrameReassembler,
    outbound: VecDeque<Bytes>,
    outbound_queue_limit: usize,
    write_in_flight: bool,
    inactivity_timeout: Duration,
    deadline: Instant,
    last_message_received_on: Option<Instant>,
}

impl ConnectionState {
    /// State for a freshly bound stream. The inactivity deadline starts now.
    pub fn new(config: &ConnectionConfig, now: Instant) -> Self {
        Self {
            state: PeerState::AwaitingHandshake,
            peer_id: None,
            info_hash: None,
            reassembler: FrameReassembler::new(config.max_frame_size),
            outbound: VecDeque::new(),
            outbound_queue_limit: config.outbound_queue_limit,
            write_in_flight: false,
            inactivity_timeout: config.inactivity_timeout,
            deadline: now + config.inactivity_timeout,
            last_message_received_on: None,
        }
    }

    pub fn state(&self) -> PeerState {
        self.state
    }

    pub fn is_closed(&self) -> bool {
        self.state == PeerState::Closed
    }

    pub fn peer_id(&self) -> Option<PeerId> {
        self.peer_id
    }

    pub fn info_hash(&self) -> Option<InfoHash> {
        self.info_hash
    }

    /// When the connection times out unless more bytes arrive.
    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn last_message_received_on(&self) -> Option<Instant> {
        self.last_message_received_on
    }

    /// Encoded messages not yet handed to the transport.
    pub fn pending_writes(&self) -> usize {
        self.outbound.len()
    }

    pub fn write_in_flight(&self) -> bool {
        self.write_in_flight
    }

    /// React to a chunk of inbound bytes.
    ///
    /// Resets the inactivity deadline whether or not the chunk completes a
    /// frame, then returns one event per completed frame in wire order. A
    /// framing or decode failure yields the events decoded before it, then an
    /// `Error` and a `Closed` event. Once closed, chunks are ignored.
    pub fn on_data(&mut self, chunk: &[u8], now: Instant) -> Vec<PeerEvent> {
        let mut events = Vec::new();
        if self.is_closed() {
            trace!(bytes = chunk.len(), "Ignoring data on closed connection");
            return events;
        }

        self.deadline = now + self.inactivity_timeout;
        self.last_message_received_on = Some(now);
        global_metrics().bytes_read(chunk.len() as u64);

        self.reassembler.push(chunk);
        loop {
            let frame = match self.reassembler.next_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => break,
                Err(e) => {
                    self.fail(e, &mut events);
                    break;
                }
            };

            match EventRouter::route(&frame) {
                Ok(routed) => {
                    if let Message::Handshake(hs) = &routed.message {
                        self.peer_id = Some(hs.peer_id);
                        self.info_hash = Some(hs.info_hash);
                        self.state = PeerState::Active;
                        global_metrics().handshake_received();
                        debug!(peer_id = %hs.peer_id, info_hash = %hs.info_hash, "Handshake received");
                    }
                    global_metrics().frame_received();
                    trace!(event = routed.kind.name(), "Frame decoded");
                    events.push(PeerEvent::Message {
                        kind: routed.kind,
                        message: routed.message,
                    });
                }
                Err(e) => {
                    self.fail(e.into(), &mut events);
                    break;
                }
            }
        }

        events
    }

    fn fail(&mut self, err: ProtocolError, events: &mut Vec<PeerEvent>) {
        warn!(error = %err, "Closing connection on protocol error");
        global_metrics().protocol_error();
        events.push(PeerEvent::Error(err));
        events.extend(self.close(CloseReason::ProtocolError));
    }

    /// Encode `message` and queue it behind any pending writes.
    pub fn send(&mut self, message: &Message) -> Result<()> {
        if self.is_closed() {
            return Err(ProtocolError::ConnectionClosed);
        }
        if self.outbound.len() >= self.outbound_queue_limit {
            return Err(ProtocolError::Backpressure {
                limit: self.outbound_queue_limit,
            });
        }

        self.outbound.push_back(message.encode());
        Ok(())
    }

    /// Take the next write to hand to the transport.
    ///
    /// Returns `None` while a previous write is still in flight, so at most
    /// one write is outstanding and wire order equals send order.
    pub fn next_write(&mut self) -> Option<Bytes> {
        if self.write_in_flight || self.is_closed() {
            return None;
        }
        let bytes = self.outbound.pop_front()?;
        self.write_in_flight = true;
        Some(bytes)
    }

    /// The transport flushed the in-flight write.
    pub fn on_write_complete(&mut self) {
        self.write_in_flight = false;
    }

    /// The in-flight write failed.
    ///
    /// Part of the frame may already be on the wire, so nothing queued can be
    /// framed correctly after it. Reports the error and closes.
    pub fn on_write_error(&mut self, err: std::io::Error) -> Vec<PeerEvent> {
        self.write_in_flight = false;
        self.on_transport_error(err.into())
    }

    /// A read or write on the transport failed. Reports the error and closes.
    pub fn on_transport_error(&mut self, err: ProtocolError) -> Vec<PeerEvent> {
        global_metrics().transport_error();
        debug!(error = %err, "Transport error");
        let mut events = vec![PeerEvent::Error(err)];
        events.extend(self.close(CloseReason::TransportError));
        events
    }

    /// The peer ended the stream.
    pub fn on_end_of_stream(&mut self) -> Option<PeerEvent> {
        self.close(CloseReason::EndOfStream)
    }

    /// Check the inactivity deadline.
    pub fn on_timer(&mut self, now: Instant) -> Option<PeerEvent> {
        if self.is_closed() || now < self.deadline {
            return None;
        }
        global_metrics().inactivity_timeout();
        debug!(
            timeout_ms = self.inactivity_timeout.as_millis() as u64,
            "{}",
            constants::ERR_INACTIVITY_TIMEOUT
        );
        self.close(CloseReason::InactivityTimeout)
    }

    /// Move to `Closed`, abandoning queued writes that have not started.
    ///
    /// Returns the `Closed` event on the first call and `None` afterwards.
    pub fn close(&mut self, reason: CloseReason) -> Option<PeerEvent> {
        if self.is_closed() {
            return None;
        }

        let abandoned = self.outbound.len();
        self.state = PeerState::Closed;
        self.outbound.clear();
        self.reassembler.clear();
        debug!(?reason, abandoned, "{}", constants::ERR_CONNECTION_CLOSED);
        Some(PeerEvent::Closed(reason))
    }
}
