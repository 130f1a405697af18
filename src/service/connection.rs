//! Async driver binding a [`ConnectionState`] to a byte stream.
//!
//! [`PeerConnection::spawn`] splits the stream, moves both halves into a
//! background task and returns a cloneable [`ConnectionHandle`] for sending
//! plus a [`PeerEvents`] stream of notifications. All protocol decisions are
//! made by the state machine; this task only moves bytes and time into it.
//!
//! ```no_run
//! use futures::StreamExt;
//! use peer_wire::config::ConnectionConfig;
//! use peer_wire::service::{PeerConnection, PeerEvent};
//! use tokio::net::TcpStream;
//!
//! # async fn run() -> peer_wire::error::Result<()> {
//! let stream = TcpStream::connect("127.0.0.1:6881").await?;
//! let (handle, mut events) = PeerConnection::spawn(stream, ConnectionConfig::default());
//!
//! handle.handshake([0u8; 20], *b"-PW0001-000000000000").await?;
//! handle.interested().await?;
//!
//! while let Some(event) = events.next().await {
//!     if let PeerEvent::Closed(reason) = event {
//!         println!("closed: {reason:?}");
//!         break;
//!     }
//! }
//! # Ok(())
//! # }
//! ```

use crate::config::ConnectionConfig;
use crate::error::{ProtocolError, Result};
use crate::protocol::bitfield::Bitfield;
use crate::protocol::handshake::{Handshake, InfoHash, PeerId};
use crate::protocol::message::{Block, BlockRequest, Message};
use crate::service::state::{CloseReason, ConnectionState, PeerEvent, PeerState};
use crate::utils::metrics::global_metrics;
use crate::utils::timeout::with_timeout_error;
use bytes::{Bytes, BytesMut};
use futures::future::BoxFuture;
use std::collections::VecDeque;
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, WriteHalf};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::Instant;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, instrument, trace, warn};

/// Bytes reserved for each read from the transport
const READ_CHUNK_SIZE: usize = 16 * 1024;

/// Ordered notifications from one connection. Ends after `PeerEvent::Closed`.
///
/// Bounded by [`ConnectionConfig::event_buffer`]; the connection stops
/// reading from its stream while the buffer is full.
pub type PeerEvents = ReceiverStream<PeerEvent>;

/// Observable connection fields, refreshed by the connection task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionInfo {
    pub state: PeerState,
    pub peer_id: Option<PeerId>,
    pub info_hash: Option<InfoHash>,
    pub last_message_received_on: Option<Instant>,
    pub close_reason: Option<CloseReason>,
}

impl ConnectionInfo {
    fn from_state(state: &ConnectionState, close_reason: Option<CloseReason>) -> Self {
        Self {
            state: state.state(),
            peer_id: state.peer_id(),
            info_hash: state.info_hash(),
            last_message_received_on: state.last_message_received_on(),
            close_reason,
        }
    }
}

enum Command {
    Send {
        message: Message,
        reply: oneshot::Sender<Result<()>>,
    },
    Close,
}

/// Entry point for running a peer wire connection over a stream.
pub struct PeerConnection;

impl PeerConnection {
    /// Bind `stream` to a new connection and start its task.
    ///
    /// The connection starts in `AwaitingHandshake` with the inactivity
    /// deadline armed. Configuration problems are logged and the connection
    /// runs anyway; use [`try_spawn`](Self::try_spawn) to reject them. Must be
    /// called from within a Tokio runtime.
    pub fn spawn<S>(stream: S, config: ConnectionConfig) -> (ConnectionHandle, PeerEvents)
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        for problem in config.validate() {
            warn!(%problem, "Connection config problem");
        }
        Self::start(stream, config)
    }

    /// Like [`spawn`](Self::spawn), but fails with
    /// [`ProtocolError::ConfigError`] if `config` does not validate. The
    /// stream is dropped in that case.
    pub fn try_spawn<S>(
        stream: S,
        config: ConnectionConfig,
    ) -> Result<(ConnectionHandle, PeerEvents)>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        config.validate_strict()?;
        Ok(Self::start(stream, config))
    }

    fn start<S>(stream: S, config: ConnectionConfig) -> (ConnectionHandle, PeerEvents)
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (command_tx, command_rx) = mpsc::channel(config.command_buffer.max(1));
        let (event_tx, event_rx) = mpsc::channel(config.event_buffer.max(1));

        let state = ConnectionState::new(&config, Instant::now());
        let (info_tx, info_rx) = watch::channel(ConnectionInfo::from_state(&state, None));

        global_metrics().connection_opened();
        let driver = Driver {
            state,
            config,
            commands: command_rx,
            events: event_tx,
            pending_events: VecDeque::new(),
            info: info_tx,
            close_reason: None,
        };
        tokio::spawn(driver.run(stream));

        let handle = ConnectionHandle {
            commands: command_tx,
            info: info_rx,
        };
        (handle, ReceiverStream::new(event_rx))
    }
}

type WriteOutcome<S> = (WriteHalf<S>, usize, io::Result<()>);

struct Driver {
    state: ConnectionState,
    config: ConnectionConfig,
    commands: mpsc::Receiver<Command>,
    events: mpsc::Sender<PeerEvent>,
    /// Produced but not yet accepted by the event channel. Reading pauses
    /// while this is non-empty.
    pending_events: VecDeque<PeerEvent>,
    info: watch::Sender<ConnectionInfo>,
    close_reason: Option<CloseReason>,
}

impl Driver {
    #[instrument(name = "peer_connection", skip_all)]
    async fn run<S>(mut self, stream: S)
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        debug!("Connection started");
        let (mut reader, writer) = tokio::io::split(stream);
        let mut writer = Some(writer);
        let mut in_flight: Option<BoxFuture<'static, WriteOutcome<S>>> = None;
        let mut read_buf = BytesMut::with_capacity(READ_CHUNK_SIZE);
        let mut commands_open = true;

        while !self.state.is_closed() {
            if in_flight.is_none() {
                if let Some(w) = writer.take() {
                    match self.state.next_write() {
                        Some(bytes) => in_flight = Some(start_write(w, bytes)),
                        None => writer = Some(w),
                    }
                }
            }

            if read_buf.capacity() - read_buf.len() < READ_CHUNK_SIZE / 4 {
                read_buf.reserve(READ_CHUNK_SIZE);
            }

            // Reading and the inactivity timer wait for queued events to go out.
            let events_drained = self.pending_events.is_empty();
            let events = self.events.clone();

            tokio::select! {
                read = reader.read_buf(&mut read_buf), if events_drained => {
                    self.on_read(read, &mut read_buf);
                }
                permit = events.reserve(), if !events_drained => match permit {
                    Ok(permit) => {
                        if let Some(event) = self.pending_events.pop_front() {
                            permit.send(event);
                        }
                    }
                    Err(_) => {
                        trace!(dropped = self.pending_events.len(), "Event stream dropped");
                        self.pending_events.clear();
                    }
                },
                (w, len, result) = async {
                    match in_flight.as_mut() {
                        Some(write) => write.await,
                        None => std::future::pending().await,
                    }
                }, if in_flight.is_some() => {
                    in_flight = None;
                    writer = Some(w);
                    self.on_write(len, result);
                }
                command = self.commands.recv(), if commands_open => match command {
                    Some(command) => self.on_command(command),
                    None => {
                        trace!("All handles dropped");
                        commands_open = false;
                    }
                },
                _ = tokio::time::sleep_until(self.state.deadline()), if events_drained => {
                    let event = self.state.on_timer(Instant::now());
                    self.emit_all(event);
                }
            }

            self.publish();
        }

        self.shutdown(writer, in_flight).await;
        drop(reader);
        // Commands still buffered get `ConnectionClosed` from their dropped reply.
        self.commands.close();
        while self.commands.try_recv().is_ok() {}
        self.publish();
        global_metrics().connection_closed();
        self.flush_events().await;
    }

    fn on_read(&mut self, read: io::Result<usize>, read_buf: &mut BytesMut) {
        match read {
            Ok(0) => {
                let event = self.state.on_end_of_stream();
                self.emit_all(event);
            }
            Ok(n) => {
                trace!(bytes = n, "Read from transport");
                let chunk = read_buf.split();
                let events = self.state.on_data(&chunk, Instant::now());
                self.emit_all(events);
            }
            Err(e) => {
                let events = self.state.on_transport_error(e.into());
                self.emit_all(events);
            }
        }
    }

    fn on_write(&mut self, len: usize, result: io::Result<()>) {
        match result {
            Ok(()) => {
                self.state.on_write_complete();
                global_metrics().frame_sent(len as u64);
            }
            Err(e) => {
                let events = self.state.on_write_error(e);
                self.emit_all(events);
            }
        }
    }

    fn on_command(&mut self, command: Command) {
        match command {
            Command::Send { message, reply } => {
                let result = self.state.send(&message);
                if let Err(e) = &result {
                    debug!(error = %e, "Send rejected");
                }
                let _ = reply.send(result);
            }
            Command::Close => {
                let event = self.state.close(CloseReason::Requested);
                self.emit_all(event);
            }
        }
    }

    fn emit(&mut self, event: PeerEvent) {
        if let PeerEvent::Closed(reason) = &event {
            self.close_reason = Some(*reason);
        }
        trace!(event = event.name(), "Queueing event");
        self.pending_events.push_back(event);
    }

    fn emit_all(&mut self, events: impl IntoIterator<Item = PeerEvent>) {
        for event in events {
            self.emit(event);
        }
    }

    /// Deliver what is left after close, ending with `Closed`.
    async fn flush_events(&mut self) {
        while let Some(event) = self.pending_events.pop_front() {
            // A dropped event stream only means nobody is listening.
            if self.events.send(event).await.is_err() {
                self.pending_events.clear();
            }
        }
    }

    fn publish(&self) {
        let next = ConnectionInfo::from_state(&self.state, self.close_reason);
        self.info.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }

    /// Let the in-flight write finish, then signal end of output.
    async fn shutdown<S>(
        &mut self,
        writer: Option<WriteHalf<S>>,
        in_flight: Option<BoxFuture<'static, WriteOutcome<S>>>,
    ) where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let bound = self.config.shutdown_timeout;

        let writer = match in_flight {
            Some(write) => {
                let drained = with_timeout_error(async { Ok(write.await) }, bound).await;
                match drained {
                    Ok((w, len, result)) => {
                        self.on_write(len, result);
                        Some(w)
                    }
                    Err(e) => {
                        warn!(error = %e, "In-flight write did not finish before shutdown");
                        None
                    }
                }
            }
            None => writer,
        };

        if let Some(mut w) = writer {
            let result = with_timeout_error(
                async {
                    w.shutdown().await?;
                    Ok(())
                },
                bound,
            )
            .await;
            if let Err(e) = result {
                debug!(error = %e, "Write half shutdown failed");
            }
        }
    }
}

fn start_write<S>(mut writer: WriteHalf<S>, bytes: Bytes) -> BoxFuture<'static, WriteOutcome<S>>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    Box::pin(async move {
        let len = bytes.len();
        let result = match writer.write_all(&bytes).await {
            Ok(()) => writer.flush().await,
            Err(e) => Err(e),
        };
        (writer, len, result)
    })
}

/// Cloneable sending side of a connection.
///
/// `send` resolves once the message is queued behind earlier sends, not once
/// it is on the wire. Queued messages reach the transport in call order.
#[derive(Clone)]
pub struct ConnectionHandle {
    commands: mpsc::Sender<Command>,
    info: watch::Receiver<ConnectionInfo>,
}

impl ConnectionHandle {
    /// Queue `message` for sending.
    ///
    /// Fails with [`ProtocolError::ConnectionClosed`] once the connection is
    /// closed and with [`ProtocolError::Backpressure`] when the outbound
    /// queue is full.
    pub async fn send(&self, message: Message) -> Result<()> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(Command::Send { message, reply })
            .await
            .map_err(|_| ProtocolError::ConnectionClosed)?;
        response.await.map_err(|_| ProtocolError::ConnectionClosed)?
    }

    pub async fn handshake(
        &self,
        info_hash: impl Into<InfoHash>,
        peer_id: impl Into<PeerId>,
    ) -> Result<()> {
        self.send(Message::Handshake(Handshake::new(info_hash, peer_id)))
            .await
    }

    pub async fn keep_alive(&self) -> Result<()> {
        self.send(Message::KeepAlive).await
    }

    pub async fn choke(&self) -> Result<()> {
        self.send(Message::Choke).await
    }

    pub async fn unchoke(&self) -> Result<()> {
        self.send(Message::Unchoke).await
    }

    pub async fn interested(&self) -> Result<()> {
        self.send(Message::Interested).await
    }

    pub async fn not_interested(&self) -> Result<()> {
        self.send(Message::NotInterested).await
    }

    pub async fn have(&self, piece_index: i32) -> Result<()> {
        self.send(Message::Have { piece_index }).await
    }

    pub async fn bitfield(&self, bitfield: Bitfield) -> Result<()> {
        self.send(Message::Bitfield(bitfield)).await
    }

    pub async fn request(&self, index: i32, begin: i32, length: i32) -> Result<()> {
        self.send(Message::Request(BlockRequest::new(index, begin, length)))
            .await
    }

    pub async fn cancel(&self, index: i32, begin: i32, length: i32) -> Result<()> {
        self.send(Message::Cancel(BlockRequest::new(index, begin, length)))
            .await
    }

    pub async fn piece(&self, index: i32, begin: i32, data: impl Into<Bytes>) -> Result<()> {
        self.send(Message::Piece(Block::new(index, begin, data)))
            .await
    }

    pub async fn port(&self, listen_port: i16) -> Result<()> {
        self.send(Message::Port { listen_port }).await
    }

    /// Request a close. Queued writes that have not started are abandoned.
    ///
    /// Closing an already closed connection does nothing.
    pub async fn close(&self) {
        let _ = self.commands.send(Command::Close).await;
    }

    /// Wait until the connection reaches `Closed`.
    pub async fn closed(&self) -> Option<CloseReason> {
        let mut info = self.info.clone();
        let _ = info.wait_for(|i| i.state == PeerState::Closed).await;
        let reason = info.borrow().close_reason;
        reason
    }

    /// Latest published connection fields.
    pub fn info(&self) -> ConnectionInfo {
        self.info.borrow().clone()
    }

    pub fn state(&self) -> PeerState {
        self.info.borrow().state
    }

    pub fn is_closed(&self) -> bool {
        self.state() == PeerState::Closed
    }

    pub fn peer_id(&self) -> Option<PeerId> {
        self.info.borrow().peer_id
    }

    pub fn info_hash(&self) -> Option<InfoHash> {
        self.info.borrow().info_hash
    }

    pub fn last_message_received_on(&self) -> Option<Instant> {
        self.info.borrow().last_message_received_on
    }
}

impl std::fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("info", &*self.info.borrow())
            .finish()
    }
}
