use crate::core::frame::Frame;
use crate::error::DecodeError;
use crate::protocol::message::{self, Message, MessageId};

type DecodeFn = fn(&[u8]) -> Result<Message, DecodeError>;

/// Notification a decoded frame is delivered on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Handshake,
    KeepAlive,
    Choke,
    Unchoke,
    Interested,
    NotInterested,
    Have,
    Bitfield,
    Request,
    Piece,
    Cancel,
    Port,
    Unknown,
}

impl EventKind {
    /// Symbolic channel name.
    pub fn name(self) -> &'static str {
        match self {
            EventKind::Handshake => "handshake",
            EventKind::KeepAlive => "keep-alive",
            EventKind::Choke => "choke",
            EventKind::Unchoke => "unchoke",
            EventKind::Interested => "interested",
            EventKind::NotInterested => "not-interested",
            EventKind::Have => "have",
            EventKind::Bitfield => "bitfield",
            EventKind::Request => "request",
            EventKind::Piece => "piece",
            EventKind::Cancel => "cancel",
            EventKind::Port => "port",
            EventKind::Unknown => "unknown",
        }
    }
}

/// One entry of the id table.
pub struct Route {
    pub id: MessageId,
    pub kind: EventKind,
    decode: DecodeFn,
}

/// Id -> (decoder, notification). Indexed by the wire id.
static ROUTES: [Route; 10] = [
    Route {
        id: MessageId::Choke,
        kind: EventKind::Choke,
        decode: message::decode_choke,
    },
    Route {
        id: MessageId::Unchoke,
        kind: EventKind::Unchoke,
        decode: message::decode_unchoke,
    },
    Route {
        id: MessageId::Interested,
        kind: EventKind::Interested,
        decode: message::decode_interested,
    },
    Route {
        id: MessageId::NotInterested,
        kind: EventKind::NotInterested,
        decode: message::decode_not_interested,
    },
    Route {
        id: MessageId::Have,
        kind: EventKind::Have,
        decode: message::decode_have,
    },
    Route {
        id: MessageId::Bitfield,
        kind: EventKind::Bitfield,
        decode: message::decode_bitfield,
    },
    Route {
        id: MessageId::Request,
        kind: EventKind::Request,
        decode: message::decode_request,
    },
    Route {
        id: MessageId::Piece,
        kind: EventKind::Piece,
        decode: message::decode_piece,
    },
    Route {
        id: MessageId::Cancel,
        kind: EventKind::Cancel,
        decode: message::decode_cancel,
    },
    Route {
        id: MessageId::Port,
        kind: EventKind::Port,
        decode: message::decode_port,
    },
];

/// A decoded frame together with the notification it belongs on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Routed {
    pub kind: EventKind,
    pub message: Message,
}

/// Static id routing for inbound frames.
///
/// The table is fixed at compile time and is the only place ids are tied to
/// decoders and notifications. Ids outside it route to [`EventKind::Unknown`]
/// instead of failing.
pub struct EventRouter;

impl EventRouter {
    /// Table entry for a known id.
    #[inline]
    pub fn route_for(id: u8) -> Option<&'static Route> {
        ROUTES.get(id as usize)
    }

    pub fn routes() -> &'static [Route] {
        &ROUTES
    }

    pub fn kind_for(id: u8) -> EventKind {
        Self::route_for(id).map_or(EventKind::Unknown, |route| route.kind)
    }

    /// Decode the payload of a tagged frame according to its id.
    pub fn decode_payload(id: u8, payload: &[u8]) -> Result<Message, DecodeError> {
        match Self::route_for(id) {
            Some(route) => (route.decode)(payload),
            None => Ok(message::decode_unknown(id, payload)),
        }
    }

    /// Decode and classify one frame from the reassembler.
    pub fn route(frame: &Frame) -> Result<Routed, DecodeError> {
        match frame {
            Frame::Handshake(bytes) => Ok(Routed {
                kind: EventKind::Handshake,
                message: Message::decode_handshake(bytes)?,
            }),
            Frame::Message(bytes) => {
                let message = Message::decode(bytes)?;
                let kind = match message.id() {
                    Some(id) => Self::kind_for(id),
                    None => EventKind::KeepAlive,
                };
                Ok(Routed { kind, message })
            }
        }
    }
}
