use std::net::SocketAddr;

use glam::IVec3;

use super::protocol::{BlockEdit, RejectReason};

#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    ClientConnected {
        slot: u8,
        addr: SocketAddr,
    },
    ClientAuthenticated {
        slot: u8,
        name: String,
    },
    ClientDisconnected {
        slot: u8,
        reason: DisconnectReason,
    },
    ConnectionRefused {
        addr: SocketAddr,
    },
    BlockEditRejected {
        slot: u8,
        position: IVec3,
        distance: f32,
    },
    Error {
        message: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    Connected { client_id: u8 },
    Rejected { reason: RejectReason },
    PlayerJoined { id: u8, name: String },
    PlayerLeft { id: u8 },
    BlockChanged(BlockEdit),
    Disconnected,
    Error { message: String },
}

/// Events from whichever side a [`Multiplayer`](super::Multiplayer) is playing.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Server(ServerEvent),
    Client(ClientEvent),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    Graceful,
    Closed,
    Timeout,
    Kicked,
    ProtocolError,
    TransportError,
}

impl DisconnectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DisconnectReason::Graceful => "disconnected",
            DisconnectReason::Closed => "closed the connection",
            DisconnectReason::Timeout => "timed out",
            DisconnectReason::Kicked => "kicked",
            DisconnectReason::ProtocolError => "sent a malformed stream",
            DisconnectReason::TransportError => "lost the connection",
        }
    }
}
