use std::io;

use super::framer::FrameError;
use super::protocol::PacketError;

#[derive(Debug, thiserror::Error)]
pub enum NetError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("protocol error: {0}")]
    Protocol(#[from] FrameError),
    #[error("packet error: {0}")]
    Packet(#[from] PacketError),
    #[error("could not resolve {0}")]
    Resolve(String),
    #[error("send buffer overflow ({0} bytes queued)")]
    SendOverflow(usize),
    #[error("not connected")]
    NotConnected,
}

impl NetError {
    /// Whether the error came from the byte stream itself rather than from
    /// what the peer sent.
    pub fn is_transport(&self) -> bool {
        matches!(self, NetError::Io(_) | NetError::SendOverflow(_))
    }
}
