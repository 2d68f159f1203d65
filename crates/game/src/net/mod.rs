mod client;
mod codec;
mod config;
mod error;
mod events;
mod framer;
mod multiplayer;
mod protocol;
mod server;
mod transport;

pub const DEFAULT_PORT: u16 = 27016;
pub const DEFAULT_TICK_RATE: u32 = 20;
pub const MAX_PLAYERS: usize = 8;

pub use client::{ConnectionState, NetworkClient, RemotePlayer};
pub use codec::{ByteReader, ByteWriter, CodecError, CodecResult};
pub use config::{ClientConfig, ServerConfig};
pub use error::NetError;
pub use events::{ClientEvent, DisconnectReason, ServerEvent, SessionEvent};
pub use framer::{FrameBuffer, FrameError, Frames, RawFrame};
pub use multiplayer::Multiplayer;
pub use protocol::{
    BLOCK_EDIT_SIZE, BlockEdit, HEADER_SIZE, MAX_PAYLOAD_SIZE, Message, MessageType, NAME_LEN,
    PLAYER_STATE_SIZE, PROTOCOL_MAGIC, PROTOCOL_VERSION, Packet, PacketError, PacketHeader,
    PlayerFlags, PlayerState, RejectReason, encode_frame,
};
pub use server::{ClientSlot, GameServer, HOST_SLOT, ServerStats, SlotState};
pub use transport::{
    NetworkStats, PendingConnect, ReadOutcome, StreamEndpoint, configure_stream, create_listener,
    resolve,
};
