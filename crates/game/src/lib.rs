pub mod avatar;
pub mod net;
pub mod tick;
pub mod world;

pub use avatar::{AvatarSink, AvatarSync};
pub use net::{
    ClientConfig, ClientEvent, ConnectionState, DEFAULT_PORT, DEFAULT_TICK_RATE, DisconnectReason,
    GameServer, MAX_PLAYERS, Message, Multiplayer, NetError, NetworkClient, NetworkStats,
    PlayerState, ServerConfig, ServerEvent, SessionEvent,
};
pub use tick::TickClock;
pub use world::{Block, GameWorld, LocalWorld};
