use std::time::Duration;

use super::{DEFAULT_TICK_RATE, MAX_PLAYERS};

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub max_players: usize,
    pub tick_rate: u32,
    pub world_seed: u32,
    pub host_name: String,
    pub reach_distance: f32,
    pub time_sync_interval_ticks: u32,
    /// Silent slots are dropped after this long. `None` keeps them forever.
    pub heartbeat_timeout: Option<Duration>,
    pub max_send_buffer: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            max_players: MAX_PLAYERS,
            tick_rate: DEFAULT_TICK_RATE,
            world_seed: 0,
            host_name: String::from("Host"),
            reach_distance: 8.0,
            time_sync_interval_ticks: 100,
            heartbeat_timeout: Some(Duration::from_secs(10)),
            max_send_buffer: 256 * 1024,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub player_name: String,
    pub connect_timeout: Duration,
    pub heartbeat_interval: Duration,
    /// The connection errors out when nothing arrives for this long.
    pub server_timeout: Option<Duration>,
    pub max_send_buffer: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            player_name: String::from("Player"),
            connect_timeout: Duration::from_secs(5),
            heartbeat_interval: Duration::from_secs(1),
            server_timeout: Some(Duration::from_secs(10)),
            max_send_buffer: 64 * 1024,
        }
    }
}
