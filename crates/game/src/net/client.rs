use std::collections::VecDeque;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use glam::{IVec3, Vec3};

use super::config::ClientConfig;
use super::error::NetError;
use super::events::ClientEvent;
use super::protocol::{BlockEdit, Message, PlayerState};
use super::transport::{NetworkStats, PendingConnect, StreamEndpoint, resolve};
use crate::world::{Block, GameWorld};

const POLL_SLEEP: Duration = Duration::from_millis(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Error,
}

/// What the client knows about another participant.
#[derive(Debug, Clone, Default)]
pub struct RemotePlayer {
    pub active: bool,
    pub name: String,
    pub state: PlayerState,
    /// Changes every time the id is handed to a newly joined player.
    pub join_serial: u64,
}

pub struct NetworkClient {
    config: ClientConfig,
    state: ConnectionState,
    server_addr: Option<SocketAddr>,
    pending: Option<PendingConnect>,
    endpoint: Option<StreamEndpoint>,
    client_id: Option<u8>,
    world_seed: u32,
    time_of_day: f32,
    remote: Vec<RemotePlayer>,
    last_error: Option<String>,
    connect_started: Option<Instant>,
    last_received: Instant,
    last_heartbeat_sent: Instant,
    last_heartbeat_ack: Option<Instant>,
    rtt_ms: Option<u32>,
    joins_seen: u64,
    clock: Instant,
    retired_stats: NetworkStats,
    pending_events: VecDeque<ClientEvent>,
}

impl NetworkClient {
    pub fn new(config: ClientConfig) -> Self {
        let now = Instant::now();
        Self {
            config,
            state: ConnectionState::Disconnected,
            server_addr: None,
            pending: None,
            endpoint: None,
            client_id: None,
            world_seed: 0,
            time_of_day: 0.0,
            remote: Vec::new(),
            last_error: None,
            connect_started: None,
            last_received: now,
            last_heartbeat_sent: now,
            last_heartbeat_ack: None,
            rtt_ms: None,
            joins_seen: 0,
            clock: now,
            retired_stats: NetworkStats::default(),
            pending_events: VecDeque::new(),
        }
    }

    /// Resolves `host` and starts a non-blocking connect. The handshake is
    /// driven by later calls to [`NetworkClient::poll`].
    pub fn connect(&mut self, host: &str, port: u16) -> Result<(), NetError> {
        if self.state != ConnectionState::Disconnected && self.state != ConnectionState::Error {
            self.disconnect();
        }
        self.last_error = None;

        let addr = match resolve(host, port) {
            Ok(addr) => addr,
            Err(e) => {
                self.fail(e.to_string());
                return Err(e);
            }
        };

        log::info!("Connecting to {} as {}", addr, self.config.player_name);

        let pending = match PendingConnect::start(addr) {
            Ok(pending) => pending,
            Err(e) => {
                self.fail(format!("connect to {} failed: {}", addr, e));
                return Err(e.into());
            }
        };

        self.server_addr = Some(addr);
        self.pending = Some(pending);
        self.state = ConnectionState::Connecting;
        self.connect_started = Some(Instant::now());
        Ok(())
    }

    /// Sends a disconnect frame if the session is up and closes the socket.
    pub fn disconnect(&mut self) {
        if let Some(mut endpoint) = self.endpoint.take() {
            if self.state == ConnectionState::Connected {
                let _ = endpoint.send(&Message::Disconnect);
            }
            endpoint.shutdown();
            self.retired_stats.merge(endpoint.stats());
            log::info!("Disconnected from {}", endpoint.peer_addr());
        }
        self.pending = None;
        self.reset_session();
        self.state = ConnectionState::Disconnected;
    }

    fn reset_session(&mut self) {
        self.client_id = None;
        self.connect_started = None;
        self.last_heartbeat_ack = None;
        self.rtt_ms = None;
        self.remote.clear();
    }

    fn close(&mut self) {
        if let Some(mut endpoint) = self.endpoint.take() {
            endpoint.shutdown();
            self.retired_stats.merge(endpoint.stats());
        }
        self.pending = None;
        self.reset_session();
    }

    fn fail(&mut self, message: String) {
        log::warn!("Connection error: {}", message);
        self.close();
        self.state = ConnectionState::Error;
        self.last_error = Some(message.clone());
        self.pending_events.push_back(ClientEvent::Error { message });
    }

    fn closed_by_server(&mut self, message: &str) {
        log::info!("{}", message);
        self.close();
        self.state = ConnectionState::Disconnected;
        self.last_error = Some(message.to_string());
        self.pending_events.push_back(ClientEvent::Disconnected);
    }

    /// Drives the connect attempt and reads everything the server sent.
    /// Returns the number of units of work performed.
    pub fn poll(&mut self, world: &mut impl GameWorld, timeout: Duration) -> usize {
        let deadline = Instant::now() + timeout;
        loop {
            let work = self.poll_once(world);
            let now = Instant::now();
            if work > 0 || now >= deadline {
                return work;
            }
            std::thread::sleep(POLL_SLEEP.min(deadline - now));
        }
    }

    fn poll_once(&mut self, world: &mut impl GameWorld) -> usize {
        let mut work = 0;

        if let Some(pending) = self.pending.as_ref() {
            match pending.poll() {
                Ok(Some(stream)) => {
                    self.pending = None;
                    work += 1;
                    self.start_handshake(stream);
                }
                Ok(None) => {}
                Err(e) => {
                    let message = format!("connect to {} failed: {}", pending.addr(), e);
                    self.fail(message);
                    return 1;
                }
            }
        }

        if self.endpoint.is_some() {
            work += self.service_endpoint(world);
        }

        if self.state == ConnectionState::Connecting {
            let started = self.connect_started.unwrap_or_else(Instant::now);
            if started.elapsed() > self.config.connect_timeout {
                self.fail("connection timed out".to_string());
                work += 1;
            }
        } else if self.state == ConnectionState::Connected {
            if let Some(timeout) = self.config.server_timeout {
                if self.last_received.elapsed() > timeout {
                    self.fail("server stopped responding".to_string());
                    work += 1;
                }
            }
        }

        work
    }

    fn start_handshake(&mut self, stream: std::net::TcpStream) {
        let mut endpoint = match StreamEndpoint::new(stream, self.config.max_send_buffer) {
            Ok(endpoint) => endpoint,
            Err(e) => {
                self.fail(format!("socket setup failed: {}", e));
                return;
            }
        };

        let request = Message::ConnectRequest {
            name: self.config.player_name.clone(),
        };
        if let Err(e) = endpoint.send(&request) {
            self.endpoint = Some(endpoint);
            self.fail(format!("handshake send failed: {}", e));
            return;
        }

        log::debug!("Socket connected, handshake sent");
        self.last_received = Instant::now();
        self.endpoint = Some(endpoint);
    }

    fn service_endpoint(&mut self, world: &mut impl GameWorld) -> usize {
        let Some(endpoint) = self.endpoint.as_mut() else {
            return 0;
        };

        if let Err(e) = endpoint.flush() {
            self.fail(format!("send failed: {}", e));
            return 1;
        }

        let outcome = endpoint.read_frames();
        let mut work = outcome.frames.len();

        if !outcome.frames.is_empty() {
            self.last_received = Instant::now();
        }

        for frame in outcome.frames {
            if self.endpoint.is_none() {
                break;
            }
            match frame.decode() {
                Ok(message) => self.handle_message(message, world),
                Err(e) => log::debug!("Skipping frame seq {}: {}", frame.header.sequence, e),
            }
        }

        if self.endpoint.is_none() {
            return work.max(1);
        }

        if let Some(error) = outcome.error {
            self.fail(error.to_string());
            work += 1;
        } else if outcome.closed {
            self.closed_by_server("server closed the connection");
            work += 1;
        }

        work
    }

    fn handle_message(&mut self, message: Message, world: &mut impl GameWorld) {
        match message {
            Message::ConnectAccept {
                client_id,
                world_seed,
                time_of_day,
                player_count,
            } => {
                if self.state != ConnectionState::Connecting {
                    log::debug!("Ignoring accept outside the handshake");
                    return;
                }
                self.client_id = Some(client_id);
                self.world_seed = world_seed;
                self.time_of_day = time_of_day;
                world.set_time_of_day(time_of_day);
                self.state = ConnectionState::Connected;
                self.connect_started = None;
                self.last_heartbeat_sent = Instant::now();
                log::info!(
                    "Connected as player {} ({} players, seed {})",
                    client_id,
                    player_count,
                    world_seed
                );
                self.pending_events
                    .push_back(ClientEvent::Connected { client_id });
            }
            Message::ConnectReject { reason } => {
                if self.state != ConnectionState::Connecting {
                    log::warn!("Server rejected request: {}", reason.as_str());
                    return;
                }
                self.pending_events
                    .push_back(ClientEvent::Rejected { reason });
                self.fail(format!("connection rejected: {}", reason.as_str()));
            }
            Message::Disconnect => self.closed_by_server("disconnected by server"),
            Message::HeartbeatAck { timestamp_ms } => {
                self.last_heartbeat_ack = Some(Instant::now());
                self.rtt_ms = Some(self.clock_ms().wrapping_sub(timestamp_ms));
            }
            Message::PlayerJoin { id, name, position } => {
                if Some(id) == self.client_id {
                    return;
                }
                log::info!("{} joined (player {})", name, id);
                self.joins_seen += 1;
                let serial = self.joins_seen;
                let remote = self.remote_mut(id);
                remote.join_serial = serial;
                remote.active = true;
                remote.name = name.clone();
                remote.state = PlayerState::new(id, position);
                self.pending_events
                    .push_back(ClientEvent::PlayerJoined { id, name });
            }
            Message::PlayerLeave { id } => {
                if Some(id) == self.client_id {
                    return;
                }
                let remote = self.remote_mut(id);
                let was_active = remote.active;
                remote.active = false;
                if was_active {
                    log::info!("{} left (player {})", remote.name, id);
                    self.pending_events.push_back(ClientEvent::PlayerLeft { id });
                }
            }
            Message::PlayerState(state) => self.apply_remote_state(state),
            Message::PlayerStates(states) => {
                for state in states {
                    self.apply_remote_state(state);
                }
            }
            Message::BlockChange(edit) => {
                world.set_block(edit.position, edit.block);
                self.pending_events
                    .push_back(ClientEvent::BlockChanged(edit));
            }
            Message::TimeSync { time_of_day } => {
                self.time_of_day = time_of_day;
                world.set_time_of_day(time_of_day);
            }
            Message::ChunkResponse { data } => {
                log::debug!("Chunk response ({} bytes) not handled", data.len());
            }
            Message::InventorySync { data } => {
                log::debug!("Inventory sync ({} bytes) not handled", data.len());
            }
            other => {
                log::debug!("Unexpected {:?} from server", other.message_type());
            }
        }
    }

    fn apply_remote_state(&mut self, state: PlayerState) {
        if Some(state.id) == self.client_id {
            return;
        }
        self.remote_mut(state.id).state = state;
    }

    fn remote_mut(&mut self, id: u8) -> &mut RemotePlayer {
        let index = id as usize;
        if self.remote.len() <= index {
            self.remote.resize_with(index + 1, RemotePlayer::default);
        }
        &mut self.remote[index]
    }

    fn clock_ms(&self) -> u32 {
        self.clock.elapsed().as_millis() as u32
    }

    /// Sends the local player's state, plus a heartbeat when one is due.
    pub fn tick(&mut self, world: &impl GameWorld) {
        if self.state != ConnectionState::Connected {
            return;
        }
        let Some(client_id) = self.client_id else {
            return;
        };

        let mut state = world.player_state();
        state.id = client_id;
        if let Err(e) = self.send(&Message::PlayerState(state)) {
            self.fail(format!("send failed: {}", e));
            return;
        }

        if self.last_heartbeat_sent.elapsed() >= self.config.heartbeat_interval {
            self.last_heartbeat_sent = Instant::now();
            let heartbeat = Message::Heartbeat {
                timestamp_ms: self.clock_ms(),
            };
            if let Err(e) = self.send(&heartbeat) {
                self.fail(format!("send failed: {}", e));
            }
        }
    }

    fn send(&mut self, message: &Message) -> Result<(), NetError> {
        match self.endpoint.as_mut() {
            Some(endpoint) => endpoint.send(message),
            None => Err(NetError::NotConnected),
        }
    }

    /// Asks the server to change a block. Nothing is applied locally; the
    /// server's echo is the confirmation.
    pub fn broadcast_block_change(&mut self, position: IVec3, block: Block) -> Result<(), NetError> {
        let (ConnectionState::Connected, Some(author_id)) = (self.state, self.client_id) else {
            return Err(NetError::NotConnected);
        };
        let result = self.send(&Message::BlockChange(BlockEdit::new(position, block, author_id)));
        if let Err(ref e) = result {
            if e.is_transport() {
                self.fail(format!("send failed: {}", e));
            }
        }
        result
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    pub fn client_id(&self) -> Option<u8> {
        self.client_id
    }

    pub fn server_addr(&self) -> Option<SocketAddr> {
        self.server_addr
    }

    pub fn world_seed(&self) -> u32 {
        self.world_seed
    }

    pub fn time_of_day(&self) -> f32 {
        self.time_of_day
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn last_heartbeat_ack(&self) -> Option<Instant> {
        self.last_heartbeat_ack
    }

    pub fn rtt_ms(&self) -> Option<u32> {
        self.rtt_ms
    }

    pub fn remote_player(&self, id: u8) -> Option<&RemotePlayer> {
        self.remote.get(id as usize)
    }

    pub fn remote_players(&self) -> impl Iterator<Item = (u8, &RemotePlayer)> {
        self.remote
            .iter()
            .enumerate()
            .filter(|(_, r)| r.active)
            .map(|(id, r)| (id as u8, r))
    }

    pub fn active_remote_ids(&self) -> Vec<u8> {
        self.remote_players().map(|(id, _)| id).collect()
    }

    pub fn remote_position(&self, id: u8) -> Option<Vec3> {
        self.remote_player(id)
            .filter(|r| r.active)
            .map(|r| r.state.position)
    }

    pub fn is_slot_active(&self, id: u8) -> bool {
        if !self.is_connected() {
            return false;
        }
        Some(id) == self.client_id || self.remote_player(id).is_some_and(|r| r.active)
    }

    pub fn slot_name(&self, id: u8) -> Option<&str> {
        if !self.is_connected() {
            return None;
        }
        if Some(id) == self.client_id {
            return Some(&self.config.player_name);
        }
        self.remote_player(id)
            .filter(|r| r.active)
            .map(|r| r.name.as_str())
    }

    /// Participants known to this client, itself included.
    pub fn player_count(&self) -> usize {
        if !self.is_connected() {
            return 0;
        }
        self.remote_players().count() + 1
    }

    pub fn stats(&self) -> NetworkStats {
        let mut stats = self.retired_stats.clone();
        if let Some(endpoint) = self.endpoint.as_ref() {
            stats.merge(endpoint.stats());
        }
        stats
    }

    pub fn drain_events(&mut self) -> impl Iterator<Item = ClientEvent> + '_ {
        self.pending_events.drain(..)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::LocalWorld;

    fn client() -> NetworkClient {
        NetworkClient::new(ClientConfig {
            player_name: "tester".into(),
            ..Default::default()
        })
    }

    #[test]
    fn test_starts_disconnected() {
        let client = client();
        assert_eq!(client.state(), ConnectionState::Disconnected);
        assert_eq!(client.player_count(), 0);
        assert!(client.client_id().is_none());
        assert!(client.last_error().is_none());
    }

    #[test]
    fn test_unresolvable_host_is_error() {
        let mut client = client();
        assert!(client.connect("", 27016).is_err());
        assert_eq!(client.state(), ConnectionState::Error);
        assert!(client.last_error().is_some());
        assert!(matches!(
            client.drain_events().next(),
            Some(ClientEvent::Error { .. })
        ));
    }

    #[test]
    fn test_block_change_requires_connection() {
        let mut client = client();
        let result = client.broadcast_block_change(IVec3::ZERO, Block::new(1, 0));
        assert!(matches!(result, Err(NetError::NotConnected)));
    }

    #[test]
    fn test_tick_while_disconnected_is_noop() {
        let mut client = client();
        let world = LocalWorld::default();
        client.tick(&world);
        assert_eq!(client.stats().packets_sent, 0);
    }

    #[test]
    fn test_batch_skips_own_id() {
        let mut client = client();
        let mut world = LocalWorld::default();
        client.client_id = Some(2);

        let own = PlayerState::new(2, Vec3::new(9.0, 9.0, 9.0));
        let other = PlayerState::new(3, Vec3::new(1.0, 2.0, 3.0));
        client.handle_message(Message::PlayerStates(vec![own, other]), &mut world);

        assert!(
            client
                .remote_player(2)
                .is_none_or(|r| r.state.position != own.position)
        );
        assert_eq!(
            client.remote_player(3).map(|r| r.state.position),
            Some(Vec3::new(1.0, 2.0, 3.0))
        );
        assert!(!client.remote_player(3).unwrap().active);
    }

    #[test]
    fn test_join_and_leave_update_tables() {
        let mut client = client();
        let mut world = LocalWorld::default();
        client.state = ConnectionState::Connected;
        client.client_id = Some(1);

        client.handle_message(
            Message::PlayerJoin {
                id: 0,
                name: "Host".into(),
                position: Vec3::new(0.0, 64.0, 0.0),
            },
            &mut world,
        );
        assert!(client.is_slot_active(0));
        assert!(client.is_slot_active(1));
        assert_eq!(client.slot_name(0), Some("Host"));
        assert_eq!(client.active_remote_ids(), vec![0]);
        assert_eq!(client.player_count(), 2);

        client.handle_message(Message::PlayerLeave { id: 0 }, &mut world);
        assert!(!client.is_slot_active(0));
        assert!(client.active_remote_ids().is_empty());

        let events: Vec<_> = client.drain_events().collect();
        assert_eq!(
            events,
            vec![
                ClientEvent::PlayerJoined {
                    id: 0,
                    name: "Host".into()
                },
                ClientEvent::PlayerLeft { id: 0 },
            ]
        );
    }

    #[test]
    fn test_echo_and_time_sync_apply_to_world() {
        let mut client = client();
        let mut world = LocalWorld::default();
        let edit = BlockEdit::new(IVec3::new(4, 5, 6), Block::new(7, 1), 0);

        client.handle_message(Message::BlockChange(edit), &mut world);
        client.handle_message(Message::TimeSync { time_of_day: 18.5 }, &mut world);

        assert_eq!(world.get_block(IVec3::new(4, 5, 6)), Block::new(7, 1));
        assert_eq!(world.time_of_day(), 18.5);
        assert_eq!(client.time_of_day(), 18.5);
    }
}
