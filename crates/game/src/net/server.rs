use std::collections::VecDeque;
use std::io;
use std::net::{SocketAddr, TcpListener};
use std::time::{Duration, Instant};

use glam::IVec3;

use super::config::ServerConfig;
use super::error::NetError;
use super::events::{DisconnectReason, ServerEvent};
use super::framer::RawFrame;
use super::protocol::{BlockEdit, Message, PlayerState, RejectReason};
use super::transport::{NetworkStats, StreamEndpoint, create_listener};
use crate::world::{Block, GameWorld};

pub const HOST_SLOT: u8 = 0;

const POLL_SLEEP: Duration = Duration::from_millis(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    Empty,
    Connected,
    Authenticated,
}

#[derive(Debug)]
pub struct ClientSlot {
    id: u8,
    state: SlotState,
    name: String,
    addr: Option<SocketAddr>,
    player_state: PlayerState,
    last_heartbeat: Instant,
    connected_at: Instant,
    endpoint: Option<StreamEndpoint>,
}

impl ClientSlot {
    fn empty(id: u8) -> Self {
        Self {
            id,
            state: SlotState::Empty,
            name: String::new(),
            addr: None,
            player_state: PlayerState::new(id, glam::Vec3::ZERO),
            last_heartbeat: Instant::now(),
            connected_at: Instant::now(),
            endpoint: None,
        }
    }

    fn reset(&mut self) -> Option<StreamEndpoint> {
        let endpoint = self.endpoint.take();
        *self = Self::empty(self.id);
        endpoint
    }

    pub fn id(&self) -> u8 {
        self.id
    }

    pub fn state(&self) -> SlotState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == SlotState::Authenticated
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn addr(&self) -> Option<SocketAddr> {
        self.addr
    }

    pub fn player_state(&self) -> &PlayerState {
        &self.player_state
    }

    pub fn last_heartbeat(&self) -> Instant {
        self.last_heartbeat
    }

    pub fn connected_secs(&self) -> u64 {
        self.connected_at.elapsed().as_secs()
    }

    pub fn stats(&self) -> Option<&NetworkStats> {
        self.endpoint.as_ref().map(|e| e.stats())
    }
}

/// Authoritative host: owns the listener and the fixed slot table.
///
/// Slot 0 is the host's own player and never has a socket. Every other slot
/// goes `Empty -> Connected -> Authenticated -> Empty`. Everything runs on
/// the caller's thread from [`GameServer::poll`] and [`GameServer::tick`].
pub struct GameServer {
    listener: TcpListener,
    local_addr: SocketAddr,
    config: ServerConfig,
    slots: Vec<ClientSlot>,
    authenticated: usize,
    tick: u32,
    retired_stats: NetworkStats,
    pending_events: VecDeque<ServerEvent>,
}

impl GameServer {
    pub fn new(bind_addr: SocketAddr, config: ServerConfig) -> io::Result<Self> {
        if !(2..=u8::MAX as usize).contains(&config.max_players) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("max_players must be 2..=255, got {}", config.max_players),
            ));
        }

        let listener = create_listener(bind_addr)?;
        let local_addr = listener.local_addr()?;

        let mut slots: Vec<ClientSlot> = (0..config.max_players)
            .map(|id| ClientSlot::empty(id as u8))
            .collect();
        slots[HOST_SLOT as usize].state = SlotState::Authenticated;
        slots[HOST_SLOT as usize].name = config.host_name.clone();

        log::info!(
            "Hosting on {} ({} slots, seed {})",
            local_addr,
            config.max_players,
            config.world_seed
        );

        Ok(Self {
            listener,
            local_addr,
            config,
            slots,
            authenticated: 0,
            tick: 0,
            retired_stats: NetworkStats::default(),
            pending_events: VecDeque::new(),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn tick_count(&self) -> u32 {
        self.tick
    }

    /// Authenticated remote clients, not counting the host.
    pub fn authenticated_count(&self) -> usize {
        self.authenticated
    }

    /// Everyone in the game, host included.
    pub fn player_count(&self) -> usize {
        self.authenticated + 1
    }

    pub fn is_slot_active(&self, id: u8) -> bool {
        self.slots.get(id as usize).is_some_and(|s| s.is_active())
    }

    pub fn slot_name(&self, id: u8) -> Option<&str> {
        self.slots
            .get(id as usize)
            .filter(|s| s.is_active())
            .map(|s| s.name.as_str())
    }

    pub fn slot(&self, id: u8) -> Option<&ClientSlot> {
        self.slots.get(id as usize)
    }

    pub fn slots(&self) -> impl Iterator<Item = &ClientSlot> {
        self.slots.iter()
    }

    pub fn drain_events(&mut self) -> impl Iterator<Item = ServerEvent> + '_ {
        self.pending_events.drain(..)
    }

    pub fn stats(&self) -> ServerStats {
        let mut network_stats = self.retired_stats.clone();
        for slot in &self.slots {
            if let Some(stats) = slot.stats() {
                network_stats.merge(stats);
            }
        }
        ServerStats {
            tick: self.tick,
            player_count: self.player_count(),
            max_players: self.config.max_players,
            network_stats,
        }
    }

    /// Services the listener and every client socket once. With a non-zero
    /// `timeout` the pass repeats until some work was done or the timeout
    /// runs out. Returns the number of units of work performed.
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

        if self.accept_one() {
            work += 1;
        }

        for index in 1..self.slots.len() {
            work += self.service_slot(index as u8, world);
        }

        work
    }

    fn accept_one(&mut self) -> bool {
        let (stream, addr) = match self.listener.accept() {
            Ok(accepted) => accepted,
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => return false,
            Err(e) => {
                log::warn!("Accept failed: {}", e);
                self.pending_events.push_back(ServerEvent::Error {
                    message: format!("Accept failed: {}", e),
                });
                return false;
            }
        };

        let Some(id) = self.free_slot() else {
            log::warn!("Server full, refusing {}", addr);
            drop(stream);
            self.pending_events
                .push_back(ServerEvent::ConnectionRefused { addr });
            return true;
        };

        let endpoint = match StreamEndpoint::new(stream, self.config.max_send_buffer) {
            Ok(endpoint) => endpoint,
            Err(e) => {
                log::warn!("Failed to set up connection from {}: {}", addr, e);
                self.pending_events.push_back(ServerEvent::Error {
                    message: format!("Failed to set up connection from {}: {}", addr, e),
                });
                return true;
            }
        };

        let slot = &mut self.slots[id as usize];
        slot.state = SlotState::Connected;
        slot.addr = Some(addr);
        slot.endpoint = Some(endpoint);
        slot.last_heartbeat = Instant::now();
        slot.connected_at = Instant::now();

        log::info!("Connection from {} assigned slot {}", addr, id);
        self.pending_events
            .push_back(ServerEvent::ClientConnected { slot: id, addr });
        true
    }

    fn free_slot(&self) -> Option<u8> {
        self.slots
            .iter()
            .skip(1)
            .find(|s| s.state == SlotState::Empty)
            .map(|s| s.id)
    }

    fn service_slot(&mut self, id: u8, world: &mut impl GameWorld) -> usize {
        let Some(endpoint) = self.slots[id as usize].endpoint.as_mut() else {
            return 0;
        };

        if let Err(e) = endpoint.flush() {
            self.disconnect_slot(id, DisconnectReason::TransportError, Some(e.to_string()));
            return 1;
        }

        let outcome = endpoint.read_frames();
        let mut work = outcome.frames.len();

        for frame in outcome.frames {
            if self.slots[id as usize].state == SlotState::Empty {
                break;
            }
            self.handle_frame(id, frame, world);
        }

        if self.slots[id as usize].state == SlotState::Empty {
            return work.max(1);
        }

        if let Some(error) = outcome.error {
            let reason = if error.is_transport() {
                DisconnectReason::TransportError
            } else {
                DisconnectReason::ProtocolError
            };
            self.disconnect_slot(id, reason, Some(error.to_string()));
            work += 1;
        } else if outcome.closed {
            self.disconnect_slot(id, DisconnectReason::Closed, None);
            work += 1;
        }

        work
    }

    fn handle_frame(&mut self, id: u8, frame: RawFrame, world: &mut impl GameWorld) {
        self.slots[id as usize].last_heartbeat = Instant::now();

        let message = match frame.decode() {
            Ok(message) => message,
            Err(e) => {
                log::debug!(
                    "Slot {}: skipping frame seq {}: {}",
                    id,
                    frame.header.sequence,
                    e
                );
                return;
            }
        };

        match message {
            Message::ConnectRequest { name } => self.handle_connect_request(id, name, world),
            Message::Disconnect => {
                self.disconnect_slot(id, DisconnectReason::Graceful, None);
            }
            Message::Heartbeat { timestamp_ms } => {
                self.send_to(id, &Message::HeartbeatAck { timestamp_ms });
            }
            other if !self.slots[id as usize].is_active() => {
                log::debug!(
                    "Slot {}: ignoring {:?} before handshake",
                    id,
                    other.message_type()
                );
            }
            Message::PlayerState(mut state) => {
                state.id = id;
                self.slots[id as usize].player_state = state;
            }
            Message::BlockChange(edit) => self.handle_block_change(id, edit, world),
            Message::ChunkRequest { chunk } => {
                log::debug!("Slot {}: chunk request for {} not served", id, chunk);
            }
            other => {
                log::debug!(
                    "Slot {}: unexpected {:?} from client",
                    id,
                    other.message_type()
                );
            }
        }
    }

    fn handle_connect_request(&mut self, id: u8, name: String, world: &mut impl GameWorld) {
        if self.slots[id as usize].is_active() {
            log::debug!("Slot {}: repeated handshake", id);
            self.send_to(
                id,
                &Message::ConnectReject {
                    reason: RejectReason::AlreadyAuthenticated,
                },
            );
            return;
        }

        let name = name.trim().to_string();
        if name.is_empty() {
            log::warn!("Slot {}: rejecting empty player name", id);
            self.send_to(
                id,
                &Message::ConnectReject {
                    reason: RejectReason::InvalidName,
                },
            );
            self.disconnect_slot(id, DisconnectReason::Kicked, Some("invalid name".into()));
            return;
        }

        let spawn = world.player_state().position;
        {
            let slot = &mut self.slots[id as usize];
            slot.state = SlotState::Authenticated;
            slot.name = name.clone();
            slot.player_state = PlayerState::new(id, spawn);
        }
        self.authenticated += 1;

        self.send_to(
            id,
            &Message::ConnectAccept {
                client_id: id,
                world_seed: self.config.world_seed,
                time_of_day: world.time_of_day(),
                player_count: self.player_count() as u8,
            },
        );

        // Existing participants, so the newcomer can name them straight away.
        let existing: Vec<Message> = self
            .slots
            .iter()
            .filter(|s| s.is_active() && s.id != id)
            .map(|s| Message::PlayerJoin {
                id: s.id,
                name: s.name.clone(),
                position: if s.id == HOST_SLOT {
                    world.player_state().position
                } else {
                    s.player_state.position
                },
            })
            .collect();
        for join in &existing {
            self.send_to(id, join);
        }

        self.broadcast(
            &Message::PlayerJoin {
                id,
                name: name.clone(),
                position: spawn,
            },
            Some(id),
        );

        log::info!(
            "{} joined as slot {} ({} players)",
            name,
            id,
            self.player_count()
        );
        self.pending_events
            .push_back(ServerEvent::ClientAuthenticated { slot: id, name });
    }

    fn handle_block_change(&mut self, id: u8, edit: BlockEdit, world: &mut impl GameWorld) {
        let origin = self.slots[id as usize].player_state.position;
        let distance = edit.distance_to(origin);
        if !distance.is_finite() || distance > self.config.reach_distance {
            log::warn!(
                "Slot {}: edit at {} is {:.1} blocks away, ignoring",
                id,
                edit.position,
                distance
            );
            self.pending_events.push_back(ServerEvent::BlockEditRejected {
                slot: id,
                position: edit.position,
                distance,
            });
            return;
        }

        let edit = BlockEdit {
            author_id: id,
            ..edit
        };
        world.set_block(edit.position, edit.block);
        self.broadcast(&Message::BlockChange(edit), None);
    }

    /// Applies a host-side edit and sends it to every client.
    pub fn broadcast_block_change(
        &mut self,
        world: &mut impl GameWorld,
        position: IVec3,
        block: Block,
    ) {
        world.set_block(position, block);
        self.broadcast(
            &Message::BlockChange(BlockEdit::new(position, block, HOST_SLOT)),
            None,
        );
    }

    /// One synchronisation tick: refreshes the host's slot, sends the batched
    /// player states, periodically syncs the clock and drops silent slots.
    pub fn tick(&mut self, world: &mut impl GameWorld) {
        self.tick = self.tick.wrapping_add(1);

        let mut host = world.player_state();
        host.id = HOST_SLOT;
        self.slots[HOST_SLOT as usize].player_state = host;

        if self.authenticated > 0 {
            let states: Vec<PlayerState> = self
                .slots
                .iter()
                .filter(|s| s.is_active())
                .map(|s| s.player_state)
                .collect();
            self.broadcast(&Message::PlayerStates(states), None);

            let interval = self.config.time_sync_interval_ticks;
            if interval > 0 && self.tick % interval == 0 {
                self.broadcast(
                    &Message::TimeSync {
                        time_of_day: world.time_of_day(),
                    },
                    None,
                );
            }
        }

        if let Some(timeout) = self.config.heartbeat_timeout {
            let silent: Vec<u8> = self
                .slots
                .iter()
                .skip(1)
                .filter(|s| s.state != SlotState::Empty && s.last_heartbeat.elapsed() > timeout)
                .map(|s| s.id)
                .collect();
            for id in silent {
                self.disconnect_slot(id, DisconnectReason::Timeout, None);
            }
        }
    }

    fn send_to(&mut self, id: u8, message: &Message) {
        let Some(endpoint) = self.slots[id as usize].endpoint.as_mut() else {
            return;
        };
        match endpoint.send(message) {
            Ok(()) => {}
            Err(NetError::Packet(e)) => {
                log::warn!(
                    "Slot {}: could not encode {:?}: {}",
                    id,
                    message.message_type(),
                    e
                );
            }
            Err(e) => {
                self.disconnect_slot(id, DisconnectReason::TransportError, Some(e.to_string()));
            }
        }
    }

    fn broadcast(&mut self, message: &Message, except: Option<u8>) {
        for index in 1..self.slots.len() {
            let id = index as u8;
            if Some(id) == except || !self.slots[index].is_active() {
                continue;
            }
            self.send_to(id, message);
        }
    }

    fn disconnect_slot(&mut self, id: u8, reason: DisconnectReason, detail: Option<String>) {
        if id == HOST_SLOT {
            return;
        }
        let slot = &mut self.slots[id as usize];
        if slot.state == SlotState::Empty {
            return;
        }

        let was_active = slot.is_active();
        let name = std::mem::take(&mut slot.name);
        let addr = slot.addr;
        if let Some(mut endpoint) = slot.reset() {
            endpoint.shutdown();
            self.retired_stats.merge(endpoint.stats());
        }

        match &detail {
            Some(detail) => log::info!(
                "Slot {} ({:?}) {}: {}",
                id,
                addr,
                reason.as_str(),
                detail
            ),
            None => log::info!("Slot {} ({:?}) {}", id, addr, reason.as_str()),
        }

        if was_active {
            self.authenticated -= 1;
            log::info!("{} left ({} players)", name, self.player_count());
            self.broadcast(&Message::PlayerLeave { id }, None);
        }

        self.pending_events
            .push_back(ServerEvent::ClientDisconnected { slot: id, reason });
    }

    pub fn kick_client(&mut self, id: u8) {
        if id == HOST_SLOT || self.slots.get(id as usize).is_none() {
            return;
        }
        self.send_to(id, &Message::Disconnect);
        self.disconnect_slot(id, DisconnectReason::Kicked, None);
    }

    pub fn shutdown(&mut self) {
        for index in 1..self.slots.len() {
            if self.slots[index].state != SlotState::Empty {
                self.kick_client(index as u8);
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerStats {
    pub tick: u32,
    pub player_count: usize,
    pub max_players: usize,
    pub network_stats: NetworkStats,
}
