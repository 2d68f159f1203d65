use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use glam::Vec3;

use lanblock::net::{ClientSlot, ServerStats};
use lanblock::{GameServer, LocalWorld, ServerConfig, ServerEvent, TickClock};

use crate::simulation::HostWalker;

/// Dedicated host: the session manager plus the host's own world and player.
pub struct HostServer {
    server: GameServer,
    world: LocalWorld,
    walker: HostWalker,
    clock: TickClock,
    hours_per_tick: f32,
    running: Arc<AtomicBool>,
    start_time: Instant,
}

impl HostServer {
    pub fn new(bind_addr: SocketAddr, config: ServerConfig, day_length: Duration) -> io::Result<Self> {
        let tick_rate = config.tick_rate;
        let server = GameServer::new(bind_addr, config)?;

        let spawn = Vec3::new(0.0, 64.0, 0.0);
        let mut world = LocalWorld::new(spawn);
        world.time_of_day = 8.0;

        let ticks_per_day = day_length.as_secs_f32() * tick_rate as f32;
        let hours_per_tick = if ticks_per_day > 0.0 {
            24.0 / ticks_per_day
        } else {
            0.0
        };

        Ok(Self {
            server,
            world,
            walker: HostWalker::new(spawn),
            clock: TickClock::new(tick_rate),
            hours_per_tick,
            running: Arc::new(AtomicBool::new(true)),
            start_time: Instant::now(),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.server.local_addr()
    }

    pub fn running(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    pub fn run(&mut self) {
        while self.running.load(Ordering::SeqCst) {
            self.tick_once();
            for event in self.server.drain_events() {
                log_event(&event);
            }
            std::thread::sleep(self.clock.until_next().min(Duration::from_millis(5)));
        }
        self.server.shutdown();
    }

    pub fn tick_once(&mut self) {
        self.server.poll(&mut self.world, Duration::ZERO);

        self.clock.update();
        while self.clock.consume_tick() {
            self.tick();
        }
    }

    fn tick(&mut self) {
        self.world.advance_time(self.hours_per_tick);
        self.walker.step(&mut self.world, self.clock.interval().as_secs_f32());
        self.server.tick(&mut self.world);
    }

    pub fn kick_client(&mut self, slot: u8) {
        self.server.kick_client(slot);
    }

    pub fn shutdown(&mut self) {
        self.server.shutdown();
    }

    pub fn drain_events(&mut self) -> impl Iterator<Item = ServerEvent> + '_ {
        self.server.drain_events()
    }

    pub fn slots(&self) -> Vec<SlotInfo> {
        self.server
            .slots()
            .filter(|s| s.state() != lanblock::net::SlotState::Empty)
            .map(SlotInfo::from_slot)
            .collect()
    }

    pub fn stats(&self) -> HostStats {
        HostStats {
            uptime_secs: self.start_time.elapsed().as_secs(),
            time_of_day: self.world.time_of_day,
            blocks: self.world.block_count(),
            server: self.server.stats(),
        }
    }
}

pub fn log_event(event: &ServerEvent) {
    match event {
        ServerEvent::ClientConnected { slot, addr } => {
            log::info!("Slot {} opened for {}", slot, addr);
        }
        ServerEvent::ClientAuthenticated { slot, name } => {
            log::info!("{} authenticated on slot {}", name, slot);
        }
        ServerEvent::ClientDisconnected { slot, reason } => {
            log::info!("Slot {} {}", slot, reason.as_str());
        }
        ServerEvent::ConnectionRefused { addr } => {
            log::warn!("Refused {}: server full", addr);
        }
        ServerEvent::BlockEditRejected {
            slot,
            position,
            distance,
        } => {
            log::warn!(
                "Slot {} edit at {} rejected ({:.1} away)",
                slot,
                position,
                distance
            );
        }
        ServerEvent::Error { message } => log::error!("{}", message),
    }
}

#[derive(Debug, Clone)]
pub struct SlotInfo {
    pub id: u8,
    pub name: String,
    pub addr: Option<SocketAddr>,
    pub authenticated: bool,
    pub position: Vec3,
    pub connected_secs: u64,
    pub last_heartbeat_ms: u128,
}

impl SlotInfo {
    fn from_slot(slot: &ClientSlot) -> Self {
        Self {
            id: slot.id(),
            name: slot.name().to_string(),
            addr: slot.addr(),
            authenticated: slot.is_active(),
            position: slot.player_state().position,
            connected_secs: slot.connected_secs(),
            last_heartbeat_ms: slot.last_heartbeat().elapsed().as_millis(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HostStats {
    pub uptime_secs: u64,
    pub time_of_day: f32,
    pub blocks: usize,
    pub server: ServerStats,
}
