use std::time::Duration;

use glam::IVec3;

use super::client::NetworkClient;
use super::error::NetError;
use super::events::SessionEvent;
use super::server::GameServer;
use crate::world::{Block, GameWorld};

/// The role this process plays in a session.
#[derive(Default)]
pub enum Multiplayer {
    #[default]
    Offline,
    Hosting(GameServer),
    Client(NetworkClient),
}

impl Multiplayer {
    pub fn is_hosting(&self) -> bool {
        matches!(self, Multiplayer::Hosting(_))
    }

    pub fn is_client(&self) -> bool {
        matches!(self, Multiplayer::Client(_))
    }

    pub fn server(&self) -> Option<&GameServer> {
        match self {
            Multiplayer::Hosting(server) => Some(server),
            _ => None,
        }
    }

    pub fn client(&self) -> Option<&NetworkClient> {
        match self {
            Multiplayer::Client(client) => Some(client),
            _ => None,
        }
    }

    pub fn server_mut(&mut self) -> Option<&mut GameServer> {
        match self {
            Multiplayer::Hosting(server) => Some(server),
            _ => None,
        }
    }

    pub fn client_mut(&mut self) -> Option<&mut NetworkClient> {
        match self {
            Multiplayer::Client(client) => Some(client),
            _ => None,
        }
    }

    /// Takes every event queued by the active role since the last call.
    pub fn drain_events(&mut self) -> Vec<SessionEvent> {
        match self {
            Multiplayer::Offline => Vec::new(),
            Multiplayer::Hosting(server) => {
                server.drain_events().map(SessionEvent::Server).collect()
            }
            Multiplayer::Client(client) => {
                client.drain_events().map(SessionEvent::Client).collect()
            }
        }
    }

    pub fn player_count(&self) -> usize {
        match self {
            Multiplayer::Offline => 1,
            Multiplayer::Hosting(server) => server.player_count(),
            Multiplayer::Client(client) => client.player_count(),
        }
    }

    pub fn is_slot_active(&self, id: u8) -> bool {
        match self {
            Multiplayer::Offline => false,
            Multiplayer::Hosting(server) => server.is_slot_active(id),
            Multiplayer::Client(client) => client.is_slot_active(id),
        }
    }

    pub fn slot_name(&self, id: u8) -> Option<&str> {
        match self {
            Multiplayer::Offline => None,
            Multiplayer::Hosting(server) => server.slot_name(id),
            Multiplayer::Client(client) => client.slot_name(id),
        }
    }

    /// Offline and hosting apply the edit straight away; a client only
    /// sends the request and waits for the server's echo.
    pub fn broadcast_block_change(
        &mut self,
        world: &mut impl GameWorld,
        position: IVec3,
        block: Block,
    ) -> Result<(), NetError> {
        match self {
            Multiplayer::Offline => {
                world.set_block(position, block);
                Ok(())
            }
            Multiplayer::Hosting(server) => {
                server.broadcast_block_change(world, position, block);
                Ok(())
            }
            Multiplayer::Client(client) => client.broadcast_block_change(position, block),
        }
    }

    pub fn poll(&mut self, world: &mut impl GameWorld, timeout: Duration) -> usize {
        match self {
            Multiplayer::Offline => 0,
            Multiplayer::Hosting(server) => server.poll(world, timeout),
            Multiplayer::Client(client) => client.poll(world, timeout),
        }
    }

    pub fn tick(&mut self, world: &mut impl GameWorld) {
        match self {
            Multiplayer::Offline => {}
            Multiplayer::Hosting(server) => server.tick(world),
            Multiplayer::Client(client) => client.tick(&*world),
        }
    }

    /// Leaves the session, telling the other side where possible.
    pub fn shutdown(&mut self) {
        match self {
            Multiplayer::Offline => {}
            Multiplayer::Hosting(server) => server.shutdown(),
            Multiplayer::Client(client) => client.disconnect(),
        }
        *self = Multiplayer::Offline;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    use glam::Vec3;

    use crate::net::{ClientConfig, ClientEvent, ServerConfig, ServerEvent};
    use crate::world::LocalWorld;

    #[test]
    fn test_offline_edits_apply_locally() {
        let mut mp = Multiplayer::default();
        let mut world = LocalWorld::default();
        mp.broadcast_block_change(&mut world, IVec3::new(0, 1, 0), Block::new(3, 0))
            .unwrap();
        assert_eq!(world.get_block(IVec3::new(0, 1, 0)), Block::new(3, 0));
        assert!(!mp.is_hosting());
        assert!(!mp.is_client());
        assert_eq!(mp.player_count(), 1);
    }

    #[test]
    fn test_hosting_role() {
        let server = GameServer::new("127.0.0.1:0".parse().unwrap(), ServerConfig::default())
            .unwrap();
        let mut mp = Multiplayer::Hosting(server);
        assert!(mp.is_hosting());
        assert!(mp.is_slot_active(0));
        assert_eq!(mp.slot_name(0), Some("Host"));
        assert!(!mp.is_slot_active(1));

        mp.shutdown();
        assert!(!mp.is_hosting());
    }

    #[test]
    fn test_disconnected_client_edit_fails() {
        let mut mp = Multiplayer::Client(NetworkClient::new(ClientConfig::default()));
        let mut world = LocalWorld::default();
        let result = mp.broadcast_block_change(&mut world, IVec3::ZERO, Block::new(1, 0));
        assert!(result.is_err());
        assert!(world.get_block(IVec3::ZERO).is_air());
        assert_eq!(mp.player_count(), 0);
    }

    #[test]
    fn test_events_drain_through_facade() {
        let server = GameServer::new("127.0.0.1:0".parse().unwrap(), ServerConfig::default())
            .unwrap();
        let port = server.local_addr().port();
        let mut host = Multiplayer::Hosting(server);
        let mut host_world = LocalWorld::new(Vec3::new(0.0, 64.0, 0.0));

        let mut client = NetworkClient::new(ClientConfig::default());
        client.connect("127.0.0.1", port).unwrap();
        let mut guest = Multiplayer::Client(client);
        let mut guest_world = LocalWorld::default();

        let mut host_events = Vec::new();
        let mut guest_events = Vec::new();
        let deadline = Instant::now() + Duration::from_secs(3);
        while !guest_events.contains(&SessionEvent::Client(ClientEvent::Connected { client_id: 1 }))
            && Instant::now() < deadline
        {
            host.poll(&mut host_world, Duration::from_millis(1));
            guest.poll(&mut guest_world, Duration::from_millis(1));
            host_events.extend(host.drain_events());
            guest_events.extend(guest.drain_events());
        }

        assert!(guest.client().unwrap().is_connected());
        assert!(host_events.contains(&SessionEvent::Server(ServerEvent::ClientAuthenticated {
            slot: 1,
            name: "Player".into()
        })));

        let pos = IVec3::new(1, 63, 0);
        host.broadcast_block_change(&mut host_world, pos, Block::new(2, 0))
            .unwrap();
        let deadline = Instant::now() + Duration::from_secs(3);
        let mut changed = false;
        while !changed && Instant::now() < deadline {
            host.poll(&mut host_world, Duration::from_millis(1));
            guest.poll(&mut guest_world, Duration::from_millis(1));
            changed = guest
                .drain_events()
                .iter()
                .any(|e| matches!(e, SessionEvent::Client(ClientEvent::BlockChanged(_))));
        }

        assert!(changed);
        assert!(guest.drain_events().is_empty());
        assert!(guest.client_mut().is_some());
        assert!(host.server_mut().is_some());
        assert!(Multiplayer::Offline.drain_events().is_empty());
    }
}
