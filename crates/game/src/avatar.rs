use std::collections::HashMap;

use glam::Vec3;

use crate::net::NetworkClient;

/// Whatever the embedding game uses to show other players.
pub trait AvatarSink {
    type Handle: Copy;

    fn spawn_remote_avatar(&mut self, id: u8, name: &str, position: Vec3) -> Self::Handle;
    fn update_avatar(&mut self, handle: Self::Handle, position: Vec3, yaw: f32);
    fn despawn_avatar(&mut self, handle: Self::Handle);
}

#[derive(Debug, Clone, Copy)]
struct Avatar<H> {
    handle: H,
    join_serial: u64,
}

/// Mirrors a client's remote player table into an [`AvatarSink`].
///
/// An id that changed hands between two syncs gets a fresh avatar.
#[derive(Debug)]
pub struct AvatarSync<H> {
    avatars: HashMap<u8, Avatar<H>>,
}

impl<H: Copy> Default for AvatarSync<H> {
    fn default() -> Self {
        Self {
            avatars: HashMap::new(),
        }
    }
}

impl<H: Copy> AvatarSync<H> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.avatars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.avatars.is_empty()
    }

    pub fn handle(&self, id: u8) -> Option<H> {
        self.avatars.get(&id).map(|a| a.handle)
    }

    pub fn sync<S>(&mut self, client: &NetworkClient, sink: &mut S)
    where
        S: AvatarSink<Handle = H>,
    {
        let gone: Vec<u8> = self
            .avatars
            .iter()
            .filter(|(id, avatar)| {
                !client
                    .remote_player(**id)
                    .is_some_and(|r| r.active && r.join_serial == avatar.join_serial)
            })
            .map(|(id, _)| *id)
            .collect();
        for id in gone {
            if let Some(avatar) = self.avatars.remove(&id) {
                sink.despawn_avatar(avatar.handle);
            }
        }

        for (id, remote) in client.remote_players() {
            let avatar = *self.avatars.entry(id).or_insert_with(|| {
                log::debug!("Spawning avatar for player {}", id);
                Avatar {
                    handle: sink.spawn_remote_avatar(id, &remote.name, remote.state.position),
                    join_serial: remote.join_serial,
                }
            });
            sink.update_avatar(avatar.handle, remote.state.position, remote.state.yaw);
        }
    }

    pub fn clear<S>(&mut self, sink: &mut S)
    where
        S: AvatarSink<Handle = H>,
    {
        for (_, avatar) in self.avatars.drain() {
            sink.despawn_avatar(avatar.handle);
        }
    }
}
