mod bot;

use std::time::{Duration, Instant};

use anyhow::{Result, bail};
use clap::Parser;
use glam::Vec3;

use bot::Bot;
use lanblock::{
    ClientConfig, ClientEvent, ConnectionState, GameWorld, LocalWorld, NetworkClient, TickClock,
};

#[derive(Parser)]
#[command(name = "lanblock-client")]
#[command(about = "Headless LAN block world client")]
struct Args {
    #[arg(short, long, default_value = "127.0.0.1")]
    server: String,

    #[arg(short, long, default_value_t = lanblock::DEFAULT_PORT)]
    port: u16,

    #[arg(short, long, default_value = "Player")]
    name: String,

    #[arg(short, long, default_value_t = lanblock::DEFAULT_TICK_RATE)]
    tick_rate: u32,

    #[arg(long, default_value_t = 2.0, help = "Seconds between block edits, 0 to disable")]
    edit_interval: f32,

    #[arg(long, default_value_t = 1)]
    block_type: u16,

    #[arg(long, help = "Disconnect after this many seconds")]
    duration: Option<u64>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let config = ClientConfig {
        player_name: args.name.clone(),
        ..Default::default()
    };

    let spawn = Vec3::new(0.0, 64.0, 0.0);
    let mut world = LocalWorld::new(spawn);
    let mut client = NetworkClient::new(config);
    client.connect(&args.server, args.port)?;

    let mut clock = TickClock::new(args.tick_rate);
    let mut bot: Option<Bot> = None;
    let edit_interval = Duration::from_secs_f32(args.edit_interval.max(0.0));
    let mut last_edit = Instant::now();
    let started = Instant::now();

    loop {
        client.poll(&mut world, Duration::ZERO);

        for event in client.drain_events() {
            match event {
                ClientEvent::Connected { client_id } => {
                    bot = Some(Bot::new(world.player.position, args.block_type));
                    log::info!("Playing as {} (player {})", args.name, client_id);
                }
                ClientEvent::Rejected { reason } => {
                    log::warn!("Rejected: {}", reason.as_str());
                }
                ClientEvent::PlayerJoined { id, name } => {
                    log::info!("{} is here (player {})", name, id);
                }
                ClientEvent::PlayerLeft { id } => {
                    log::info!("Player {} left", id);
                }
                ClientEvent::BlockChanged(edit) => {
                    log::debug!(
                        "Block at {} is now {} (by player {})",
                        edit.position,
                        edit.block.block_type,
                        edit.author_id
                    );
                }
                ClientEvent::Disconnected => {}
                ClientEvent::Error { message } => log::error!("{}", message),
            }
        }

        match client.state() {
            ConnectionState::Error => {
                bail!(
                    "connection failed: {}",
                    client.last_error().unwrap_or("unknown error")
                );
            }
            ConnectionState::Disconnected => {
                log::info!(
                    "Connection closed: {}",
                    client.last_error().unwrap_or("no reason given")
                );
                return Ok(());
            }
            ConnectionState::Connecting | ConnectionState::Connected => {}
        }

        clock.update();
        while clock.consume_tick() {
            if let Some(bot) = bot.as_mut() {
                bot.step(&mut world, clock.interval().as_secs_f32());

                if !edit_interval.is_zero() && last_edit.elapsed() >= edit_interval {
                    last_edit = Instant::now();
                    let (position, block) = bot.next_edit(&world);
                    if let Err(e) = client.broadcast_block_change(position, block) {
                        log::warn!("Edit at {} not sent: {}", position, e);
                    }
                }
            }
            client.tick(&world);
        }

        std::thread::sleep(clock.until_next().min(Duration::from_millis(5)));

        if let Some(limit) = args.duration {
            if started.elapsed() >= Duration::from_secs(limit) {
                log::info!(
                    "Leaving after {}s, {} players seen, time of day {:.1}",
                    limit,
                    client.player_count(),
                    world.time_of_day()
                );
                client.disconnect();
                return Ok(());
            }
        }
    }
}
