mod host;
mod simulation;
mod tui;

use std::io;
use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::terminal::{self, EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::{cursor, execute};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;

use host::HostServer;
use lanblock::{ServerConfig, ServerEvent};
use tui::TuiState;

#[derive(Parser)]
#[command(name = "lanblock-server")]
#[command(about = "LAN block world host")]
struct Args {
    #[arg(short, long, default_value = "0.0.0.0")]
    bind: String,

    #[arg(short, long, default_value_t = lanblock::DEFAULT_PORT)]
    port: u16,

    #[arg(short, long, default_value_t = lanblock::DEFAULT_TICK_RATE)]
    tick_rate: u32,

    #[arg(short, long, default_value_t = lanblock::MAX_PLAYERS, help = "Slots including the host")]
    max_players: usize,

    #[arg(short, long, default_value_t = 0)]
    seed: u32,

    #[arg(short, long, default_value = "Host")]
    name: String,

    #[arg(long, default_value_t = 8.0)]
    reach: f32,

    #[arg(long, default_value_t = 10, help = "Seconds of silence before a slot is dropped, 0 to disable")]
    heartbeat_timeout: u64,

    #[arg(long, default_value_t = 1200, help = "Real seconds per in-game day")]
    day_length: u64,

    #[arg(long)]
    headless: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let bind_addr: SocketAddr = format!("{}:{}", args.bind, args.port)
        .parse()
        .with_context(|| format!("invalid bind address {}:{}", args.bind, args.port))?;

    let config = ServerConfig {
        max_players: args.max_players,
        tick_rate: args.tick_rate,
        world_seed: args.seed,
        host_name: args.name,
        reach_distance: args.reach,
        heartbeat_timeout: (args.heartbeat_timeout > 0)
            .then(|| Duration::from_secs(args.heartbeat_timeout)),
        ..Default::default()
    };

    if args.headless {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    }

    let mut server = HostServer::new(bind_addr, config, Duration::from_secs(args.day_length))
        .context("failed to start server")?;

    if args.headless {
        log::info!("Server started on {}", server.local_addr());
        server.run();
        log::info!("Server shutting down");
    } else {
        run_with_tui(&mut server)?;
    }

    Ok(())
}

fn run_with_tui(server: &mut HostServer) -> io::Result<()> {
    terminal::enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, cursor::Hide)?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let running = server.running();
    let mut tui_state = TuiState::new();

    tui_state.log_info(format!("Server started on {}", server.local_addr()));

    while running.load(Ordering::SeqCst) {
        server.tick_once();

        for event in server.drain_events() {
            match event {
                ServerEvent::ClientConnected { slot, addr } => {
                    tui_state.log_info(format!("Slot {} opened for {}", slot, addr));
                }
                ServerEvent::ClientAuthenticated { slot, name } => {
                    tui_state.log_info(format!("{} joined on slot {}", name, slot));
                }
                ServerEvent::ClientDisconnected { slot, reason } => {
                    tui_state.log_info(format!("Slot {} {}", slot, reason.as_str()));
                }
                ServerEvent::ConnectionRefused { addr } => {
                    tui_state.log_warn(format!("Refused {}: server full", addr));
                }
                ServerEvent::BlockEditRejected {
                    slot,
                    position,
                    distance,
                } => {
                    tui_state.log_warn(format!(
                        "Slot {} edit at {} out of reach ({:.1})",
                        slot, position, distance
                    ));
                }
                ServerEvent::Error { message } => {
                    tui_state.log_error(message);
                }
            }
        }

        if let Some(slot) = tui_state.take_pending_kick() {
            server.kick_client(slot);
        }

        let slots = server.slots();

        if event::poll(Duration::from_millis(1))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    match key.code {
                        KeyCode::Char('q') | KeyCode::Esc => {
                            running.store(false, Ordering::SeqCst);
                        }
                        KeyCode::Up => tui_state.select_prev(slots.len()),
                        KeyCode::Down => tui_state.select_next(slots.len()),
                        KeyCode::Char('k') | KeyCode::Char('K') => tui_state.request_kick(&slots),
                        _ => {}
                    }
                }
            }
        }

        let stats = server.stats();
        terminal.draw(|frame| {
            tui::render(frame, &tui_state, &stats, &slots);
        })?;
    }

    tui_state.log_info("Shutting down...");
    server.shutdown();

    terminal::disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, cursor::Show)?;

    Ok(())
}
