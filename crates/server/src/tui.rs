use std::collections::VecDeque;

use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Gauge, Paragraph, Row, Table};

use crate::host::{HostStats, SlotInfo};

const MAX_LOG_LINES: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LogLevel {
    Info,
    Warn,
    Error,
}

pub struct TuiState {
    logs: VecDeque<(LogLevel, String)>,
    selected: usize,
    pending_kick: Option<u8>,
}

impl TuiState {
    pub fn new() -> Self {
        Self {
            logs: VecDeque::new(),
            selected: 0,
            pending_kick: None,
        }
    }

    fn push_log(&mut self, level: LogLevel, message: String) {
        if self.logs.len() >= MAX_LOG_LINES {
            self.logs.pop_front();
        }
        self.logs.push_back((level, message));
    }

    pub fn log_info(&mut self, message: impl Into<String>) {
        self.push_log(LogLevel::Info, message.into());
    }

    pub fn log_warn(&mut self, message: impl Into<String>) {
        self.push_log(LogLevel::Warn, message.into());
    }

    pub fn log_error(&mut self, message: impl Into<String>) {
        self.push_log(LogLevel::Error, message.into());
    }

    pub fn select_prev(&mut self, count: usize) {
        if count > 0 {
            self.selected = (self.selected + count - 1) % count;
        }
    }

    pub fn select_next(&mut self, count: usize) {
        if count > 0 {
            self.selected = (self.selected + 1) % count;
        }
    }

    pub fn request_kick(&mut self, slots: &[SlotInfo]) {
        if let Some(slot) = slots.get(self.selected) {
            self.pending_kick = Some(slot.id);
        }
    }

    pub fn take_pending_kick(&mut self) -> Option<u8> {
        self.pending_kick.take()
    }
}

pub fn render(frame: &mut Frame, state: &TuiState, stats: &HostStats, slots: &[SlotInfo]) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Length(5),
            Constraint::Min(6),
            Constraint::Length(8),
            Constraint::Length(3),
        ])
        .split(frame.area());

    render_header(frame, chunks[0], stats);
    render_status(frame, chunks[1], stats);
    render_network(frame, chunks[2], stats);
    render_slots(frame, chunks[3], state, slots);
    render_logs(frame, chunks[4], state);
    render_help(frame, chunks[5]);
}

fn render_header(frame: &mut Frame, area: Rect, stats: &HostStats) {
    let uptime = format_duration(stats.uptime_secs);
    let title = format!(" LAN Block Server - Uptime: {} ", uptime);

    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));

    let text = format!(
        "Tick: {}  |  Time: {}  |  Edited blocks: {}",
        stats.server.tick,
        format_time_of_day(stats.time_of_day),
        stats.blocks
    );

    let paragraph = Paragraph::new(text)
        .block(block)
        .style(Style::default().fg(Color::White));

    frame.render_widget(paragraph, area);
}

fn render_status(frame: &mut Frame, area: Rect, stats: &HostStats) {
    let block = Block::default()
        .title(" Players ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Green));

    let max = stats.server.max_players.max(1);
    let ratio = stats.server.player_count as f64 / max as f64;
    let gauge = Gauge::default()
        .block(block)
        .gauge_style(Style::default().fg(Color::Green))
        .ratio(ratio.min(1.0))
        .label(format!("{}/{} players", stats.server.player_count, max));

    frame.render_widget(gauge, area);
}

fn render_network(frame: &mut Frame, area: Rect, stats: &HostStats) {
    let block = Block::default()
        .title(" Network ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow));

    let net = &stats.server.network_stats;
    let lines = vec![
        Line::from(vec![
            Span::styled("Frames: ", Style::default().fg(Color::Gray)),
            Span::styled(
                format!("{} sent / {} recv", net.packets_sent, net.packets_received),
                Style::default().fg(Color::White),
            ),
        ]),
        Line::from(vec![
            Span::styled("Bytes: ", Style::default().fg(Color::Gray)),
            Span::styled(
                format!(
                    "{} sent / {} recv",
                    format_bytes(net.bytes_sent),
                    format_bytes(net.bytes_received)
                ),
                Style::default().fg(Color::White),
            ),
        ]),
        Line::from(vec![
            Span::styled("Protocol errors: ", Style::default().fg(Color::Gray)),
            Span::styled(
                net.protocol_errors.to_string(),
                Style::default().fg(if net.protocol_errors > 0 {
                    Color::Red
                } else {
                    Color::White
                }),
            ),
        ]),
    ];

    let paragraph = Paragraph::new(lines).block(block);
    frame.render_widget(paragraph, area);
}

fn render_slots(frame: &mut Frame, area: Rect, state: &TuiState, slots: &[SlotInfo]) {
    let block = Block::default()
        .title(" Slots ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Magenta));

    let header = Row::new(vec!["Slot", "Name", "Address", "State", "Position", "Up", "Seen"])
        .style(Style::default().fg(Color::Gray).add_modifier(Modifier::BOLD));

    let rows: Vec<Row> = slots
        .iter()
        .enumerate()
        .map(|(index, slot)| {
            let addr = slot
                .addr
                .map(|a| a.to_string())
                .unwrap_or_else(|| String::from("local"));
            let status = if slot.authenticated { "in game" } else { "handshake" };
            let style = if index == state.selected {
                Style::default().fg(Color::Black).bg(Color::Magenta)
            } else {
                Style::default().fg(Color::White)
            };
            Row::new(vec![
                slot.id.to_string(),
                slot.name.clone(),
                addr,
                status.to_string(),
                format!(
                    "{:.1}, {:.1}, {:.1}",
                    slot.position.x, slot.position.y, slot.position.z
                ),
                format_duration(slot.connected_secs),
                format!("{}ms", slot.last_heartbeat_ms),
            ])
            .style(style)
        })
        .collect();

    let widths = [
        Constraint::Length(5),
        Constraint::Length(16),
        Constraint::Length(22),
        Constraint::Length(10),
        Constraint::Min(20),
        Constraint::Length(9),
        Constraint::Length(8),
    ];

    let table = Table::new(rows, widths).header(header).block(block);
    frame.render_widget(table, area);
}

fn render_logs(frame: &mut Frame, area: Rect, state: &TuiState) {
    let block = Block::default()
        .title(" Log ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Blue));

    let visible = area.height.saturating_sub(2) as usize;
    let lines: Vec<Line> = state
        .logs
        .iter()
        .skip(state.logs.len().saturating_sub(visible))
        .map(|(level, message)| {
            let color = match level {
                LogLevel::Info => Color::White,
                LogLevel::Warn => Color::Yellow,
                LogLevel::Error => Color::Red,
            };
            Line::from(Span::styled(message.clone(), Style::default().fg(color)))
        })
        .collect();

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_help(frame: &mut Frame, area: Rect) {
    let block = Block::default()
        .title(" Controls ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray));

    let text = Paragraph::new("Up/Down select slot  |  k kick  |  q or ESC quit")
        .block(block)
        .style(
            Style::default()
                .fg(Color::DarkGray)
                .add_modifier(Modifier::ITALIC),
        );

    frame.render_widget(text, area);
}

fn format_time_of_day(hours: f32) -> String {
    let total_minutes = (hours.rem_euclid(24.0) * 60.0) as u32;
    format!("{:02}:{:02}", total_minutes / 60, total_minutes % 60)
}

fn format_duration(secs: u64) -> String {
    let hours = secs / 3600;
    let mins = (secs % 3600) / 60;
    let secs = secs % 60;
    format!("{:02}:{:02}:{:02}", hours, mins, secs)
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{}B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1}KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1}MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.1}GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_time_of_day() {
        assert_eq!(format_time_of_day(0.0), "00:00");
        assert_eq!(format_time_of_day(13.5), "13:30");
        assert_eq!(format_time_of_day(24.0), "00:00");
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512B");
        assert_eq!(format_bytes(2048), "2.0KB");
        assert_eq!(format_bytes(3 * 1024 * 1024), "3.0MB");
    }

    #[test]
    fn test_log_is_bounded() {
        let mut state = TuiState::new();
        for i in 0..(MAX_LOG_LINES + 10) {
            state.log_info(format!("line {}", i));
        }
        assert_eq!(state.logs.len(), MAX_LOG_LINES);
        assert_eq!(state.logs.front().unwrap().1, "line 10");
    }

    #[test]
    fn test_selection_wraps() {
        let mut state = TuiState::new();
        state.select_prev(3);
        assert_eq!(state.selected, 2);
        state.select_next(3);
        assert_eq!(state.selected, 0);
    }
}
