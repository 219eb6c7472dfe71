use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, Gauge, Paragraph, Widget, Wrap},
};
use std::time::Duration;

use crate::app::ControlButton;

/// Format duration as HH:MM:SS
pub fn format_duration(duration: f64) -> String {
    let total_seconds = duration.max(0.0).round() as u64;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    if hours > 0 {
        format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{:02}:{:02}", minutes, seconds)
    }
}

/// Position label; live and unknown-length sources have no end
pub fn progress_label(position: f64, duration: Option<f64>) -> String {
    match duration {
        Some(d) if d.is_finite() => format!("{} / {}", format_duration(position), format_duration(d)),
        Some(_) => format!("LIVE  {}", format_duration(position)),
        None => "--:-- / --:--".to_string(),
    }
}

/// Progress bar with playback indicator
pub struct ProgressBar<'a> {
    position: f64,
    duration: Option<f64>,
    is_paused: bool,
    title: Option<&'a str>,
}

impl<'a> ProgressBar<'a> {
    pub fn new(position: f64, duration: Option<f64>) -> Self {
        Self {
            position,
            duration,
            is_paused: true,
            title: None,
        }
    }

    pub fn paused(mut self, is_paused: bool) -> Self {
        self.is_paused = is_paused;
        self
    }

    pub fn title(mut self, title: Option<&'a str>) -> Self {
        self.title = title;
        self
    }

    fn ratio(&self) -> f64 {
        match self.duration {
            Some(d) if d.is_finite() && d > 0.0 => (self.position / d).clamp(0.0, 1.0),
            _ => 0.0,
        }
    }
}

impl<'a> Widget for ProgressBar<'a> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let display_title = match (self.is_paused, self.title) {
            (true, Some(title)) => format!("⏸  {} ", title),
            (false, Some(title)) => format!("▶  {} ", title),
            (true, None) => "⏸  Paused ".to_string(),
            (false, None) => "▶  Playing ".to_string(),
        };
        let live = self.duration.is_some_and(|d| d.is_infinite());

        let gauge = Gauge::default()
            .block(Block::default().borders(Borders::ALL).title(display_title))
            .gauge_style(
                Style::default()
                    .fg(if live { Color::Red } else { Color::Blue })
                    .bg(Color::Black)
                    .add_modifier(Modifier::BOLD),
            )
            .ratio(self.ratio())
            .label(progress_label(self.position, self.duration));

        gauge.render(area, buf);
    }
}

/// Row of playback buttons, in [`ControlButton::ALL`] order
pub struct PlaybackControls {
    is_playing: bool,
    has_episodes: bool,
    seek_step: f64,
    enabled: bool,
}

impl PlaybackControls {
    pub fn new(is_playing: bool) -> Self {
        Self {
            is_playing,
            has_episodes: false,
            seek_step: 10.0,
            enabled: true,
        }
    }

    pub fn has_episodes(mut self, has_episodes: bool) -> Self {
        self.has_episodes = has_episodes;
        self
    }

    pub fn seek_step(mut self, seek_step: f64) -> Self {
        self.seek_step = seek_step;
        self
    }

    /// Controls are greyed out until the source is ready
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    fn button(&self, button: ControlButton) -> (String, bool) {
        let step = self.seek_step.round() as i64;
        match button {
            ControlButton::Previous => ("⏮ Prev (p)".to_string(), self.has_episodes),
            ControlButton::Rewind => (format!("◀◀ -{}s (←)", step), self.enabled),
            ControlButton::PlayPause if self.is_playing => ("⏸ Pause (␣)".to_string(), self.enabled),
            ControlButton::PlayPause => ("▶ Play (␣)".to_string(), self.enabled),
            ControlButton::Forward => (format!("▶▶ +{}s (→)", step), self.enabled),
            ControlButton::Next => ("⏭ Next (n)".to_string(), self.has_episodes),
            ControlButton::Fullscreen => ("⛶ Full (f)".to_string(), self.enabled),
        }
    }
}

impl Widget for PlaybackControls {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let count = ControlButton::ALL.len() as u32;
        let chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints(vec![Constraint::Ratio(1, count); ControlButton::ALL.len()])
            .split(area);

        for (button, chunk) in ControlButton::ALL.into_iter().zip(chunks.iter()) {
            let (label, enabled) = self.button(button);
            let style = if !enabled {
                Style::default().fg(Color::DarkGray)
            } else if button == ControlButton::PlayPause {
                Style::default().fg(Color::White).add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::White)
            };

            let content = Paragraph::new(Line::from(Span::styled(label, style)))
                .alignment(Alignment::Center)
                .block(Block::default().borders(Borders::ALL).border_style(style));
            content.render(*chunk, buf);
        }
    }
}

/// Display a status message with fade effect
pub struct StatusMessage<'a> {
    message: &'a str,
    color: Color,
    age: Duration,
    max_age: Duration,
}

impl<'a> StatusMessage<'a> {
    pub fn new(message: &'a str, color: Color, age: Duration) -> Self {
        Self {
            message,
            color,
            age,
            max_age: Duration::from_secs(5),
        }
    }

    pub fn max_age(mut self, duration: Duration) -> Self {
        self.max_age = duration;
        self
    }
}

impl<'a> Widget for StatusMessage<'a> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if self.age > self.max_age {
            return;
        }
        let fade_factor = 1.0 - (self.age.as_secs_f32() / self.max_age.as_secs_f32());

        let color = match (self.color, fade_factor) {
            (Color::Red, _) => Color::Red, // errors stay red
            (_, f) if f > 0.3 => self.color,
            _ => Color::DarkGray,
        };

        let text = Paragraph::new(Text::from(self.message))
            .style(Style::default().fg(color))
            .alignment(Alignment::Center)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(color))
                    .style(Style::default().bg(Color::Black)),
            );

        Clear.render(area, buf);
        text.render(area, buf);
    }
}

/// Volume indicator
pub struct VolumeIndicator {
    volume: u8, // 0-100
    muted: bool,
}

impl VolumeIndicator {
    pub fn new(volume: f64, muted: bool) -> Self {
        Self {
            volume: (volume.clamp(0.0, 1.0) * 100.0).round() as u8,
            muted,
        }
    }
}

impl Widget for VolumeIndicator {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let (icon, color) = if self.muted {
            ("🔇", Color::DarkGray)
        } else if self.volume == 0 {
            ("🔇", Color::White)
        } else if self.volume < 30 {
            ("🔈", Color::White)
        } else if self.volume < 70 {
            ("🔉", Color::White)
        } else {
            ("🔊", Color::White)
        };

        let vol_text = if self.muted {
            format!("{} Muted", icon)
        } else {
            format!("{} {}%", icon, self.volume)
        };

        Paragraph::new(Text::from(vol_text))
            .style(Style::default().fg(color))
            .alignment(Alignment::Right)
            .render(area, buf);
    }
}

/// Help overlay listing the keys
pub struct HelpOverlay {
    in_player: bool,
}

impl HelpOverlay {
    pub fn new(in_player: bool) -> Self {
        Self { in_player }
    }
}

fn help_line(keys: &'static str, action: &'static str) -> Line<'static> {
    Line::from(vec![
        Span::styled(format!("{:<10}", keys), Style::default().add_modifier(Modifier::BOLD)),
        Span::raw(action),
    ])
}

fn help_heading(text: &'static str) -> Line<'static> {
    Line::from(Span::styled(
        text,
        Style::default().add_modifier(Modifier::BOLD | Modifier::UNDERLINED),
    ))
}

impl Widget for HelpOverlay {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let mut lines = if self.in_player {
            vec![
                help_heading("Player"),
                Line::from(""),
                help_line("Space", "Play/Pause"),
                help_line("←/→", "Seek back/forward"),
                help_line("f", "Toggle fullscreen"),
                help_line("Esc", "Exit fullscreen, or back to catalog"),
                help_line("m", "Mute"),
                help_line("+/-", "Volume"),
                help_line("n/p", "Next/previous episode"),
                help_line("r", "Retry after an error"),
                help_line("q", "Back to catalog"),
                Line::from(""),
                help_line("Click", "Play/Pause"),
                help_line("Dbl-click", "Seek on the clicked half"),
            ]
        } else {
            vec![
                help_heading("Catalog"),
                Line::from(""),
                help_line("↑/↓ j/k", "Select title"),
                help_line("Enter", "Watch"),
                help_line("/", "Search"),
                help_line("Esc", "Clear search"),
                help_line("r", "Reload"),
                help_line("q", "Quit"),
            ]
        };

        lines.extend([
            Line::from(""),
            help_heading("Commands"),
            Line::from(""),
            help_line(":open URL", "Play any source"),
            help_line(":seek T", "Seek to T (s, m:ss), or by +T/-T"),
            help_line(":vol N", "Volume 0-100"),
            help_line(":ep N", "Jump to episode N"),
            help_line(":autoplay", "on/off"),
            help_line(":search Q", "Search the catalog"),
            help_line("Ctrl+Q", "Quit"),
        ]);

        let help = Paragraph::new(Text::from(lines))
            .block(Block::default().title(" Help ").borders(Borders::ALL))
            .style(Style::default().fg(Color::White).bg(Color::Black))
            .alignment(Alignment::Left)
            .wrap(Wrap { trim: false });

        Clear.render(area, buf);
        help.render(area, buf);
    }
}

/// Get a spinner frame for loading animations
pub fn get_spinner_frame(duration_ms: u128) -> &'static str {
    const SPINNER_FRAMES: [&str; 10] = ["⠋", "⠙", "⠚", "⠞", "⠖", "⠦", "⠴", "⠲", "⠳", "⠓"];
    let frame_idx = (duration_ms / 80) % SPINNER_FRAMES.len() as u128;
    SPINNER_FRAMES[frame_idx as usize]
}
