use crate::app::{App, AppView, PROGRESS_ROWS, WatchSession};
use crate::ui::components::*;
use cinevault_core::{Notice, Phase, Title, classify, split_headers};
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap},
    Frame,
};
use std::time::Duration;
use unicode_width::UnicodeWidthStr;

/// Rows taken by the progress bar and the buttons
const CONTROLS_HEIGHT: u16 = 6;

/// Draw the catalog view
pub fn draw_catalog_view(f: &mut Frame, app: &App, area: Rect) {
    f.render_widget(Clear, area);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Menu bar
            Constraint::Length(3), // Search box
            Constraint::Min(4),    // List and details
            Constraint::Length(1), // Key hints
        ])
        .split(area);

    draw_menu_bar(f, app, chunks[0]);
    draw_search_box(f, app, chunks[1]);

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
        .split(chunks[2]);

    let browser = &app.browser;
    let items: Vec<ListItem> = browser
        .results
        .iter()
        .map(|title| {
            let kind = if title.is_series { "series" } else { "movie" };
            ListItem::new(Line::from(vec![
                Span::styled(title.title.clone(), Style::default().fg(Color::White)),
                Span::styled(
                    format!("  {} · {}", title.release_year, kind),
                    Style::default().fg(Color::DarkGray),
                ),
            ]))
        })
        .collect();

    let list_title = if browser.query.is_empty() {
        format!(" Titles ({}) ", browser.results.len())
    } else {
        format!(" Titles ({} of {}) ", browser.results.len(), browser.total())
    };
    let mut list_state = ListState::default();
    list_state.select((!browser.results.is_empty()).then_some(browser.selected));

    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title(list_title))
        .highlight_style(
            Style::default()
                .bg(Color::Blue)
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        );
    f.render_stateful_widget(list, body[0], &mut list_state);

    match browser.selected_title() {
        Some(title) => draw_title_details(f, title, body[1]),
        None => {
            let empty = if browser.query.is_empty() {
                "The catalog is empty. Add titles with `cinevault titles add`."
            } else {
                "No titles match your search."
            };
            let paragraph = Paragraph::new(Text::from(empty))
                .style(Style::default().fg(Color::DarkGray))
                .alignment(Alignment::Center)
                .wrap(Wrap { trim: true })
                .block(Block::default().borders(Borders::ALL).title(" Details "));
            f.render_widget(paragraph, body[1]);
        }
    }

    let hints = "↑/↓: Select | Enter: Watch | /: Search | ':': Command | F1: Help | Ctrl+Q: Quit";
    let status = Paragraph::new(Text::from(hints)).style(Style::default().fg(Color::White).bg(Color::DarkGray));
    f.render_widget(status, chunks[3]);
}

fn draw_search_box(f: &mut Frame, app: &App, area: Rect) {
    let browser = &app.browser;
    let border = if browser.editing { Color::Yellow } else { Color::Blue };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border))
        .title(" Search ");
    let inner = block.inner(area);

    let text = if browser.query.is_empty() && !browser.editing {
        Span::styled("Press / to search by title or genre", Style::default().fg(Color::DarkGray))
    } else {
        Span::styled(browser.query.clone(), Style::default().fg(Color::White))
    };
    f.render_widget(Paragraph::new(Line::from(text)).block(block), area);

    if browser.editing && !app.command_mode {
        f.set_cursor_position((inner.x + browser.query.width() as u16, inner.y));
    }
}

fn draw_title_details(f: &mut Frame, title: &Title, area: Rect) {
    let label = Style::default().fg(Color::Green);
    let mut lines = vec![
        Line::from(Span::styled(
            title.title.clone(),
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        )),
        Line::from(vec![
            Span::styled("Year: ", label),
            Span::raw(title.release_year.to_string()),
            Span::styled("   Genre: ", label),
            Span::raw(title.genre.clone()),
        ]),
        Line::from(vec![Span::styled("Poster: ", label), Span::raw(title.poster_or_fallback().to_string())]),
        Line::from(""),
    ];
    if !title.description.is_empty() {
        lines.push(Line::from(title.description.clone()));
        lines.push(Line::from(""));
    }

    let sources = title.playback_sources();
    let heading = if title.is_series { format!("Episodes ({})", sources.len()) } else { "Source".to_string() };
    lines.push(Line::from(Span::styled(heading, label.add_modifier(Modifier::BOLD))));
    for (i, (name, url)) in sources.iter().enumerate() {
        let strategy = classify(&split_headers(url).url);
        let color = if strategy.is_playable() { Color::White } else { Color::Red };
        lines.push(Line::from(vec![
            Span::styled(format!("{:>3}. ", i + 1), Style::default().fg(Color::DarkGray)),
            Span::styled(name.clone(), Style::default().fg(color)),
            Span::styled(format!("  [{}]", strategy), Style::default().fg(Color::DarkGray)),
        ]));
    }

    let details = Paragraph::new(Text::from(lines))
        .wrap(Wrap { trim: false })
        .block(Block::default().borders(Borders::ALL).title(format!(" #{} ", title.id)));
    f.render_widget(details, area);
}

/// Draw the watch view and record where the surface and controls ended up
pub fn draw_watch_view(f: &mut Frame, app: &mut App, area: Rect) {
    f.render_widget(Clear, area);
    let Some(watch) = app.watch.as_ref() else {
        app.surface_area = None;
        app.controls_area = None;
        return;
    };
    let state = watch.controller.state();

    let (surface, sidebar) = if state.fullscreen {
        (area, None)
    } else {
        let vertical = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(3), Constraint::Min(CONTROLS_HEIGHT + 2)])
            .split(area);
        draw_menu_bar(f, app, vertical[0]);

        if watch.is_series() {
            let horizontal = Layout::default()
                .direction(Direction::Horizontal)
                .constraints([Constraint::Min(30), Constraint::Length(32)])
                .split(vertical[1]);
            (horizontal[0], Some(horizontal[1]))
        } else {
            (vertical[1], None)
        }
    };

    let block = Block::default()
        .borders(if state.fullscreen { Borders::NONE } else { Borders::ALL })
        .title(format!(" {} ", watch.heading()))
        .title_alignment(Alignment::Center)
        .style(Style::default().bg(Color::Black));
    let inner = block.inner(surface);
    f.render_widget(block, surface);

    let show_controls = state.user_active || state.paused || !state.is_ready();
    let controls = (show_controls && inner.height > CONTROLS_HEIGHT).then(|| {
        Rect::new(inner.x, inner.bottom() - CONTROLS_HEIGHT, inner.width, CONTROLS_HEIGHT)
    });
    let picture = Rect::new(
        inner.x,
        inner.y,
        inner.width,
        inner.height - controls.map_or(0, |c| c.height),
    );

    draw_surface_content(f, watch, picture);
    if let Some(controls) = controls {
        draw_player_controls(f, app, controls);
    }
    if let Some(sidebar) = sidebar {
        draw_episode_list(f, watch, sidebar);
    }

    app.surface_area = Some(inner);
    app.controls_area = controls;
}

/// The terminal cannot show video, so the surface describes what is playing
fn draw_surface_content(f: &mut Frame, watch: &WatchSession, area: Rect) {
    let state = watch.controller.state();
    let controller = &watch.controller;
    let dim = Style::default().fg(Color::DarkGray);

    let mut lines: Vec<Line> = Vec::new();
    match state.phase {
        Phase::Loading => {
            let spinner = get_spinner_frame(chrono::Utc::now().timestamp_millis().max(0) as u128);
            lines.push(Line::from(Span::styled(
                format!("{} Loading {} {}", spinner, watch.label(), spinner),
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            )));
        }
        Phase::Errored => {
            let reason = state.last_error.map(|e| e.to_string()).unwrap_or_else(|| "unknown error".into());
            lines.push(Line::from(Span::styled(
                format!("Playback failed: {}", reason),
                Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
            )));
            lines.push(Line::from(Span::styled("Press r to retry", dim)));
        }
        Phase::Idle | Phase::Disposed => {
            let message = match state.notice {
                Some(Notice::UnsupportedFormat) => "This source cannot be played",
                Some(Notice::InvalidSource) => "No source to play",
                None => "Nothing is playing",
            };
            lines.push(Line::from(Span::styled(
                message,
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            )));
        }
        Phase::ReadyPaused | Phase::ReadyPlaying => {
            let (symbol, word) = if state.paused { ("⏸", "Paused") } else { ("▶", "Playing") };
            lines.push(Line::from(Span::styled(
                format!("{}  {}", symbol, word),
                Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
            )));
        }
    }
    lines.push(Line::from(""));

    if let Some(strategy) = controller.strategy() {
        lines.push(Line::from(Span::styled(strategy.to_string(), dim)));
        if let Some(embed) = strategy.embed_url() {
            lines.push(Line::from(Span::styled(embed, dim)));
        } else if let Some(playable) = controller.playable() {
            lines.push(Line::from(Span::styled(playable.url.clone(), dim)));
            if !playable.headers.is_empty() {
                let names: Vec<&str> = playable.headers.keys().map(String::as_str).collect();
                lines.push(Line::from(Span::styled(format!("with headers: {}", names.join(", ")), dim)));
            }
        }
    }

    let top_pad = area.height.saturating_sub(lines.len() as u16) / 2;
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(top_pad), Constraint::Min(1)])
        .split(area);
    let paragraph = Paragraph::new(Text::from(lines))
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true });
    f.render_widget(paragraph, layout[1]);
}

fn draw_episode_list(f: &mut Frame, watch: &WatchSession, area: Rect) {
    let items: Vec<ListItem> = watch
        .sources
        .iter()
        .enumerate()
        .map(|(i, (label, _))| ListItem::new(format!("{:>2}. {}", i + 1, label)))
        .collect();
    let mut state = ListState::default();
    state.select(Some(watch.current));
    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title(" Episodes "))
        .highlight_style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))
        .highlight_symbol("▶ ");
    f.render_stateful_widget(list, area, &mut state);
}

/// Draw the menu bar
pub fn draw_menu_bar(f: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::White))
        .title(" cinevault ")
        .title_alignment(Alignment::Left);
    let inner_area = block.inner(area);
    f.render_widget(block, area);

    let tab = |label: &'static str, active: bool| {
        Span::styled(label, Style::default().fg(if active { Color::Yellow } else { Color::White }))
    };
    let menu_tabs = Paragraph::new(Line::from(vec![
        tab("Catalog", app.view == AppView::Catalog),
        Span::raw(" | "),
        tab("Player", app.view == AppView::Watch),
        Span::raw(" | "),
        tab("[F1] Help", app.show_help),
    ]))
    .alignment(Alignment::Center);
    f.render_widget(menu_tabs, inner_area);

    let clock = chrono::Local::now().format("%H:%M").to_string();
    let clock = Paragraph::new(Text::from(clock))
        .style(Style::default().fg(Color::DarkGray))
        .alignment(Alignment::Right);
    f.render_widget(clock, inner_area);
}

/// Draw player controls
pub fn draw_player_controls(f: &mut Frame, app: &App, area: Rect) {
    let Some(watch) = app.watch.as_ref() else {
        return;
    };
    let state = watch.controller.state();

    let controls = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(PROGRESS_ROWS),                  // Progress bar
            Constraint::Length(CONTROLS_HEIGHT - PROGRESS_ROWS), // Playback controls
        ])
        .split(area);

    let progress_bar = ProgressBar::new(state.current_time, state.duration)
        .paused(state.paused)
        .title(Some(watch.label()));
    f.render_widget(progress_bar, controls[0]);

    let playback_controls = PlaybackControls::new(!state.paused)
        .has_episodes(watch.is_series())
        .seek_step(app.config.player.seek_step)
        .enabled(state.is_ready());
    f.render_widget(playback_controls, controls[1]);

    // top-right corner of the progress bar border
    let width = 12.min(area.width.saturating_sub(2));
    let volume_area = Rect::new(area.right().saturating_sub(width + 1), area.top(), width, 1);
    f.render_widget(VolumeIndicator::new(state.volume, state.muted), volume_area);
}

/// Draw status message with fade effect
pub fn draw_status_message(f: &mut Frame, message: &str, color: Color, age: Duration) {
    let status_message = StatusMessage::new(message, color, age).max_age(Duration::from_secs(5));

    let area = f.area();
    let message_width = message.width() as u16 + 4; // Add space for borders
    let message_height = 3; // 1 line of text + 2 for borders

    let message_area = Rect {
        x: area.x + (area.width.saturating_sub(message_width)) / 2,
        y: area.y + area.height.saturating_sub(12), // Show above the controls
        width: message_width.min(area.width),
        height: message_height.min(area.height),
    };

    f.render_widget(status_message, message_area);
}

/// Draw command prompt
pub fn draw_command_prompt(f: &mut Frame, command: &str) {
    let screen = f.area();
    let area = Rect::new(0, screen.height.saturating_sub(3), screen.width, 3.min(screen.height));

    let prompt_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .style(Style::default().bg(Color::Black));
    let inner_area = prompt_block.inner(area);
    f.render_widget(Clear, area);
    f.render_widget(prompt_block, area);

    let command_para = Paragraph::new(Text::from(format!(":{}", command)))
        .style(
            Style::default()
                .fg(Color::Yellow)
                .bg(Color::Black)
                .add_modifier(Modifier::BOLD),
        )
        .alignment(Alignment::Left);
    f.render_widget(command_para, inner_area);

    f.set_cursor_position((inner_area.x + 1 + command.width() as u16, inner_area.y));
}

/// Draw help dialog
pub fn draw_help_dialog(f: &mut Frame, in_player: bool) {
    let area = centered_rect(60, 80, f.area());
    f.render_widget(Clear, area);
    f.render_widget(HelpOverlay::new(in_player), area);
}

/// Helper function to create a centered rect
pub fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
