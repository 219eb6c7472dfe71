use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow};
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, MouseEvent, MouseEventKind};
use log::{debug, info, warn};
use ratatui::{layout::{Position, Rect}, style::Color};
use tokio::sync::broadcast::{self, error::TryRecvError};

use cinevault_core::{
    AppConfig, CatalogStore, Command, ControllerEvent, DefaultController, GestureLayer, InputContext,
    JsonCatalog, Notice, Phase, PointerPress, SurfaceId, Title, create_controller,
};

use crate::commands;
use crate::events;

/// Status messages disappear after this long
const STATUS_TIMEOUT: Duration = Duration::from_secs(5);

/// Volume change per key press
const VOLUME_STEP: f64 = 0.1;

/// Height of the progress bar at the top of the control area
pub const PROGRESS_ROWS: u16 = 3;

// App state
pub struct App {
    /// Loaded configuration
    pub config: AppConfig,
    /// Current application view
    pub view: AppView,
    /// Catalog list and search state
    pub browser: CatalogBrowser,
    /// Active playback session, if any
    pub watch: Option<WatchSession>,
    /// Status message to display
    pub status_message: Option<(String, Instant, Color)>,
    /// Whether the app should exit
    pub should_quit: bool,
    /// Help dialog visibility
    pub show_help: bool,
    /// Whether command mode is active
    pub command_mode: bool,
    /// Command buffer for command mode
    pub command_buffer: String,
    /// Playback surface as last drawn
    pub surface_area: Option<Rect>,
    /// Progress bar and buttons as last drawn, inside the surface
    pub controls_area: Option<Rect>,
    next_surface: u64,
}

/// Application views
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppView {
    /// Title list with search
    Catalog,
    /// Playback of a title or a bare URL
    Watch,
}

/// Catalog list state
pub struct CatalogBrowser {
    store: JsonCatalog,
    /// Search text
    pub query: String,
    /// Search box has focus
    pub editing: bool,
    /// Titles matching the query
    pub results: Vec<Title>,
    pub selected: usize,
}

impl CatalogBrowser {
    pub fn open(config: &AppConfig) -> Result<Self> {
        let store = JsonCatalog::open(&config.catalog_path)
            .with_context(|| format!("Failed to open catalog {}", config.catalog_path.display()))?;
        let mut browser = Self {
            store,
            query: String::new(),
            editing: false,
            results: Vec::new(),
            selected: 0,
        };
        browser.refresh();
        Ok(browser)
    }

    pub fn refresh(&mut self) {
        self.results = self.store.search(&self.query);
        self.selected = self.selected.min(self.results.len().saturating_sub(1));
    }

    pub fn set_query(&mut self, query: impl Into<String>) {
        self.query = query.into();
        self.selected = 0;
        self.refresh();
    }

    pub fn selected_title(&self) -> Option<&Title> {
        self.results.get(self.selected)
    }

    pub fn select_next(&mut self) {
        if self.selected + 1 < self.results.len() {
            self.selected += 1;
        }
    }

    pub fn select_previous(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    pub fn get(&self, id: i64) -> Option<Title> {
        self.store.get(id)
    }

    /// Titles in the catalog, ignoring the query
    pub fn total(&self) -> usize {
        self.store.list().len()
    }
}

/// One title (or URL) bound to a playback surface
pub struct WatchSession {
    pub controller: DefaultController,
    pub gestures: GestureLayer,
    events: broadcast::Receiver<ControllerEvent>,
    /// Catalog entry being watched; `None` for a bare URL
    pub title: Option<Title>,
    /// `(label, url)` in play order
    pub sources: Vec<(String, String)>,
    pub current: usize,
    pub surface: SurfaceId,
}

impl WatchSession {
    pub fn label(&self) -> &str {
        self.sources.get(self.current).map(|(label, _)| label.as_str()).unwrap_or_default()
    }

    pub fn heading(&self) -> String {
        match &self.title {
            Some(title) if self.sources.len() > 1 => format!("{} - {}", title.title, self.label()),
            Some(title) => title.title.clone(),
            None => self.label().to_string(),
        }
    }

    pub fn is_series(&self) -> bool {
        self.sources.len() > 1
    }

    fn drain_events(&mut self) -> Vec<ControllerEvent> {
        let mut drained = Vec::new();
        loop {
            match self.events.try_recv() {
                Ok(event) => drained.push(event),
                Err(TryRecvError::Lagged(skipped)) => warn!("UI missed {} controller events", skipped),
                Err(_) => break,
            }
        }
        drained
    }
}

/// Buttons of the control bar, left to right
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlButton {
    Previous,
    Rewind,
    PlayPause,
    Forward,
    Next,
    Fullscreen,
}

impl ControlButton {
    pub const ALL: [ControlButton; 6] = [
        ControlButton::Previous,
        ControlButton::Rewind,
        ControlButton::PlayPause,
        ControlButton::Forward,
        ControlButton::Next,
        ControlButton::Fullscreen,
    ];

    /// Button under `column` of a bar `width` cells wide
    pub fn at(column: u16, width: u16) -> Option<ControlButton> {
        if width == 0 || column >= width {
            return None;
        }
        let index = usize::from(column) * Self::ALL.len() / usize::from(width);
        Self::ALL.get(index).copied()
    }
}

impl App {
    pub fn new(config: AppConfig) -> Result<Self> {
        let browser = CatalogBrowser::open(&config)?;
        Ok(Self {
            config,
            view: AppView::Catalog,
            browser,
            watch: None,
            status_message: None,
            should_quit: false,
            show_help: false,
            command_mode: false,
            command_buffer: String::new(),
            surface_area: None,
            controls_area: None,
            next_surface: 0,
        })
    }

    /// Set a status message with a color
    pub fn set_status(&mut self, message: impl Into<String>, color: Color) {
        let message_string = message.into();
        log::debug!("Status message: {} ({})", message_string, color);
        self.status_message = Some((message_string, Instant::now(), color));
    }

    pub fn watch_mut(&mut self) -> Option<&mut WatchSession> {
        self.watch.as_mut()
    }

    /// Play a catalog title, starting at episode `episode` (zero based)
    pub fn watch_title(&mut self, id: i64, episode: Option<usize>) -> Result<()> {
        let title = self.browser.get(id).ok_or_else(|| anyhow!("No title with id {}", id))?;
        let sources = title.playback_sources();
        if sources.is_empty() {
            return Err(anyhow!("{} has nothing to play", title.title));
        }
        let start = episode.unwrap_or(0);
        if start >= sources.len() {
            return Err(anyhow!("{} has {} episodes", title.title, sources.len()));
        }
        self.start_watch(Some(title), sources, start)
    }

    /// Play an arbitrary source URL
    pub fn watch_url(&mut self, url: &str) -> Result<()> {
        let url = url.trim();
        if url.is_empty() {
            return Err(anyhow!("Open command requires a URL"));
        }
        self.start_watch(None, vec![(url.to_string(), url.to_string())], 0)
    }

    fn start_watch(&mut self, title: Option<Title>, sources: Vec<(String, String)>, start: usize) -> Result<()> {
        self.close_watch();

        let mut controller = create_controller(&self.config)?;
        let events = controller.subscribe();
        self.next_surface += 1;
        let surface = SurfaceId(self.next_surface);
        let url = sources.get(start).map(|(_, url)| url.clone()).unwrap_or_default();
        controller.mount(surface, &url)?;

        let session = WatchSession {
            controller,
            gestures: GestureLayer::new(&self.config.player),
            events,
            title,
            sources,
            current: start,
            surface,
        };
        info!("Watching {}", session.heading());
        self.set_status(format!("Loading: {}", session.heading()), Color::Green);
        self.watch = Some(session);
        self.view = AppView::Watch;
        Ok(())
    }

    /// Switch the current session to episode `index` (zero based)
    pub fn play_episode(&mut self, index: usize) -> Result<()> {
        let watch = self.watch.as_mut().ok_or_else(|| anyhow!("Nothing is playing"))?;
        let (label, url) = watch
            .sources
            .get(index)
            .cloned()
            .ok_or_else(|| anyhow!("There is no episode {}", index + 1))?;
        watch.current = index;
        watch.controller.set_source(&url);
        self.set_status(format!("Loading: {}", label), Color::Green);
        Ok(())
    }

    /// Tear down playback and go back to the catalog
    pub fn close_watch(&mut self) {
        if let Some(mut watch) = self.watch.take() {
            debug!("Closing surface {:?}", watch.surface);
            watch.controller.unmount();
        }
        self.surface_area = None;
        self.controls_area = None;
        self.view = AppView::Catalog;
    }

    pub fn handle_key_event(&mut self, key: KeyEvent) -> Result<()> {
        if key.kind == KeyEventKind::Release {
            return Ok(());
        }

        // Check if we're in command mode
        if self.is_command_mode() {
            match key.code {
                KeyCode::Char(c) => self.add_to_command_buffer(c),
                KeyCode::Backspace => self.remove_from_command_buffer(),
                KeyCode::Esc => self.exit_command_mode(),
                KeyCode::Enter => {
                    let command = std::mem::take(&mut self.command_buffer);
                    self.exit_command_mode();
                    commands::handle_command(self, &command)?;
                }
                _ => {}
            }
            return Ok(());
        }

        if self.show_help {
            if matches!(key.code, KeyCode::Esc | KeyCode::F(1) | KeyCode::Char('?') | KeyCode::Enter) {
                self.show_help = false;
            }
            return Ok(());
        }

        if key.code == KeyCode::F(1) {
            self.show_help = true;
            return Ok(());
        }

        match self.view {
            AppView::Catalog => self.handle_catalog_key(key),
            AppView::Watch => self.handle_watch_key(key),
        }
    }

    fn handle_catalog_key(&mut self, key: KeyEvent) -> Result<()> {
        if self.browser.editing {
            match key.code {
                KeyCode::Char(c) => {
                    self.browser.query.push(c);
                    self.browser.selected = 0;
                    self.browser.refresh();
                }
                KeyCode::Backspace => {
                    self.browser.query.pop();
                    self.browser.refresh();
                }
                KeyCode::Enter | KeyCode::Esc | KeyCode::Down => self.browser.editing = false,
                _ => {}
            }
            return Ok(());
        }

        match key.code {
            KeyCode::Up | KeyCode::Char('k') => self.browser.select_previous(),
            KeyCode::Down | KeyCode::Char('j') => self.browser.select_next(),
            KeyCode::Home => self.browser.selected = 0,
            KeyCode::End => self.browser.selected = self.browser.results.len().saturating_sub(1),
            KeyCode::Enter => {
                let id = self.browser.selected_title().map(|t| t.id);
                match id {
                    Some(id) => self.watch_title(id, None)?,
                    None => self.set_status("No title selected", Color::Yellow),
                }
            }
            KeyCode::Char('/') => self.browser.editing = true,
            KeyCode::Char(':') => self.enter_command_mode(),
            KeyCode::Char('?') => self.show_help = true,
            KeyCode::Char('r') => {
                self.browser.refresh();
                self.set_status(format!("{} titles", self.browser.total()), Color::Blue);
            }
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Esc if !self.browser.query.is_empty() => self.browser.set_query(""),
            _ => {}
        }
        Ok(())
    }

    fn handle_watch_key(&mut self, key: KeyEvent) -> Result<()> {
        let Some(watch) = self.watch.as_mut() else {
            self.view = AppView::Catalog;
            return Ok(());
        };
        watch.controller.notify_activity(Instant::now());

        let outcome = watch.gestures.on_key(events::surface_key(&key), InputContext::surface());
        if let Some(command) = outcome.command {
            // Esc outside fullscreen leaves the player instead
            if command == Command::ExitFullscreen && !watch.controller.state().fullscreen {
                self.close_watch();
                return Ok(());
            }
            watch.controller.apply(command);
            return Ok(());
        }

        let volume = watch.controller.state().volume;
        match key.code {
            KeyCode::Char('k') => watch.controller.toggle_play(),
            KeyCode::Char('m') => watch.controller.toggle_mute(),
            KeyCode::Char('+') | KeyCode::Char('=') | KeyCode::Up => {
                watch.controller.set_volume(volume + VOLUME_STEP)
            }
            KeyCode::Char('-') | KeyCode::Down => watch.controller.set_volume(volume - VOLUME_STEP),
            KeyCode::Char('r') => watch.controller.retry(),
            KeyCode::Char('n') => self.step_episode(1)?,
            KeyCode::Char('p') => self.step_episode(-1)?,
            KeyCode::Char(':') => self.enter_command_mode(),
            KeyCode::Char('?') => self.show_help = true,
            KeyCode::Char('q') | KeyCode::Backspace => self.close_watch(),
            _ => {}
        }
        Ok(())
    }

    fn step_episode(&mut self, step: isize) -> Result<()> {
        let Some(watch) = self.watch.as_ref() else {
            return Ok(());
        };
        if !watch.is_series() {
            self.set_status("This title has no other episodes", Color::Yellow);
            return Ok(());
        }
        let count = watch.sources.len();
        match watch.current.checked_add_signed(step).filter(|&i| i < count) {
            Some(index) => self.play_episode(index),
            None => {
                self.set_status("No more episodes", Color::Yellow);
                Ok(())
            }
        }
    }

    fn press_control(&mut self, button: ControlButton) -> Result<()> {
        let Some(watch) = self.watch.as_mut() else {
            return Ok(());
        };
        let step = self.config.player.seek_step;
        match button {
            ControlButton::Previous => return self.step_episode(-1),
            ControlButton::Next => return self.step_episode(1),
            ControlButton::Rewind => watch.controller.seek_by(-step),
            ControlButton::Forward => watch.controller.seek_by(step),
            ControlButton::PlayPause => watch.controller.toggle_play(),
            ControlButton::Fullscreen => watch.controller.toggle_fullscreen(),
        }
        Ok(())
    }

    pub fn handle_mouse_event(&mut self, mouse: MouseEvent) {
        match self.view {
            AppView::Catalog => match mouse.kind {
                MouseEventKind::ScrollDown => self.browser.select_next(),
                MouseEventKind::ScrollUp => self.browser.select_previous(),
                _ => {}
            },
            AppView::Watch => {
                if let Err(e) = self.handle_surface_mouse(mouse) {
                    self.set_status(format!("Error: {}", e), Color::Red);
                }
            }
        }
    }

    fn handle_surface_mouse(&mut self, mouse: MouseEvent) -> Result<()> {
        let now = Instant::now();
        let Some(surface) = self.surface_area else {
            return Ok(());
        };
        let position = Position::new(mouse.column, mouse.row);
        if !surface.contains(position) {
            return Ok(());
        }
        let Some(watch) = self.watch.as_mut() else {
            return Ok(());
        };
        if events::is_activity(&mouse) {
            watch.controller.notify_activity(now);
        }
        if !events::is_left_press(&mouse) {
            return Ok(());
        }

        let controls = self.controls_area.filter(|area| area.contains(position));
        let press = PointerPress {
            column: mouse.column - surface.x,
            surface_width: surface.width,
            in_control_bar: controls.is_some(),
        };
        if let Some(command) = watch.gestures.on_press(press, now) {
            watch.controller.apply(command);
        }
        let Some(bar) = controls else {
            return Ok(());
        };
        if mouse.row < bar.y + PROGRESS_ROWS {
            // inside the gauge borders
            let track = bar.width.saturating_sub(2);
            let offset = mouse.column.saturating_sub(bar.x + 1).min(track);
            if let Some(duration) = watch.controller.state().duration.filter(|d| d.is_finite()) {
                if track > 0 {
                    watch.controller.seek_to(duration * f64::from(offset) / f64::from(track));
                }
            }
        } else if let Some(button) = ControlButton::at(mouse.column - bar.x, bar.width) {
            self.press_control(button)?;
        }
        Ok(())
    }

    /// Update application state
    pub fn update(&mut self, now: Instant) {
        // Clear status message after timeout
        if let Some((_, time, _)) = &self.status_message {
            if now.duration_since(*time) > STATUS_TIMEOUT {
                self.status_message = None;
            }
        }

        let Some(watch) = self.watch.as_mut() else {
            return;
        };
        if let Some(command) = watch.gestures.tick(now) {
            watch.controller.apply(command);
        }
        watch.controller.pump();
        watch.controller.tick(now);
        for event in watch.drain_events() {
            self.on_controller_event(event);
        }
    }

    fn on_controller_event(&mut self, event: ControllerEvent) {
        match event {
            ControllerEvent::Error(kind) => {
                self.set_status(format!("Playback failed: {}. Press r to retry", kind), Color::Red);
            }
            ControllerEvent::PlaybackRejected(reason) => {
                self.set_status(format!("Playback blocked ({}). Press space to play", reason), Color::Yellow);
            }
            ControllerEvent::Notice(Notice::UnsupportedFormat) => {
                self.set_status("This source cannot be played", Color::Yellow);
            }
            ControllerEvent::Notice(Notice::InvalidSource) => {
                self.set_status("No source to play", Color::Yellow);
            }
            ControllerEvent::PhaseChanged(Phase::ReadyPaused) => {
                let at_start = self
                    .watch
                    .as_ref()
                    .is_some_and(|w| w.controller.state().current_time == 0.0);
                if at_start && !self.config.player.autoplay {
                    self.set_status("Ready. Press space to play", Color::Green);
                }
            }
            ControllerEvent::FullscreenChange(fullscreen) => {
                debug!("Fullscreen {}", fullscreen);
            }
            _ => {}
        }
    }

    /// Whether command mode is active
    pub fn is_command_mode(&self) -> bool {
        self.command_mode
    }

    /// Enter command mode
    pub fn enter_command_mode(&mut self) {
        self.command_mode = true;
        self.command_buffer.clear();
    }

    /// Exit command mode
    pub fn exit_command_mode(&mut self) {
        self.command_mode = false;
        self.command_buffer.clear();
    }

    /// Get the current command buffer
    pub fn get_command_buffer(&self) -> &str {
        &self.command_buffer
    }

    /// Add a character to the command buffer
    pub fn add_to_command_buffer(&mut self, c: char) {
        self.command_buffer.push(c);
    }

    /// Remove the last character from the command buffer
    pub fn remove_from_command_buffer(&mut self) {
        self.command_buffer.pop();
    }
}
