//! Playback session controller.
//!
//! A [`PlaybackController`] binds one source at a time to one surface. It
//! classifies the source, picks or reuses a player, registers the source's
//! custom headers on the fetch layer, and folds the player's events into a
//! [`PlaybackState`] that the UI reads and subscribes to.
//!
//! Every load gets a fresh generation number. Players tag their events with
//! the generation of the load that produced them, and anything tagged with an
//! older generation is dropped in [`PlaybackController::pump`].

#[cfg(test)]
mod tests;

use std::time::Instant;

use log::{debug, error, info, trace, warn};
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::sync::mpsc::UnboundedReceiver;

use crate::config::PlayerConfig;
use crate::fetch::{HeaderHook, HttpLayer};
use crate::input::{ActivityTimer, Command};
use crate::media::{
    Backend, EventSink, LoadRequest, MediaErrorKind, MediaPlayer, PlayerEvent, PlayerFactory,
};
use crate::source::{PlayableSource, Strategy, classify, split_headers};

/// Capacity of the controller event bus
const EVENT_CAPACITY: usize = 256;

/// Identity of the UI surface a controller is mounted on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurfaceId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Nothing loaded, or the source cannot be played
    Idle,
    Loading,
    ReadyPaused,
    ReadyPlaying,
    /// A fatal media error; only a new source or a retry leaves this state
    Errored,
    /// Unmounted; terminal
    Disposed,
}

/// Non-fatal conditions the UI should surface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    /// The source is not a format or provider we can play
    UnsupportedFormat,
    /// An empty source was given
    InvalidSource,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ControllerEvent {
    PhaseChanged(Phase),
    Playing,
    Paused,
    TimeUpdate(f64),
    DurationChange(f64),
    Error(MediaErrorKind),
    /// `play()` was refused; the user has to start playback again
    PlaybackRejected(String),
    FullscreenChange(bool),
    /// Sent when the user turns active or idle, not on every touch
    UserActivity(bool),
    Notice(Notice),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlaybackError {
    #[error("source must not be empty")]
    InvalidSource,
    #[error("controller has been unmounted")]
    Disposed,
}

/// Observable state of the session
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackState {
    pub phase: Phase,
    pub paused: bool,
    pub current_time: f64,
    /// Infinite for live or unknown-length sources
    pub duration: Option<f64>,
    pub volume: f64,
    pub muted: bool,
    pub fullscreen: bool,
    pub last_error: Option<MediaErrorKind>,
    pub notice: Option<Notice>,
    pub user_active: bool,
}

impl PlaybackState {
    fn new(volume: f64) -> Self {
        Self {
            phase: Phase::Idle,
            paused: true,
            current_time: 0.0,
            duration: None,
            volume,
            muted: false,
            fullscreen: false,
            last_error: None,
            notice: None,
            user_active: true,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.phase, Phase::ReadyPaused | Phase::ReadyPlaying)
    }
}

/// The source currently bound to the surface
struct Session {
    source_url: String,
    strategy: Strategy,
    playable: PlayableSource,
    /// Header registration; dropping it deregisters the headers
    hook: Option<HeaderHook>,
}

pub struct PlaybackController<F: PlayerFactory> {
    factory: F,
    http: HttpLayer,
    config: PlayerConfig,
    surface: Option<SurfaceId>,
    player: Option<Box<dyn MediaPlayer>>,
    session: Option<Session>,
    state: PlaybackState,
    generation: u64,
    sink: EventSink,
    player_events: UnboundedReceiver<(u64, PlayerEvent)>,
    bus: broadcast::Sender<ControllerEvent>,
    activity: ActivityTimer,
    disposed: bool,
}

impl<F: PlayerFactory> PlaybackController<F> {
    pub fn new(factory: F, http: HttpLayer, config: PlayerConfig) -> Self {
        let (sink, player_events) = EventSink::channel();
        let (bus, _) = broadcast::channel(EVENT_CAPACITY);
        let activity = ActivityTimer::new(config.inactivity_timeout(), Instant::now());
        let state = PlaybackState::new(config.initial_volume.clamp(0.0, 1.0));

        Self {
            factory,
            http,
            config,
            surface: None,
            player: None,
            session: None,
            state,
            generation: 0,
            sink,
            player_events,
            bus,
            activity,
            disposed: false,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ControllerEvent> {
        self.bus.subscribe()
    }

    pub fn state(&self) -> &PlaybackState {
        &self.state
    }

    pub fn surface(&self) -> Option<SurfaceId> {
        self.surface
    }

    /// Raw URL of the current session, as given by the caller
    pub fn source_url(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.source_url.as_str())
    }

    pub fn strategy(&self) -> Option<&Strategy> {
        self.session.as_ref().map(|s| &s.strategy)
    }

    /// The URL the player was pointed at, with the header payload stripped
    pub fn playable(&self) -> Option<&PlayableSource> {
        self.session.as_ref().map(|s| &s.playable)
    }

    pub fn backend(&self) -> Option<Backend> {
        self.player.as_ref().map(|p| p.backend())
    }

    pub fn config(&self) -> &PlayerConfig {
        &self.config
    }

    pub fn set_autoplay(&mut self, autoplay: bool) {
        self.config.autoplay = autoplay;
    }

    pub fn is_mounted(&self) -> bool {
        self.surface.is_some() && !self.disposed
    }

    /// Bind the controller to `surface` and start loading `source`.
    ///
    /// Mounting the same surface again is a no-op. Mounting a different
    /// surface tears the current player down first.
    pub fn mount(&mut self, surface: SurfaceId, source: &str) -> Result<(), PlaybackError> {
        if self.disposed {
            return Err(PlaybackError::Disposed);
        }
        if source.trim().is_empty() {
            return Err(PlaybackError::InvalidSource);
        }
        match self.surface {
            Some(current) if current == surface => {
                debug!("Surface {:?} already mounted", surface);
                return Ok(());
            }
            Some(current) => {
                info!("Moving playback from surface {:?} to {:?}", current, surface);
                self.release_player();
                self.session = None;
            }
            None => {}
        }

        self.surface = Some(surface);
        self.bind(source.trim());
        Ok(())
    }

    /// Switch to another source, reusing the player when it can play it
    pub fn set_source(&mut self, source: &str) {
        if self.disposed || self.surface.is_none() {
            debug!("Ignoring source change while not mounted");
            return;
        }
        let source = source.trim();
        if source.is_empty() {
            warn!("Ignoring empty source");
            self.state.notice = Some(Notice::InvalidSource);
            self.emit(ControllerEvent::Notice(Notice::InvalidSource));
            return;
        }
        self.bind(source);
    }

    /// Re-run the current source from scratch
    pub fn retry(&mut self) {
        if self.disposed {
            return;
        }
        if let Some(source) = self.session.as_ref().map(|s| s.source_url.clone()) {
            info!("Retrying {}", source);
            self.bind(&source);
        }
    }

    /// Release the player and the header registration. Idempotent.
    pub fn unmount(&mut self) {
        if self.disposed {
            return;
        }
        info!("Unmounting playback controller");
        self.release_player();
        self.session = None;
        self.surface = None;
        self.disposed = true;
        self.state.paused = true;
        self.set_phase(Phase::Disposed);
    }

    fn bind(&mut self, source: &str) {
        self.generation += 1;
        // drops the previous session's hook
        self.session = None;

        let playable = split_headers(source);
        let strategy = classify(&playable.url);
        info!("Load {}: {} as {}", self.generation, playable.url, strategy);

        if !self.state.paused {
            self.emit(ControllerEvent::Paused);
        }
        self.state.paused = true;
        self.state.current_time = 0.0;
        self.state.duration = None;
        self.state.last_error = None;
        self.state.notice = None;

        let Some(backend) = Backend::for_strategy(&strategy) else {
            warn!("No playback strategy for {}", playable.url);
            self.release_player();
            self.session = Some(Session { source_url: source.to_string(), strategy, playable, hook: None });
            self.state.notice = Some(Notice::UnsupportedFormat);
            self.set_phase(Phase::Idle);
            self.emit(ControllerEvent::Notice(Notice::UnsupportedFormat));
            return;
        };

        let hook = (!playable.headers.is_empty()).then(|| self.http.install_hook(playable.headers.clone()));
        let request = LoadRequest {
            source: playable.clone(),
            strategy: strategy.clone(),
            generation: self.generation,
            hook: hook.as_ref().map(HeaderHook::id),
        };
        self.session = Some(Session { source_url: source.to_string(), strategy, playable, hook });

        if !self.player.as_ref().is_some_and(|p| p.supports(&request.strategy)) {
            self.release_player();
            match self.factory.create(backend) {
                Ok(mut player) => {
                    player.subscribe(self.sink.clone());
                    player.set_volume(self.state.volume);
                    player.set_muted(self.state.muted);
                    self.player = Some(player);
                }
                Err(e) => {
                    error!("Failed to create {:?} player: {:#}", backend, e);
                    self.fail(MediaErrorKind::Aborted);
                    return;
                }
            }
        }

        self.set_phase(Phase::Loading);
        let loaded = match self.player.as_mut() {
            Some(player) => player.load(request),
            None => return,
        };
        if let Err(e) = loaded {
            error!("Player refused load {}: {:#}", self.generation, e);
            self.fail(MediaErrorKind::Format);
        }
    }

    fn release_player(&mut self) {
        if let Some(mut player) = self.player.take() {
            debug!("Disposing {:?} player", player.backend());
            player.dispose();
        }
        if self.state.fullscreen {
            self.state.fullscreen = false;
            self.emit(ControllerEvent::FullscreenChange(false));
        }
    }

    /// Commands act only on a live, non-errored player
    fn controllable(&mut self) -> Option<&mut Box<dyn MediaPlayer>> {
        if self.disposed || self.state.phase == Phase::Errored {
            return None;
        }
        self.player.as_mut()
    }

    pub fn toggle_play(&mut self) {
        let playing = self.state.phase == Phase::ReadyPlaying;
        let Some(player) = self.controllable() else {
            return;
        };
        if playing {
            player.pause();
        } else {
            player.play();
        }
    }

    pub fn seek_by(&mut self, delta: f64) {
        self.seek_to(self.state.current_time + delta);
    }

    /// Seek, clamped to `[0, duration]`
    pub fn seek_to(&mut self, secs: f64) {
        if secs.is_nan() {
            return;
        }
        let upper = self
            .state
            .duration
            .filter(|d| *d >= 0.0)
            .unwrap_or(f64::INFINITY);
        let target = secs.clamp(0.0, upper);
        let Some(player) = self.controllable() else {
            return;
        };
        player.set_current_time(target);
        self.state.current_time = target;
    }

    pub fn set_volume(&mut self, volume: f64) {
        if volume.is_nan() {
            return;
        }
        let volume = volume.clamp(0.0, 1.0);
        let Some(player) = self.controllable() else {
            return;
        };
        player.set_volume(volume);
        self.state.volume = volume;
    }

    pub fn toggle_mute(&mut self) {
        let muted = !self.state.muted;
        let Some(player) = self.controllable() else {
            return;
        };
        player.set_muted(muted);
        self.state.muted = muted;
    }

    pub fn toggle_fullscreen(&mut self) {
        let fullscreen = self.state.fullscreen;
        let Some(player) = self.controllable() else {
            return;
        };
        if fullscreen {
            player.exit_fullscreen();
        } else {
            player.request_fullscreen();
        }
    }

    pub fn exit_fullscreen(&mut self) {
        if !self.state.fullscreen {
            return;
        }
        if let Some(player) = self.controllable() {
            player.exit_fullscreen();
        }
    }

    /// Run an input command
    pub fn apply(&mut self, command: Command) {
        match command {
            Command::TogglePlay => self.toggle_play(),
            Command::ToggleFullscreen => self.toggle_fullscreen(),
            Command::ExitFullscreen => self.exit_fullscreen(),
            Command::SeekBy(delta) => self.seek_by(delta),
        }
    }

    /// Pointer or keyboard activity on the surface
    pub fn notify_activity(&mut self, now: Instant) {
        if self.disposed {
            return;
        }
        if self.activity.touch(now) {
            self.state.user_active = true;
            self.emit(ControllerEvent::UserActivity(true));
        }
    }

    /// Time-based housekeeping: the inactivity timer
    pub fn tick(&mut self, now: Instant) {
        if self.disposed {
            return;
        }
        let playing = self.state.phase == Phase::ReadyPlaying;
        if self.activity.expire(now, playing) {
            self.state.user_active = false;
            self.emit(ControllerEvent::UserActivity(false));
        }
    }

    /// Advance the player and apply the events it has produced
    pub fn pump(&mut self) {
        if self.disposed {
            // drain so probe threads never block on a full queue
            while self.player_events.try_recv().is_ok() {}
            return;
        }
        if let Some(player) = self.player.as_mut() {
            player.update();
        }
        while let Ok((generation, event)) = self.player_events.try_recv() {
            if generation != self.generation {
                trace!("Dropping {:?} from stale load {}", event, generation);
                continue;
            }
            self.handle_player_event(event);
        }
    }

    fn handle_player_event(&mut self, event: PlayerEvent) {
        if matches!(self.state.phase, Phase::Disposed | Phase::Idle) {
            return;
        }
        if self.state.phase == Phase::Errored && !matches!(event, PlayerEvent::FullscreenChange(_)) {
            return;
        }

        match event {
            PlayerEvent::CanPlay { duration } => {
                if self.state.phase != Phase::Loading {
                    return;
                }
                let duration = if duration.is_nan() || duration < 0.0 {
                    warn!("Backend reported invalid duration {}, treating as live", duration);
                    f64::INFINITY
                } else {
                    duration
                };
                self.state.duration = Some(duration);
                self.emit(ControllerEvent::DurationChange(duration));
                if self.config.autoplay {
                    debug!("Autoplaying load {}", self.generation);
                    if let Some(player) = self.player.as_mut() {
                        player.play();
                    }
                } else {
                    self.set_phase(Phase::ReadyPaused);
                }
            }
            PlayerEvent::Playing => {
                // before CanPlay only an autoplay request may start playback
                let autoplaying = self.state.phase == Phase::Loading
                    && self.state.duration.is_some()
                    && self.config.autoplay;
                if !self.state.is_ready() && !autoplaying {
                    debug!("Ignoring play before the source is ready");
                    return;
                }
                self.state.paused = false;
                self.set_phase(Phase::ReadyPlaying);
                self.emit(ControllerEvent::Playing);
            }
            PlayerEvent::Paused => {
                if self.state.paused {
                    return;
                }
                self.state.paused = true;
                if self.state.phase == Phase::ReadyPlaying {
                    self.set_phase(Phase::ReadyPaused);
                }
                self.emit(ControllerEvent::Paused);
            }
            PlayerEvent::PlayRejected(reason) => {
                info!("Playback rejected: {}", reason);
                self.state.paused = true;
                if self.state.duration.is_some() {
                    self.set_phase(Phase::ReadyPaused);
                }
                self.emit(ControllerEvent::PlaybackRejected(reason));
            }
            PlayerEvent::TimeUpdate(secs) => {
                self.state.current_time = secs;
                self.emit(ControllerEvent::TimeUpdate(secs));
            }
            PlayerEvent::Fatal(kind) => self.fail(kind),
            PlayerEvent::FullscreenChange(fullscreen) => {
                if self.state.fullscreen != fullscreen {
                    self.state.fullscreen = fullscreen;
                    self.emit(ControllerEvent::FullscreenChange(fullscreen));
                }
            }
            PlayerEvent::Ended => debug!("Load {} reached the end", self.generation),
        }
    }

    fn fail(&mut self, kind: MediaErrorKind) {
        error!("Playback failed: {}", kind);
        if !self.state.paused {
            self.state.paused = true;
            self.emit(ControllerEvent::Paused);
        }
        self.state.last_error = Some(kind);
        self.set_phase(Phase::Errored);
        self.emit(ControllerEvent::Error(kind));
    }

    fn set_phase(&mut self, phase: Phase) {
        if self.state.phase != phase {
            debug!("Phase {:?} -> {:?}", self.state.phase, phase);
            self.state.phase = phase;
            self.emit(ControllerEvent::PhaseChanged(phase));
        }
    }

    fn emit(&self, event: ControllerEvent) {
        // no subscribers is fine
        let _ = self.bus.send(event);
    }
}

impl<F: PlayerFactory> Drop for PlaybackController<F> {
    fn drop(&mut self) {
        self.unmount();
    }
}
