use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use parking_lot::Mutex;
use tokio::sync::broadcast::Receiver;

use super::*;
use crate::fetch::testing::RecordingFetch;
use crate::source::EmbedProvider;

const SURFACE: SurfaceId = SurfaceId(1);
const MOVIE_A: &str = "https://cdn.example/a.mp4";
const MOVIE_B: &str = "https://cdn.example/b.mp4";

/// What the mock players report back to the test
#[derive(Default)]
struct Recorder {
    live: usize,
    created: Vec<Backend>,
    loads: Vec<LoadRequest>,
    calls: Vec<&'static str>,
    sink: Option<EventSink>,
    reject_play: bool,
}

type Shared = Arc<Mutex<Recorder>>;

struct MockPlayer {
    backend: Backend,
    shared: Shared,
    generation: u64,
    time: f64,
    volume: f64,
    muted: bool,
    fullscreen: bool,
    disposed: bool,
}

impl MockPlayer {
    fn emit(&self, event: PlayerEvent) {
        if let Some(sink) = &self.shared.lock().sink {
            sink.emit(self.generation, event);
        }
    }

    fn record(&self, call: &'static str) {
        assert!(!self.disposed, "{} called on a disposed player", call);
        self.shared.lock().calls.push(call);
    }
}

impl MediaPlayer for MockPlayer {
    fn backend(&self) -> Backend {
        self.backend
    }

    fn subscribe(&mut self, sink: EventSink) {
        self.shared.lock().sink = Some(sink);
    }

    fn load(&mut self, request: LoadRequest) -> Result<()> {
        self.record("load");
        self.generation = request.generation;
        self.time = 0.0;
        self.shared.lock().loads.push(request);
        Ok(())
    }

    fn play(&mut self) {
        self.record("play");
        if self.shared.lock().reject_play {
            self.emit(PlayerEvent::PlayRejected("autoplay blocked".to_string()));
        } else {
            self.emit(PlayerEvent::Playing);
        }
    }

    fn pause(&mut self) {
        self.record("pause");
        self.emit(PlayerEvent::Paused);
    }

    fn is_paused(&self) -> bool {
        true
    }

    fn current_time(&self) -> f64 {
        self.time
    }

    fn set_current_time(&mut self, secs: f64) {
        self.record("seek");
        self.time = secs;
    }

    fn duration(&self) -> Option<f64> {
        None
    }

    fn volume(&self) -> f64 {
        self.volume
    }

    fn set_volume(&mut self, volume: f64) {
        self.volume = volume;
    }

    fn muted(&self) -> bool {
        self.muted
    }

    fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
    }

    fn is_fullscreen(&self) -> bool {
        self.fullscreen
    }

    fn request_fullscreen(&mut self) {
        self.record("fullscreen");
        self.fullscreen = true;
        self.emit(PlayerEvent::FullscreenChange(true));
    }

    fn exit_fullscreen(&mut self) {
        self.record("exit_fullscreen");
        self.fullscreen = false;
        self.emit(PlayerEvent::FullscreenChange(false));
    }

    fn update(&mut self) {}

    fn dispose(&mut self) {
        assert!(!self.disposed, "player disposed twice");
        self.disposed = true;
        self.shared.lock().live -= 1;
    }
}

struct MockFactory {
    shared: Shared,
}

impl PlayerFactory for MockFactory {
    fn create(&mut self, backend: Backend) -> Result<Box<dyn MediaPlayer>> {
        let mut recorder = self.shared.lock();
        recorder.live += 1;
        recorder.created.push(backend);
        Ok(Box::new(MockPlayer {
            backend,
            shared: Arc::clone(&self.shared),
            generation: 0,
            time: 0.0,
            volume: 1.0,
            muted: false,
            fullscreen: false,
            disposed: false,
        }))
    }
}

struct Harness {
    controller: PlaybackController<MockFactory>,
    shared: Shared,
    http: HttpLayer,
    events: Receiver<ControllerEvent>,
}

impl Harness {
    fn new(config: PlayerConfig) -> Self {
        let shared = Shared::default();
        let http = HttpLayer::new(Arc::new(RecordingFetch::default()));
        let controller = PlaybackController::new(
            MockFactory { shared: Arc::clone(&shared) },
            http.clone(),
            config,
        );
        let events = controller.subscribe();
        Self { controller, shared, http, events }
    }

    fn mounted(source: &str) -> Self {
        let mut harness = Self::new(PlayerConfig::default());
        harness.controller.mount(SURFACE, source).unwrap();
        harness
    }

    /// Deliver an event as if the player produced it for load `generation`
    fn player_says(&mut self, generation: u64, event: PlayerEvent) {
        let sink = self.shared.lock().sink.clone().expect("no player subscribed");
        sink.emit(generation, event);
        self.controller.pump();
    }

    fn last_generation(&self) -> u64 {
        self.shared.lock().loads.last().map(|l| l.generation).unwrap_or(0)
    }

    fn ready(&mut self, duration: f64) {
        let generation = self.last_generation();
        self.player_says(generation, PlayerEvent::CanPlay { duration });
    }

    fn drain(&mut self) -> Vec<ControllerEvent> {
        let mut out = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            out.push(event);
        }
        out
    }

    fn live_players(&self) -> usize {
        self.shared.lock().live
    }

    fn calls(&self) -> Vec<&'static str> {
        self.shared.lock().calls.clone()
    }
}

#[test]
fn test_mount_direct_file_loads_then_readies_paused() {
    let mut h = Harness::mounted(MOVIE_A);
    assert_eq!(h.controller.state().phase, Phase::Loading);
    assert_eq!(h.controller.strategy(), Some(&Strategy::DirectFile));
    assert_eq!(h.controller.backend(), Some(Backend::Native));

    h.ready(90.0);
    let state = h.controller.state();
    assert_eq!(state.phase, Phase::ReadyPaused);
    assert!(state.paused);
    assert_eq!(state.duration, Some(90.0));
    assert_eq!(
        h.drain(),
        vec![
            ControllerEvent::PhaseChanged(Phase::Loading),
            ControllerEvent::DurationChange(90.0),
            ControllerEvent::PhaseChanged(Phase::ReadyPaused),
        ]
    );
}

#[test]
fn test_short_youtube_link_embeds() {
    let h = Harness::mounted("https://youtu.be/abc123");
    assert_eq!(
        h.controller.strategy(),
        Some(&Strategy::Embed { provider: EmbedProvider::YouTube, id: "abc123".to_string() })
    );
    assert_eq!(h.controller.backend(), Some(Backend::Embed(EmbedProvider::YouTube)));
}

#[test]
fn test_mount_rejects_empty_source() {
    let mut h = Harness::new(PlayerConfig::default());
    assert_eq!(h.controller.mount(SURFACE, "   "), Err(PlaybackError::InvalidSource));
    assert_eq!(h.live_players(), 0);
    assert!(!h.controller.is_mounted());
}

#[test]
fn test_mount_is_idempotent_per_surface() {
    let mut h = Harness::mounted(MOVIE_A);
    h.controller.mount(SURFACE, MOVIE_B).unwrap();
    assert_eq!(h.controller.source_url(), Some(MOVIE_A));
    assert_eq!(h.shared.lock().created.len(), 1);

    // another surface takes over: old player is gone first
    h.controller.mount(SurfaceId(2), MOVIE_B).unwrap();
    assert_eq!(h.controller.surface(), Some(SurfaceId(2)));
    assert_eq!(h.controller.source_url(), Some(MOVIE_B));
    assert_eq!(h.shared.lock().created.len(), 2);
    assert_eq!(h.live_players(), 1);
}

#[test]
fn test_same_backend_player_is_reused() {
    let mut h = Harness::mounted(MOVIE_A);
    h.ready(60.0);
    h.controller.set_source(MOVIE_B);

    assert_eq!(h.live_players(), 1);
    assert_eq!(h.shared.lock().created, vec![Backend::Native]);
    assert_eq!(h.shared.lock().loads.len(), 2);
    let state = h.controller.state();
    assert_eq!(state.phase, Phase::Loading);
    assert_eq!(state.current_time, 0.0);
    assert!(state.paused);
}

#[test]
fn test_incompatible_strategy_replaces_player() {
    let mut h = Harness::mounted(MOVIE_A);
    h.controller.set_source("https://cdn.example/live/index.m3u8");
    assert_eq!(h.shared.lock().created, vec![Backend::Native, Backend::Manifest]);
    assert_eq!(h.live_players(), 1);

    // manifest player can take a direct file without a new handle
    h.controller.set_source(MOVIE_B);
    assert_eq!(h.shared.lock().created.len(), 2);

    h.controller.set_source("https://drive.google.com/file/d/1AbCdEfGhIjKlMn/view");
    assert_eq!(h.controller.backend(), Some(Backend::Embed(EmbedProvider::Drive)));
    assert_eq!(h.live_players(), 1);
}

#[test]
fn test_stale_completion_is_ignored() {
    let mut h = Harness::mounted(MOVIE_A);
    let first = h.last_generation();
    h.controller.set_source(MOVIE_B);
    let second = h.last_generation();
    assert_ne!(first, second);

    h.player_says(first, PlayerEvent::CanPlay { duration: 10.0 });
    assert_eq!(h.controller.state().phase, Phase::Loading);
    assert_eq!(h.controller.state().duration, None);

    h.player_says(first, PlayerEvent::Fatal(MediaErrorKind::Network));
    assert_eq!(h.controller.state().last_error, None);

    h.player_says(second, PlayerEvent::CanPlay { duration: 20.0 });
    assert_eq!(h.controller.state().phase, Phase::ReadyPaused);
    assert_eq!(h.controller.state().duration, Some(20.0));
}

#[test]
fn test_fatal_error_blocks_commands_until_new_source() {
    let mut h = Harness::mounted(MOVIE_A);
    h.ready(60.0);
    h.controller.toggle_play();
    h.controller.pump();
    assert_eq!(h.controller.state().phase, Phase::ReadyPlaying);

    let generation = h.last_generation();
    h.player_says(generation, PlayerEvent::Fatal(MediaErrorKind::Network));
    let state = h.controller.state();
    assert_eq!(state.phase, Phase::Errored);
    assert_eq!(state.last_error, Some(MediaErrorKind::Network));
    assert!(state.paused);
    assert!(h.drain().contains(&ControllerEvent::Error(MediaErrorKind::Network)));

    let plays = h.calls().iter().filter(|c| **c == "play").count();
    h.controller.toggle_play();
    h.controller.seek_by(10.0);
    assert_eq!(h.calls().iter().filter(|c| **c == "play").count(), plays);
    assert!(!h.calls().contains(&"seek"));
    assert_eq!(h.controller.state().phase, Phase::Errored);

    h.controller.set_source(MOVIE_B);
    h.ready(30.0);
    h.controller.toggle_play();
    h.controller.pump();
    assert_eq!(h.controller.state().phase, Phase::ReadyPlaying);
}

#[test]
fn test_retry_reloads_same_source() {
    let mut h = Harness::mounted(MOVIE_A);
    let generation = h.last_generation();
    h.player_says(generation, PlayerEvent::Fatal(MediaErrorKind::Format));
    assert_eq!(h.controller.state().phase, Phase::Errored);

    h.controller.retry();
    assert_eq!(h.controller.state().phase, Phase::Loading);
    assert_eq!(h.controller.state().last_error, None);
    let recorder = h.shared.lock();
    let loads = &recorder.loads;
    assert_eq!(loads.len(), 2);
    assert_eq!(loads[1].source.url, MOVIE_A);
    assert!(loads[1].generation > generation);
}

#[test]
fn test_commands_after_unmount_are_noops() {
    let mut h = Harness::mounted(MOVIE_A);
    h.ready(60.0);
    h.controller.unmount();
    assert_eq!(h.live_players(), 0);
    assert_eq!(h.controller.state().phase, Phase::Disposed);
    let calls = h.calls();

    h.controller.toggle_play();
    h.controller.seek_to(5.0);
    h.controller.set_volume(0.2);
    h.controller.toggle_mute();
    h.controller.toggle_fullscreen();
    h.controller.retry();
    h.controller.set_source(MOVIE_B);
    h.controller.unmount();
    h.controller.pump();

    assert_eq!(h.calls(), calls);
    assert_eq!(h.controller.state().phase, Phase::Disposed);
    assert_eq!(h.controller.mount(SURFACE, MOVIE_B), Err(PlaybackError::Disposed));
}

#[test]
fn test_drop_disposes_player() {
    let h = Harness::mounted(MOVIE_A);
    let shared = Arc::clone(&h.shared);
    drop(h);
    assert_eq!(shared.lock().live, 0);
}

#[test]
fn test_headers_are_stripped_and_hooked_per_session() {
    let source = r#"https://cdn.example/show/index.m3u8?token=1&headers={"Referer":"https://site.example"}"#;
    let mut h = Harness::mounted(source);

    let playable = h.controller.playable().unwrap().clone();
    assert_eq!(playable.url, "https://cdn.example/show/index.m3u8?token=1");
    assert_eq!(playable.headers.get("Referer").map(String::as_str), Some("https://site.example"));
    assert_eq!(playable.headers.len(), 1);

    let hook = h.shared.lock().loads[0].hook.expect("hook passed to player");
    assert_eq!(h.http.active_hooks(), 1);
    assert_eq!(h.http.headers_for(Some(hook)), playable.headers);

    // a source without headers removes the registration
    h.controller.set_source(MOVIE_B);
    assert_eq!(h.http.active_hooks(), 0);
    assert_eq!(h.shared.lock().loads[1].hook, None);

    h.controller.set_source(source);
    assert_eq!(h.http.active_hooks(), 1);
    h.controller.unmount();
    assert_eq!(h.http.active_hooks(), 0);
}

#[test]
fn test_seeks_clamp_to_duration() {
    let mut h = Harness::mounted(MOVIE_A);
    h.ready(100.0);

    h.controller.seek_to(250.0);
    assert_eq!(h.controller.state().current_time, 100.0);
    h.controller.seek_by(-30.0);
    assert_eq!(h.controller.state().current_time, 70.0);
    h.controller.seek_by(-500.0);
    assert_eq!(h.controller.state().current_time, 0.0);
}

#[test]
fn test_invalid_durations_are_treated_as_live() {
    for reported in [f64::NAN, -30.0, f64::NEG_INFINITY] {
        let mut h = Harness::mounted(MOVIE_A);
        h.ready(reported);
        assert_eq!(h.controller.state().phase, Phase::ReadyPaused);
        assert_eq!(h.controller.state().duration, Some(f64::INFINITY));
        assert!(h.drain().contains(&ControllerEvent::DurationChange(f64::INFINITY)));

        h.controller.seek_by(10.0);
        assert_eq!(h.controller.state().current_time, 10.0);
        h.controller.seek_to(5.0);
        assert_eq!(h.controller.state().current_time, 5.0);
        h.controller.seek_by(-60.0);
        assert_eq!(h.controller.state().current_time, 0.0);
    }
}

#[test]
fn test_live_duration_seeks_without_upper_bound() {
    let mut h = Harness::mounted(MOVIE_A);
    h.ready(f64::INFINITY);
    h.controller.seek_to(5_000.0);
    assert_eq!(h.controller.state().current_time, 5_000.0);
    h.controller.seek_to(f64::NAN);
    assert_eq!(h.controller.state().current_time, 5_000.0);
}

#[test]
fn test_playing_before_ready_is_ignored() {
    let mut h = Harness::mounted(MOVIE_A);
    let generation = h.last_generation();
    h.drain();

    h.player_says(generation, PlayerEvent::Playing);
    assert_eq!(h.controller.state().phase, Phase::Loading);
    assert!(h.controller.state().paused);
    assert!(h.drain().is_empty());

    h.ready(45.0);
    assert_eq!(h.controller.state().phase, Phase::ReadyPaused);
    assert_eq!(h.controller.state().duration, Some(45.0));
}

#[test]
fn test_volume_clamps() {
    let mut h = Harness::mounted(MOVIE_A);
    h.controller.set_volume(1.7);
    assert_eq!(h.controller.state().volume, 1.0);
    h.controller.set_volume(-0.3);
    assert_eq!(h.controller.state().volume, 0.0);
    h.controller.toggle_mute();
    assert!(h.controller.state().muted);
}

#[test]
fn test_unrecognized_source_stays_idle_with_notice() {
    let mut h = Harness::mounted("https://example.com/page.html");
    assert_eq!(h.controller.state().phase, Phase::Idle);
    assert_eq!(h.controller.state().notice, Some(Notice::UnsupportedFormat));
    assert_eq!(h.live_players(), 0);
    assert!(h.drain().contains(&ControllerEvent::Notice(Notice::UnsupportedFormat)));

    // a playable source recovers
    h.controller.set_source(MOVIE_A);
    assert_eq!(h.controller.state().phase, Phase::Loading);
    assert_eq!(h.controller.state().notice, None);
}

#[test]
fn test_empty_source_change_keeps_session() {
    let mut h = Harness::mounted(MOVIE_A);
    h.ready(60.0);
    h.drain();

    h.controller.set_source("");
    assert_eq!(h.controller.source_url(), Some(MOVIE_A));
    assert_eq!(h.controller.state().phase, Phase::ReadyPaused);
    assert_eq!(h.drain(), vec![ControllerEvent::Notice(Notice::InvalidSource)]);
}

#[test]
fn test_autoplay_plays_when_ready() {
    let config = PlayerConfig { autoplay: true, ..PlayerConfig::default() };
    let mut h = Harness::new(config);
    h.controller.mount(SURFACE, MOVIE_A).unwrap();
    h.ready(60.0);
    // the mock answers play() straight away
    h.controller.pump();

    assert_eq!(h.controller.state().phase, Phase::ReadyPlaying);
    assert!(!h.controller.state().paused);
}

#[test]
fn test_rejected_autoplay_falls_back_to_paused() {
    let config = PlayerConfig { autoplay: true, ..PlayerConfig::default() };
    let mut h = Harness::new(config);
    h.shared.lock().reject_play = true;
    h.controller.mount(SURFACE, MOVIE_A).unwrap();
    h.ready(60.0);
    h.controller.pump();

    assert_eq!(h.controller.state().phase, Phase::ReadyPaused);
    assert!(h.drain().contains(&ControllerEvent::PlaybackRejected("autoplay blocked".to_string())));
}

#[test]
fn test_fullscreen_follows_player() {
    let mut h = Harness::mounted(MOVIE_A);
    h.ready(60.0);
    h.controller.apply(Command::ToggleFullscreen);
    h.controller.pump();
    assert!(h.controller.state().fullscreen);

    h.controller.apply(Command::ExitFullscreen);
    h.controller.pump();
    assert!(!h.controller.state().fullscreen);

    // already windowed: nothing to do
    h.controller.apply(Command::ExitFullscreen);
    assert_eq!(h.calls().iter().filter(|c| **c == "exit_fullscreen").count(), 1);
}

#[test]
fn test_user_activity_transitions_only() {
    let mut h = Harness::mounted(MOVIE_A);
    h.ready(60.0);
    h.controller.toggle_play();
    h.controller.pump();
    h.drain();

    let now = Instant::now();
    h.controller.notify_activity(now);
    h.controller.tick(now + Duration::from_secs(1));
    assert!(h.drain().is_empty());

    h.controller.tick(now + Duration::from_secs(4));
    h.controller.tick(now + Duration::from_secs(5));
    assert_eq!(h.drain(), vec![ControllerEvent::UserActivity(false)]);
    assert!(!h.controller.state().user_active);

    h.controller.notify_activity(now + Duration::from_secs(6));
    h.controller.notify_activity(now + Duration::from_secs(7));
    assert_eq!(h.drain(), vec![ControllerEvent::UserActivity(true)]);
}
