mod clock;
mod element;
mod embed;
mod manifest;
mod native;
pub mod probe;

use std::fmt;
use std::sync::Arc;

use anyhow::Result;
use parking_lot::Mutex;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::fetch::{HookId, HttpLayer};
use crate::source::{EmbedProvider, PlayableSource, Strategy};

pub use clock::PlaybackClock;
pub use element::{ElementPlayer, Prober};
pub use embed::EmbedPlayer;
pub use manifest::{ManifestPlayer, ManifestProbe};
pub use native::{FileProbe, NativePlayer};

/// Rendering technology behind a player handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Backend {
    /// Native media element, progressive files only
    Native,
    /// Manifest-aware element, plays manifests and progressive files
    Manifest,
    /// Provider iframe-like surface
    Embed(EmbedProvider),
}

impl Backend {
    /// Preferred backend for a strategy; `None` for unrecognized sources
    pub fn for_strategy(strategy: &Strategy) -> Option<Backend> {
        match strategy {
            Strategy::DirectFile => Some(Backend::Native),
            Strategy::HlsManifest => Some(Backend::Manifest),
            Strategy::Embed { provider, .. } => Some(Backend::Embed(*provider)),
            Strategy::Unrecognized => None,
        }
    }

    /// Whether a handle of this backend can be re-pointed at `strategy`
    pub fn supports(&self, strategy: &Strategy) -> bool {
        match (self, strategy) {
            (Backend::Native, Strategy::DirectFile) => true,
            (Backend::Manifest, Strategy::DirectFile | Strategy::HlsManifest) => true,
            (Backend::Embed(own), Strategy::Embed { provider, .. }) => own == provider,
            _ => false,
        }
    }
}

/// Unrecoverable media failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaErrorKind {
    /// Source could not be fetched
    Network,
    /// Source fetched but not a format we can play
    Format,
    /// Media data is corrupt
    Decode,
    /// Loading was aborted by the player
    Aborted,
}

impl fmt::Display for MediaErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match self {
            MediaErrorKind::Network => "the video could not be downloaded",
            MediaErrorKind::Format => "the video format is not supported",
            MediaErrorKind::Decode => "the video data is corrupt",
            MediaErrorKind::Aborted => "loading was aborted",
        };
        f.write_str(message)
    }
}

/// Notifications a player sends back to its owner
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    /// Metadata loaded; `duration` is infinite when unknown
    CanPlay { duration: f64 },
    Playing,
    Paused,
    /// `play()` was refused; recoverable
    PlayRejected(String),
    TimeUpdate(f64),
    Fatal(MediaErrorKind),
    FullscreenChange(bool),
    Ended,
}

/// Everything a player needs to (re)load a source
#[derive(Debug, Clone)]
pub struct LoadRequest {
    pub source: PlayableSource,
    pub strategy: Strategy,
    /// Tag copied onto every event produced for this load
    pub generation: u64,
    /// Header hook to use for every fetch of this load
    pub hook: Option<HookId>,
}

/// Sending half of the player event channel
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: UnboundedSender<(u64, PlayerEvent)>,
}

impl EventSink {
    pub fn channel() -> (EventSink, UnboundedReceiver<(u64, PlayerEvent)>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (EventSink { tx }, rx)
    }

    /// Send an event; a closed channel means the owner is gone and the event is moot
    pub fn emit(&self, generation: u64, event: PlayerEvent) {
        let _ = self.tx.send((generation, event));
    }
}

/// Capability interface every player backend implements
pub trait MediaPlayer: Send {
    fn backend(&self) -> Backend;

    /// Whether `load` accepts this strategy without a new handle
    fn supports(&self, strategy: &Strategy) -> bool {
        self.backend().supports(strategy)
    }

    /// Route future events to `sink`
    fn subscribe(&mut self, sink: EventSink);

    /// Point the player at a new source; completion is reported through events
    fn load(&mut self, request: LoadRequest) -> Result<()>;

    /// Start playback; outcome arrives as `Playing` or `PlayRejected`
    fn play(&mut self);
    fn pause(&mut self);
    fn is_paused(&self) -> bool;

    fn current_time(&self) -> f64;
    fn set_current_time(&mut self, secs: f64);
    fn duration(&self) -> Option<f64>;

    fn volume(&self) -> f64;
    fn set_volume(&mut self, volume: f64);
    fn muted(&self) -> bool;
    fn set_muted(&mut self, muted: bool);

    fn is_fullscreen(&self) -> bool;
    fn request_fullscreen(&mut self);
    fn exit_fullscreen(&mut self);

    /// Advance playback and emit time updates
    fn update(&mut self);

    /// Release everything; the handle must not be used afterwards
    fn dispose(&mut self);
}

/// Creates player handles for the controller
pub trait PlayerFactory {
    fn create(&mut self, backend: Backend) -> Result<Box<dyn MediaPlayer>>;
}

/// Factory for the built-in backends over a shared fetch layer
#[derive(Clone)]
pub struct DefaultPlayerFactory {
    http: HttpLayer,
}

impl DefaultPlayerFactory {
    pub fn new(http: HttpLayer) -> Self {
        Self { http }
    }

    pub fn http(&self) -> &HttpLayer {
        &self.http
    }
}

impl PlayerFactory for DefaultPlayerFactory {
    fn create(&mut self, backend: Backend) -> Result<Box<dyn MediaPlayer>> {
        log::debug!("Creating {:?} player", backend);
        Ok(match backend {
            Backend::Native => Box::new(NativePlayer::new(self.http.clone())),
            Backend::Manifest => Box::new(ManifestPlayer::new(self.http.clone())),
            Backend::Embed(provider) => Box::new(EmbedPlayer::new(provider)),
        })
    }
}

/// Load state shared between a player and its background probe
#[derive(Debug, Default)]
pub(crate) struct LoadSlot {
    /// Generation of the load currently owned by the player; 0 when none
    pub generation: u64,
    pub duration: Option<f64>,
    pub failed: bool,
}

pub(crate) type SharedSlot = Arc<Mutex<LoadSlot>>;

/// Publish a probe result, unless the player has moved on to another load
pub(crate) fn settle_probe(
    slot: &SharedSlot,
    sink: Option<&EventSink>,
    generation: u64,
    outcome: Result<f64, MediaErrorKind>,
) {
    {
        let mut slot = slot.lock();
        if slot.generation != generation {
            log::debug!("Dropping stale probe result for load {}", generation);
            return;
        }
        match outcome {
            Ok(duration) => slot.duration = Some(duration),
            Err(_) => slot.failed = true,
        }
    }
    if let Some(sink) = sink {
        match outcome {
            Ok(duration) => sink.emit(generation, PlayerEvent::CanPlay { duration }),
            Err(kind) => sink.emit(generation, PlayerEvent::Fatal(kind)),
        }
    }
}
