use anyhow::{Result, anyhow};
use log::{debug, info};

use super::{Backend, EventSink, LoadRequest, MediaPlayer, PlaybackClock, PlayerEvent};
use crate::source::{EmbedProvider, Strategy};

/// Provider-hosted player. The provider page does the fetching, so there is
/// nothing to probe and the duration stays unknown.
pub struct EmbedPlayer {
    provider: EmbedProvider,
    sink: Option<EventSink>,
    clock: PlaybackClock,
    generation: u64,
    embed_url: Option<String>,
    volume: f64,
    muted: bool,
    fullscreen: bool,
    disposed: bool,
}

impl EmbedPlayer {
    pub fn new(provider: EmbedProvider) -> Self {
        Self {
            provider,
            sink: None,
            clock: PlaybackClock::default(),
            generation: 0,
            embed_url: None,
            volume: 1.0,
            muted: false,
            fullscreen: false,
            disposed: false,
        }
    }

    /// Page URL the surface shows for the current source
    pub fn embed_url(&self) -> Option<&str> {
        self.embed_url.as_deref()
    }

    fn emit(&self, event: PlayerEvent) {
        if let Some(sink) = &self.sink {
            sink.emit(self.generation, event);
        }
    }
}

impl MediaPlayer for EmbedPlayer {
    fn backend(&self) -> Backend {
        Backend::Embed(self.provider)
    }

    fn subscribe(&mut self, sink: EventSink) {
        self.sink = Some(sink);
    }

    fn load(&mut self, request: LoadRequest) -> Result<()> {
        if self.disposed {
            return Err(anyhow!("player has been disposed"));
        }
        let embed_url = match &request.strategy {
            Strategy::Embed { provider, id } if *provider == self.provider => provider.embed_url(id),
            other => return Err(anyhow!("{} embed cannot play {}", self.provider.id(), other)),
        };

        info!("Embedding {}", embed_url);
        self.generation = request.generation;
        self.clock.reset();
        self.embed_url = Some(embed_url);
        self.emit(PlayerEvent::CanPlay { duration: f64::INFINITY });
        Ok(())
    }

    fn play(&mut self) {
        if self.disposed || self.embed_url.is_none() {
            return;
        }
        self.clock.start();
        self.emit(PlayerEvent::Playing);
    }

    fn pause(&mut self) {
        if self.clock.is_running() {
            self.clock.stop();
            self.emit(PlayerEvent::Paused);
        }
    }

    fn is_paused(&self) -> bool {
        !self.clock.is_running()
    }

    fn current_time(&self) -> f64 {
        self.clock.position()
    }

    fn set_current_time(&mut self, secs: f64) {
        self.clock.seek(secs);
        self.emit(PlayerEvent::TimeUpdate(self.clock.position()));
    }

    fn duration(&self) -> Option<f64> {
        self.embed_url.as_ref().map(|_| f64::INFINITY)
    }

    fn volume(&self) -> f64 {
        self.volume
    }

    fn set_volume(&mut self, volume: f64) {
        self.volume = volume.clamp(0.0, 1.0);
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
        if !self.fullscreen && !self.disposed {
            self.fullscreen = true;
            self.emit(PlayerEvent::FullscreenChange(true));
        }
    }

    fn exit_fullscreen(&mut self) {
        if self.fullscreen {
            self.fullscreen = false;
            self.emit(PlayerEvent::FullscreenChange(false));
        }
    }

    fn update(&mut self) {
        if self.clock.is_running() {
            self.emit(PlayerEvent::TimeUpdate(self.clock.position()));
        }
    }

    fn dispose(&mut self) {
        debug!("Disposing {} embed", self.provider.id());
        self.disposed = true;
        self.clock.reset();
        self.embed_url = None;
        self.sink = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::element::testing::request;

    #[test]
    fn test_embed_is_ready_immediately() {
        let mut player = EmbedPlayer::new(EmbedProvider::YouTube);
        let (sink, mut rx) = EventSink::channel();
        player.subscribe(sink);

        let strategy = Strategy::Embed { provider: EmbedProvider::YouTube, id: "dQw4w9WgXcQ".into() };
        player.load(request("https://youtu.be/dQw4w9WgXcQ", strategy, 4)).unwrap();

        assert_eq!(rx.try_recv().unwrap(), (4, PlayerEvent::CanPlay { duration: f64::INFINITY }));
        assert_eq!(player.embed_url(), Some("https://www.youtube.com/embed/dQw4w9WgXcQ"));
    }

    #[test]
    fn test_embed_refuses_other_providers() {
        let mut player = EmbedPlayer::new(EmbedProvider::YouTube);
        let drive = Strategy::Embed { provider: EmbedProvider::Drive, id: "1AbCdEfGhIjK".into() };
        assert!(player.load(request("https://drive.google.com/file/d/1AbCdEfGhIjK/view", drive, 1)).is_err());
        assert!(player.load(request("https://cdn.example/a.mp4", Strategy::DirectFile, 2)).is_err());
    }
}
