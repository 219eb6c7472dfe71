//! Clock-driven media element shared by the native and manifest backends.
//!
//! Loading is split in two: `load` resets the element synchronously, and a
//! background thread runs the backend's [`Prober`] to learn the duration. The
//! probe result lands in the shared [`LoadSlot`] and is announced through the
//! event sink, tagged with the generation of the load that started it.

use std::marker::PhantomData;
use std::sync::Arc;
use std::thread;

use anyhow::{Result, anyhow};
use log::{debug, info, warn};
use parking_lot::Mutex;

use super::{
    Backend, EventSink, LoadRequest, LoadSlot, MediaErrorKind, MediaPlayer, PlaybackClock,
    PlayerEvent, SharedSlot, settle_probe,
};
use crate::fetch::HttpLayer;

/// Minimum clock movement between two time updates
const TIME_UPDATE_STEP: f64 = 0.25;

/// Backend-specific half of an element: which sources it takes and how it learns their duration
pub trait Prober: 'static {
    const BACKEND: Backend;

    /// Runs on a probe thread. `Ok` carries the duration, infinite when unknown.
    fn probe(http: &HttpLayer, request: &LoadRequest) -> Result<f64, MediaErrorKind>;
}

pub struct ElementPlayer<P: Prober> {
    http: HttpLayer,
    sink: Option<EventSink>,
    slot: SharedSlot,
    clock: PlaybackClock,
    generation: u64,
    url: Option<String>,
    volume: f64,
    muted: bool,
    fullscreen: bool,
    last_reported: f64,
    disposed: bool,
    _prober: PhantomData<fn() -> P>,
}

impl<P: Prober> ElementPlayer<P> {
    pub fn new(http: HttpLayer) -> Self {
        Self {
            http,
            sink: None,
            slot: Arc::new(Mutex::new(LoadSlot::default())),
            clock: PlaybackClock::default(),
            generation: 0,
            url: None,
            volume: 1.0,
            muted: false,
            fullscreen: false,
            last_reported: 0.0,
            disposed: false,
            _prober: PhantomData,
        }
    }

    /// URL currently bound to the element
    pub fn current_url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    fn emit(&self, event: PlayerEvent) {
        if let Some(sink) = &self.sink {
            sink.emit(self.generation, event);
        }
    }

    /// Pull the probed duration into the clock once the probe has landed
    fn sync_slot(&mut self) {
        if let Some(duration) = self.slot.lock().duration {
            self.clock.set_duration(duration);
        }
    }

    fn spawn_probe(&self, request: LoadRequest) {
        let http = self.http.clone();
        let slot = Arc::clone(&self.slot);
        let sink = self.sink.clone();
        let generation = request.generation;

        let spawned = thread::Builder::new()
            .name(format!("probe-{}", generation))
            .spawn(move || {
                let outcome = P::probe(&http, &request);
                debug!("Probe for load {} finished: {:?}", generation, outcome);
                settle_probe(&slot, sink.as_ref(), generation, outcome);
            });

        if let Err(e) = spawned {
            warn!("Could not start probe thread: {}", e);
            settle_probe(&self.slot, self.sink.as_ref(), generation, Err(MediaErrorKind::Aborted));
        }
    }
}

impl<P: Prober> MediaPlayer for ElementPlayer<P> {
    fn backend(&self) -> Backend {
        P::BACKEND
    }

    fn subscribe(&mut self, sink: EventSink) {
        self.sink = Some(sink);
    }

    fn load(&mut self, request: LoadRequest) -> Result<()> {
        if self.disposed {
            return Err(anyhow!("player has been disposed"));
        }
        if !P::BACKEND.supports(&request.strategy) {
            return Err(anyhow!("{:?} player cannot play {}", P::BACKEND, request.strategy));
        }

        info!("{:?} player loading {}", P::BACKEND, request.source.url);
        self.generation = request.generation;
        self.clock.reset();
        self.last_reported = 0.0;
        self.url = Some(request.source.url.clone());
        *self.slot.lock() = LoadSlot { generation: request.generation, ..Default::default() };

        self.spawn_probe(request);
        Ok(())
    }

    fn play(&mut self) {
        if self.disposed || self.url.is_none() {
            return;
        }
        let (ready, failed) = {
            let slot = self.slot.lock();
            (slot.duration.is_some(), slot.failed)
        };
        if failed {
            self.emit(PlayerEvent::PlayRejected("the source failed to load".to_string()));
        } else if !ready {
            self.emit(PlayerEvent::PlayRejected("the source is still loading".to_string()));
        } else {
            self.sync_slot();
            if self.clock.reached_end() {
                self.clock.seek(0.0);
            }
            self.clock.start();
            self.emit(PlayerEvent::Playing);
        }
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
        if self.disposed {
            return;
        }
        self.sync_slot();
        self.clock.seek(secs);
        self.last_reported = self.clock.position();
        self.emit(PlayerEvent::TimeUpdate(self.last_reported));
    }

    fn duration(&self) -> Option<f64> {
        self.slot.lock().duration
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
        if self.disposed || !self.clock.is_running() {
            return;
        }
        self.sync_slot();
        let position = self.clock.position();
        if (position - self.last_reported).abs() >= TIME_UPDATE_STEP {
            self.last_reported = position;
            self.emit(PlayerEvent::TimeUpdate(position));
        }
        if self.clock.reached_end() {
            self.clock.stop();
            self.emit(PlayerEvent::Ended);
            self.emit(PlayerEvent::Paused);
        }
    }

    fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        debug!("Disposing {:?} player", P::BACKEND);
        self.disposed = true;
        self.clock.reset();
        self.url = None;
        self.sink = None;
        // generation 0 makes any in-flight probe stale
        *self.slot.lock() = LoadSlot::default();
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::thread;
    use std::time::{Duration, Instant};

    use tokio::sync::mpsc::UnboundedReceiver;

    use crate::media::{LoadRequest, PlayerEvent};
    use crate::source::{PlayableSource, Strategy};

    /// Block until the next player event arrives
    pub fn next_event(rx: &mut UnboundedReceiver<(u64, PlayerEvent)>) -> (u64, PlayerEvent) {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            if let Ok(event) = rx.try_recv() {
                return event;
            }
            assert!(Instant::now() < deadline, "timed out waiting for player event");
            thread::sleep(Duration::from_millis(5));
        }
    }

    pub fn request(url: &str, strategy: Strategy, generation: u64) -> LoadRequest {
        LoadRequest {
            source: PlayableSource { url: url.to_string(), headers: Default::default() },
            strategy,
            generation,
            hook: None,
        }
    }
}
