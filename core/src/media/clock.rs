use std::time::Instant;

/// Wall-clock playback position for backends that don't decode frames themselves
#[derive(Debug, Clone)]
pub struct PlaybackClock {
    position: f64,
    started_at: Option<Instant>,
    duration: f64,
}

impl Default for PlaybackClock {
    fn default() -> Self {
        Self { position: 0.0, started_at: None, duration: f64::INFINITY }
    }
}

impl PlaybackClock {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn set_duration(&mut self, duration: f64) {
        if duration.is_nan() || duration < 0.0 {
            return;
        }
        self.duration = duration;
    }

    pub fn is_running(&self) -> bool {
        self.started_at.is_some()
    }

    pub fn start(&mut self) {
        if self.started_at.is_none() {
            self.started_at = Some(Instant::now());
        }
    }

    pub fn stop(&mut self) {
        self.position = self.position_at(Instant::now());
        self.started_at = None;
    }

    pub fn seek(&mut self, secs: f64) {
        self.position = secs.clamp(0.0, self.duration);
        if self.started_at.is_some() {
            self.started_at = Some(Instant::now());
        }
    }

    pub fn position(&self) -> f64 {
        self.position_at(Instant::now())
    }

    pub fn position_at(&self, now: Instant) -> f64 {
        let elapsed = self
            .started_at
            .map(|start| now.saturating_duration_since(start).as_secs_f64())
            .unwrap_or(0.0);
        (self.position + elapsed).min(self.duration)
    }

    /// True once a running clock has reached a finite duration
    pub fn reached_end(&self) -> bool {
        self.duration.is_finite() && self.position() >= self.duration
    }
}
