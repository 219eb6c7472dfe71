//! Keyboard shortcuts and pointer gestures on the playback surface.
//!
//! The gesture layer turns raw input into [`Command`]s for the controller.
//! Single presses are held back until the double-tap window has passed, so a
//! double tap seeks without also toggling playback.

use std::time::{Duration, Instant};

use log::trace;

use crate::config::PlayerConfig;

/// Keys the playback surface reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Char(char),
    Space,
    Esc,
    Left,
    Right,
    Other,
}

/// Where keyboard focus currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InputContext {
    /// The playback surface is focused and visible
    pub surface_focused: bool,
    /// A text field has focus; shortcuts must not fire
    pub text_input_focused: bool,
}

impl InputContext {
    pub fn surface() -> Self {
        Self { surface_focused: true, text_input_focused: false }
    }

    fn accepts_shortcuts(&self) -> bool {
        self.surface_focused && !self.text_input_focused
    }
}

/// Playback actions produced by input
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    TogglePlay,
    ToggleFullscreen,
    ExitFullscreen,
    SeekBy(f64),
}

/// Result of a key press
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct KeyOutcome {
    pub command: Option<Command>,
    /// The key was consumed and must not trigger its default action (e.g. scrolling)
    pub prevent_default: bool,
}

/// Half of the surface a press landed in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Half {
    Left,
    Right,
}

/// A pointer press or tap on the surface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointerPress {
    pub column: u16,
    pub surface_width: u16,
    /// Press landed on the control bar
    pub in_control_bar: bool,
}

impl PointerPress {
    pub fn half(&self) -> Half {
        if u32::from(self.column) * 2 < u32::from(self.surface_width) {
            Half::Left
        } else {
            Half::Right
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct PendingTap {
    at: Instant,
    half: Half,
}

pub struct GestureLayer {
    seek_step: f64,
    double_tap_window: Duration,
    pending: Option<PendingTap>,
}

impl GestureLayer {
    pub fn new(config: &PlayerConfig) -> Self {
        Self {
            seek_step: config.seek_step,
            double_tap_window: config.double_tap_window(),
            pending: None,
        }
    }

    pub fn on_key(&mut self, key: Key, context: InputContext) -> KeyOutcome {
        if !context.accepts_shortcuts() {
            return KeyOutcome::default();
        }

        let command = match key {
            Key::Char('f') | Key::Char('F') => Command::ToggleFullscreen,
            Key::Esc => Command::ExitFullscreen,
            Key::Space => {
                return KeyOutcome { command: Some(Command::TogglePlay), prevent_default: true };
            }
            Key::Right => Command::SeekBy(self.seek_step),
            Key::Left => Command::SeekBy(-self.seek_step),
            _ => return KeyOutcome::default(),
        };
        KeyOutcome { command: Some(command), prevent_default: false }
    }

    /// Handle a press. Returns a command that is due now: a double-tap seek, or
    /// the toggle of an earlier single press this press did not pair with.
    pub fn on_press(&mut self, press: PointerPress, now: Instant) -> Option<Command> {
        if press.in_control_bar {
            return None;
        }

        let half = press.half();
        match self.pending.take() {
            Some(tap) if tap.half == half && now.duration_since(tap.at) <= self.double_tap_window => {
                trace!("Double tap on {:?} half", half);
                Some(match half {
                    Half::Left => Command::SeekBy(-self.seek_step),
                    Half::Right => Command::SeekBy(self.seek_step),
                })
            }
            Some(_) => {
                self.pending = Some(PendingTap { at: now, half });
                Some(Command::TogglePlay)
            }
            None => {
                self.pending = Some(PendingTap { at: now, half });
                None
            }
        }
    }

    /// Resolve a held single press once the double-tap window has passed
    pub fn tick(&mut self, now: Instant) -> Option<Command> {
        let tap = self.pending?;
        if now.duration_since(tap.at) > self.double_tap_window {
            self.pending = None;
            Some(Command::TogglePlay)
        } else {
            None
        }
    }

    pub fn has_pending_press(&self) -> bool {
        self.pending.is_some()
    }
}

/// Tracks whether the user is interacting, to show or hide controls
#[derive(Debug, Clone)]
pub struct ActivityTimer {
    timeout: Duration,
    last_activity: Instant,
    active: bool,
}

impl ActivityTimer {
    pub fn new(timeout: Duration, now: Instant) -> Self {
        Self { timeout, last_activity: now, active: true }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Record activity. True when this turns the user active again.
    pub fn touch(&mut self, now: Instant) -> bool {
        self.last_activity = now;
        let changed = !self.active;
        self.active = true;
        changed
    }

    /// True when the timeout has just run out during playback
    pub fn expire(&mut self, now: Instant, playing: bool) -> bool {
        if !self.active || !playing {
            return false;
        }
        if now.duration_since(self.last_activity) >= self.timeout {
            self.active = false;
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WIDTH: u16 = 100;

    fn press(column: u16) -> PointerPress {
        PointerPress { column, surface_width: WIDTH, in_control_bar: false }
    }

    fn layer() -> GestureLayer {
        GestureLayer::new(&PlayerConfig::default())
    }

    #[test]
    fn test_shortcuts_need_focused_surface() {
        let mut gestures = layer();
        let space = gestures.on_key(Key::Space, InputContext::surface());
        assert_eq!(space.command, Some(Command::TogglePlay));
        assert!(space.prevent_default);

        assert_eq!(gestures.on_key(Key::Right, InputContext::surface()).command, Some(Command::SeekBy(10.0)));
        assert_eq!(gestures.on_key(Key::Left, InputContext::surface()).command, Some(Command::SeekBy(-10.0)));
        assert_eq!(gestures.on_key(Key::Char('f'), InputContext::surface()).command, Some(Command::ToggleFullscreen));
        assert_eq!(gestures.on_key(Key::Esc, InputContext::surface()).command, Some(Command::ExitFullscreen));

        let typing = InputContext { surface_focused: true, text_input_focused: true };
        assert_eq!(gestures.on_key(Key::Space, typing), KeyOutcome::default());
        assert_eq!(gestures.on_key(Key::Char('f'), InputContext::default()), KeyOutcome::default());
    }

    #[test]
    fn test_double_tap_seeks_by_half() {
        let mut gestures = layer();
        let t0 = Instant::now();

        assert_eq!(gestures.on_press(press(10), t0), None);
        assert_eq!(gestures.on_press(press(20), t0 + Duration::from_millis(200)), Some(Command::SeekBy(-10.0)));
        // no toggle left behind
        assert_eq!(gestures.tick(t0 + Duration::from_secs(1)), None);

        assert_eq!(gestures.on_press(press(80), t0 + Duration::from_secs(2)), None);
        assert_eq!(
            gestures.on_press(press(90), t0 + Duration::from_millis(2250)),
            Some(Command::SeekBy(10.0))
        );
    }

    #[test]
    fn test_single_press_resolves_after_window() {
        let mut gestures = layer();
        let t0 = Instant::now();

        assert_eq!(gestures.on_press(press(50), t0), None);
        assert_eq!(gestures.tick(t0 + Duration::from_millis(100)), None);
        assert_eq!(gestures.tick(t0 + Duration::from_millis(301)), Some(Command::TogglePlay));
        assert!(!gestures.has_pending_press());
    }

    #[test]
    fn test_slow_second_press_is_two_singles() {
        let mut gestures = layer();
        let t0 = Instant::now();

        gestures.on_press(press(10), t0);
        assert_eq!(gestures.on_press(press(10), t0 + Duration::from_millis(400)), Some(Command::TogglePlay));
        assert!(gestures.has_pending_press());
    }

    #[test]
    fn test_control_bar_presses_never_toggle() {
        let mut gestures = layer();
        let t0 = Instant::now();
        let control = PointerPress { column: 10, surface_width: WIDTH, in_control_bar: true };

        assert_eq!(gestures.on_press(control, t0), None);
        assert_eq!(gestures.on_press(control, t0 + Duration::from_millis(100)), None);
        assert_eq!(gestures.tick(t0 + Duration::from_secs(1)), None);
    }

    #[test]
    fn test_activity_transitions() {
        let t0 = Instant::now();
        let mut timer = ActivityTimer::new(Duration::from_secs(3), t0);

        // paused playback keeps controls up
        assert!(!timer.expire(t0 + Duration::from_secs(5), false));
        assert!(timer.expire(t0 + Duration::from_secs(5), true));
        assert!(!timer.expire(t0 + Duration::from_secs(6), true));
        assert!(!timer.is_active());

        assert!(timer.touch(t0 + Duration::from_secs(7)));
        assert!(!timer.touch(t0 + Duration::from_secs(8)));
        assert!(!timer.expire(t0 + Duration::from_secs(10), true));
        assert!(timer.expire(t0 + Duration::from_secs(11), true));
    }
}
