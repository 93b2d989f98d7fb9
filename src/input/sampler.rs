use super::gestures::gesture_keys;
use super::keys::{KeyState, RawKeySnapshot, KEY_COUNT, REPEATABLE_BELOW};
use super::staging::KeyStaging;

/// Platform keyboard snapshot provider.
pub trait KeySource: Send {
    fn snapshot(&mut self) -> RawKeySnapshot;
}

/// Pending assistive-technology gesture names.
pub trait GestureSource: Send {
    fn drain_gestures(&mut self) -> Vec<String>;
}

/// Turns raw snapshots into edge-triggered `KeyState`s.
pub struct KeySampler {
    source: Box<dyn KeySource>,
    gestures: Option<Box<dyn GestureSource>>,
    staging: KeyStaging,
}

impl KeySampler {
    pub fn new(source: Box<dyn KeySource>) -> Self {
        Self {
            source,
            gestures: None,
            staging: KeyStaging::new(),
        }
    }

    pub fn with_gestures(mut self, gestures: Box<dyn GestureSource>) -> Self {
        self.gestures = Some(gestures);
        self
    }

    /// Handle producers use to stage a full state for the next sample.
    pub fn staging(&self) -> KeyStaging {
        self.staging.clone()
    }

    /// Sample the next state. A staged state wins over the keyboard and is consumed.
    pub fn sample(&mut self, previous: &KeyState) -> KeyState {
        if let Some(staged) = self.staging.take() {
            return staged;
        }
        let raw = self.source.snapshot();
        let mut synthetic = [false; KEY_COUNT];
        if let Some(gestures) = self.gestures.as_mut() {
            for name in gestures.drain_gestures() {
                for code in gesture_keys(&name) {
                    synthetic[*code as usize] = true;
                }
            }
        }
        derive(previous, &raw, &synthetic)
    }
}

pub(crate) fn derive(
    previous: &KeyState,
    raw: &RawKeySnapshot,
    synthetic: &[bool; KEY_COUNT],
) -> KeyState {
    let mut next = KeyState::new();
    for code in 0..KEY_COUNT {
        let was_down = previous.down[code];
        let fresh = raw.struck[code] || synthetic[code] || (raw.held[code] && !was_down);
        let rearm = !was_down || code < REPEATABLE_BELOW as usize;
        next.down[code] = raw.held[code] || raw.struck[code] || synthetic[code];
        next.pressed[code] = fresh && rearm;
        next.released[code] = !next.down[code] && was_down;
    }
    next
}
