//! Virtual key codes and the three-layer key table.

pub type KeyCode = u8;

pub const KEY_COUNT: usize = 256;

/// Codes below this value are modifiers and system keys; they re-arm on every strike.
pub const REPEATABLE_BELOW: KeyCode = 32;

pub const BACKSPACE: KeyCode = 0x08;
pub const TAB: KeyCode = 0x09;
pub const ENTER: KeyCode = 0x0D;
pub const SHIFT: KeyCode = 0x10;
pub const CONTROL: KeyCode = 0x11;
pub const ALT: KeyCode = 0x12;
pub const ESCAPE: KeyCode = 0x1B;
pub const SPACE: KeyCode = 0x20;
pub const PAGE_UP: KeyCode = 0x21;
pub const PAGE_DOWN: KeyCode = 0x22;
pub const END: KeyCode = 0x23;
pub const HOME: KeyCode = 0x24;
pub const LEFT: KeyCode = 0x25;
pub const UP: KeyCode = 0x26;
pub const RIGHT: KeyCode = 0x27;
pub const DOWN: KeyCode = 0x28;
pub const INSERT: KeyCode = 0x2D;
pub const DELETE: KeyCode = 0x2E;
pub const F1: KeyCode = 0x70;
pub const F12: KeyCode = 0x7B;

/// Key code for `F<n>` (1..=12).
pub fn function_key(n: u8) -> Option<KeyCode> {
    (1..=12).contains(&n).then(|| F1 + n - 1)
}

/// Edge-triggered key state for one sample.
///
/// `down` holds the keys that are currently held, `pressed` the rising edges
/// recorded by this sample and `released` the falling edges.
#[derive(Clone, PartialEq, Eq)]
pub struct KeyState {
    pub down: [bool; KEY_COUNT],
    pub pressed: [bool; KEY_COUNT],
    pub released: [bool; KEY_COUNT],
}

impl Default for KeyState {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for KeyState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let collect = |layer: &[bool; KEY_COUNT]| -> Vec<usize> {
            layer
                .iter()
                .enumerate()
                .filter_map(|(code, set)| set.then_some(code))
                .collect()
        };
        f.debug_struct("KeyState")
            .field("down", &collect(&self.down))
            .field("pressed", &collect(&self.pressed))
            .field("released", &collect(&self.released))
            .finish()
    }
}

impl KeyState {
    pub const fn new() -> Self {
        Self {
            down: [false; KEY_COUNT],
            pressed: [false; KEY_COUNT],
            released: [false; KEY_COUNT],
        }
    }

    pub fn is_down(&self, code: KeyCode) -> bool {
        self.down[code as usize]
    }

    pub fn is_pressed(&self, code: KeyCode) -> bool {
        self.pressed[code as usize]
    }

    pub fn is_released(&self, code: KeyCode) -> bool {
        self.released[code as usize]
    }

    pub fn escape(&self) -> bool {
        self.is_pressed(ESCAPE)
    }

    pub fn enter(&self) -> bool {
        self.is_pressed(ENTER)
    }

    pub fn space(&self) -> bool {
        self.is_pressed(SPACE)
    }

    pub fn shift(&self) -> bool {
        self.is_down(SHIFT)
    }

    // With `repeat`, a held arrow counts on every sample.
    fn arrow(&self, code: KeyCode, repeat: bool) -> bool {
        self.is_pressed(code) || (repeat && self.is_down(code))
    }

    pub fn arrow_up(&self, repeat: bool) -> bool {
        self.arrow(UP, repeat)
    }

    pub fn arrow_down(&self, repeat: bool) -> bool {
        self.arrow(DOWN, repeat)
    }

    pub fn arrow_left(&self, repeat: bool) -> bool {
        self.arrow(LEFT, repeat)
    }

    pub fn arrow_right(&self, repeat: bool) -> bool {
        self.arrow(RIGHT, repeat)
    }

    /// Forget every layer, e.g. after the window comes back from the tray.
    pub fn clear(&mut self) {
        *self = Self::new();
    }
}

/// Raw per-key booleans reported by a key source for one sample.
///
/// `held` is the level state (the key is physically down right now) and
/// `struck` marks keys that received a press event since the previous
/// snapshot, including OS auto-repeat.
#[derive(Clone)]
pub struct RawKeySnapshot {
    pub held: [bool; KEY_COUNT],
    pub struck: [bool; KEY_COUNT],
}

impl Default for RawKeySnapshot {
    fn default() -> Self {
        Self {
            held: [false; KEY_COUNT],
            struck: [false; KEY_COUNT],
        }
    }
}

impl RawKeySnapshot {
    pub fn hold(&mut self, code: KeyCode) -> &mut Self {
        self.held[code as usize] = true;
        self
    }

    pub fn strike(&mut self, code: KeyCode) -> &mut Self {
        self.struck[code as usize] = true;
        self
    }
}
