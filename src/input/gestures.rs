//! Screen-reader gestures that stand in for keyboard chords.

use super::keys::{KeyCode, DOWN, INSERT, UP};

/// Gesture names are compared lowercase.
const GESTURE_KEYS: &[(&str, &[KeyCode])] = &[
    // Say all.
    ("kb(laptop):nvda+a", &[INSERT, DOWN]),
    ("kb(desktop):nvda+downarrow", &[INSERT, DOWN]),
    // Read current line.
    ("kb(laptop):nvda+l", &[INSERT, UP]),
    ("kb(desktop):nvda+uparrow", &[INSERT, UP]),
];

/// Synthetic key codes for a gesture name, or an empty slice when the gesture is not mapped.
pub fn gesture_keys(name: &str) -> &'static [KeyCode] {
    let name = name.trim().to_ascii_lowercase();
    GESTURE_KEYS
        .iter()
        .find(|(gesture, _)| *gesture == name)
        .map(|(_, codes)| *codes)
        .unwrap_or(&[])
}
