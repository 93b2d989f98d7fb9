//! Keyboard sampling: raw snapshots in, edge-triggered `KeyState` out.

mod gestures;
pub mod keys;
mod sampler;
mod staging;
mod terminal;
#[cfg(test)]
mod tests;

pub use gestures::gesture_keys;
pub use keys::{KeyCode, KeyState, RawKeySnapshot};
pub use sampler::{GestureSource, KeySampler, KeySource};
pub use staging::KeyStaging;
pub use terminal::{map_key, TerminalKeySource};
