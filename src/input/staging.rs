use super::keys::KeyState;
use crate::lock_or_recover;
use std::sync::{Arc, Mutex};

/// Single-slot handoff of a complete `KeyState` to the sampler.
///
/// A producer stages a state; the next sample takes it out of the slot, so
/// the state has exactly one owner at any time.
#[derive(Clone, Default)]
pub struct KeyStaging {
    slot: Arc<Mutex<Option<KeyState>>>,
}

impl KeyStaging {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace whatever is staged. Returns true when an unconsumed state was overwritten.
    pub fn stage(&self, state: KeyState) -> bool {
        lock_or_recover(&self.slot, "KeyStaging::stage")
            .replace(state)
            .is_some()
    }

    pub fn take(&self) -> Option<KeyState> {
        lock_or_recover(&self.slot, "KeyStaging::take").take()
    }

    pub fn is_staged(&self) -> bool {
        lock_or_recover(&self.slot, "KeyStaging::is_staged").is_some()
    }
}
