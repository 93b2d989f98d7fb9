//! Blocking prompts. Each one waits by pumping the loop, never by sleeping alone.

use super::engine::LoopCore;
use super::fault::LoopFaultSignal;
use super::scene::Cue;

impl LoopCore {
    /// Announce `text` and wait for Enter, Escape or Space.
    pub fn alert(&mut self, text: &str) -> Result<(), LoopFaultSignal> {
        self.collab.presenter.play(Cue::DialogOpen);
        self.collab.presenter.speak(text);
        loop {
            self.pump()?;
            let keys = &self.ctx.keys;
            if keys.enter() || keys.escape() || keys.space() {
                self.collab.presenter.play(Cue::DialogClose);
                return Ok(());
            }
        }
    }

    /// No/Yes question; Escape answers no.
    pub fn confirm(&mut self, text: &str) -> Result<bool, LoopFaultSignal> {
        Ok(self.choose(&["No", "Yes"], text, true)? == Some(1))
    }

    /// Vertical menu driven by the arrow keys. Returns the chosen index, or
    /// `None` when `escapable` and the user pressed Escape.
    pub fn choose(
        &mut self,
        options: &[&str],
        header: &str,
        escapable: bool,
    ) -> Result<Option<usize>, LoopFaultSignal> {
        if options.is_empty() {
            return Ok(None);
        }
        let mut index = 0usize;
        self.collab
            .presenter
            .speak(&format!("{header}: {}", options[index]));
        loop {
            self.pump()?;
            let keys = &self.ctx.keys;
            let moved = if keys.arrow_down(false) {
                index = (index + 1) % options.len();
                true
            } else if keys.arrow_up(false) {
                index = (index + options.len() - 1) % options.len();
                true
            } else {
                false
            };
            if keys.enter() {
                return Ok(Some(index));
            }
            if escapable && keys.escape() {
                return Ok(None);
            }
            if moved {
                self.collab.presenter.play(Cue::ListFocus);
                self.collab.presenter.speak(options[index]);
            }
        }
    }
}
