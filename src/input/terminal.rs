//! Keyboard source backed by crossterm terminal events.

use super::keys::{self, KeyCode as VirtualKey, RawKeySnapshot, KEY_COUNT};
use super::sampler::KeySource;
use crate::log_debug;
use crossbeam_channel::{Receiver, Sender, TryRecvError};
use crossterm::event::{
    self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, ModifierKeyCode,
};
use std::thread;

/// Reads terminal key events on a background thread and folds them into snapshots.
///
/// Terminals that report release events (kitty keyboard protocol) give real
/// `held` state; everywhere else each press only shows up as a strike.
pub struct TerminalKeySource {
    rx: Receiver<KeyEvent>,
    held: [bool; KEY_COUNT],
}

impl TerminalKeySource {
    pub fn spawn() -> Self {
        let (tx, rx) = crossbeam_channel::unbounded();
        spawn_key_thread(tx);
        Self::from_receiver(rx)
    }

    pub fn from_receiver(rx: Receiver<KeyEvent>) -> Self {
        Self {
            rx,
            held: [false; KEY_COUNT],
        }
    }
}

impl KeySource for TerminalKeySource {
    fn snapshot(&mut self) -> RawKeySnapshot {
        let mut snapshot = RawKeySnapshot::default();
        loop {
            let key = match self.rx.try_recv() {
                Ok(key) => key,
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            };
            let Some(code) = map_key(key.code) else {
                continue;
            };
            match key.kind {
                KeyEventKind::Press | KeyEventKind::Repeat => {
                    snapshot.strike(code);
                    for modifier in modifier_codes(key.modifiers) {
                        snapshot.strike(modifier);
                    }
                    if is_modifier(key.code) {
                        self.held[code as usize] = true;
                    }
                }
                KeyEventKind::Release => {
                    self.held[code as usize] = false;
                }
            }
        }
        snapshot.held = self.held;
        snapshot
    }
}

fn spawn_key_thread(tx: Sender<KeyEvent>) -> thread::JoinHandle<()> {
    thread::spawn(move || loop {
        match event::read() {
            Ok(Event::Key(key)) => {
                if tx.send(key).is_err() {
                    return;
                }
            }
            Ok(_) => {}
            Err(err) => {
                log_debug(&format!("terminal event read error: {err}"));
                return;
            }
        }
    })
}

fn is_modifier(code: KeyCode) -> bool {
    matches!(code, KeyCode::Modifier(_))
}

fn modifier_codes(modifiers: KeyModifiers) -> impl Iterator<Item = VirtualKey> {
    [
        (KeyModifiers::SHIFT, keys::SHIFT),
        (KeyModifiers::CONTROL, keys::CONTROL),
        (KeyModifiers::ALT, keys::ALT),
    ]
    .into_iter()
    .filter(move |(flag, _)| modifiers.contains(*flag))
    .map(|(_, code)| code)
}

/// Map a crossterm key to its virtual key code.
pub fn map_key(code: KeyCode) -> Option<VirtualKey> {
    let mapped = match code {
        KeyCode::Backspace => keys::BACKSPACE,
        KeyCode::Tab | KeyCode::BackTab => keys::TAB,
        KeyCode::Enter => keys::ENTER,
        KeyCode::Esc => keys::ESCAPE,
        KeyCode::PageUp => keys::PAGE_UP,
        KeyCode::PageDown => keys::PAGE_DOWN,
        KeyCode::End => keys::END,
        KeyCode::Home => keys::HOME,
        KeyCode::Left => keys::LEFT,
        KeyCode::Up => keys::UP,
        KeyCode::Right => keys::RIGHT,
        KeyCode::Down => keys::DOWN,
        KeyCode::Insert => keys::INSERT,
        KeyCode::Delete => keys::DELETE,
        KeyCode::F(n) => keys::function_key(n)?,
        KeyCode::Char(' ') => keys::SPACE,
        KeyCode::Char(ch) if ch.is_ascii_alphanumeric() => ch.to_ascii_uppercase() as u8,
        KeyCode::Modifier(
            ModifierKeyCode::LeftShift | ModifierKeyCode::RightShift,
        ) => keys::SHIFT,
        KeyCode::Modifier(
            ModifierKeyCode::LeftControl | ModifierKeyCode::RightControl,
        ) => keys::CONTROL,
        KeyCode::Modifier(ModifierKeyCode::LeftAlt | ModifierKeyCode::RightAlt) => keys::ALT,
        _ => return None,
    };
    Some(mapped)
}
