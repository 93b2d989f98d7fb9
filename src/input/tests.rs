use super::keys::*;
use super::sampler::derive;
use super::*;
use crossterm::event::{KeyCode as TermKey, KeyEvent, KeyEventKind, KeyEventState, KeyModifiers};
use std::collections::VecDeque;

struct ScriptedKeys {
    frames: VecDeque<RawKeySnapshot>,
}

impl KeySource for ScriptedKeys {
    fn snapshot(&mut self) -> RawKeySnapshot {
        self.frames.pop_front().unwrap_or_default()
    }
}

struct QueuedGestures(Vec<String>);

impl GestureSource for QueuedGestures {
    fn drain_gestures(&mut self) -> Vec<String> {
        std::mem::take(&mut self.0)
    }
}

fn held(codes: &[KeyCode]) -> RawKeySnapshot {
    let mut snapshot = RawKeySnapshot::default();
    for code in codes {
        snapshot.hold(*code);
    }
    snapshot
}

fn sampler_with(frames: Vec<RawKeySnapshot>) -> KeySampler {
    KeySampler::new(Box::new(ScriptedKeys {
        frames: frames.into(),
    }))
}

#[test]
fn held_key_presses_once_and_releases_once() {
    let frames = vec![held(&[]), held(&[UP]), held(&[UP]), held(&[UP]), held(&[]), held(&[])];
    let mut sampler = sampler_with(frames);
    let mut state = KeyState::new();
    let mut pressed = Vec::new();
    let mut down = Vec::new();
    let mut released = Vec::new();
    for _ in 0..6 {
        state = sampler.sample(&state);
        pressed.push(state.is_pressed(UP));
        down.push(state.is_down(UP));
        released.push(state.is_released(UP));
    }
    assert_eq!(pressed, [false, true, false, false, false, false]);
    assert_eq!(down, [false, true, true, true, false, false]);
    assert_eq!(released, [false, false, false, false, true, false]);
}

#[test]
fn pressed_implies_down_for_every_layer_combination() {
    for prev_down in [false, true] {
        for held_now in [false, true] {
            for struck in [false, true] {
                for code in [SHIFT, ENTER, UP, F12] {
                    let mut previous = KeyState::new();
                    previous.down[code as usize] = prev_down;
                    let mut raw = RawKeySnapshot::default();
                    raw.held[code as usize] = held_now;
                    raw.struck[code as usize] = struck;
                    let next = derive(&previous, &raw, &[false; KEY_COUNT]);
                    if next.is_pressed(code) {
                        assert!(next.is_down(code));
                    }
                    assert!(!(next.is_pressed(code) && next.is_released(code)));
                }
            }
        }
    }
}

#[test]
fn repeated_strike_rearms_only_low_codes() {
    let mut previous = KeyState::new();
    previous.down[UP as usize] = true;
    previous.down[SHIFT as usize] = true;
    let mut raw = RawKeySnapshot::default();
    raw.strike(UP).strike(SHIFT);
    let next = derive(&previous, &raw, &[false; KEY_COUNT]);
    assert!(next.is_down(UP));
    assert!(!next.is_pressed(UP));
    assert!(next.is_pressed(SHIFT));
}

#[test]
fn strike_without_hold_releases_on_next_sample() {
    let mut first = RawKeySnapshot::default();
    first.strike(ENTER);
    let mut sampler = sampler_with(vec![first, RawKeySnapshot::default()]);
    let state = sampler.sample(&KeyState::new());
    assert!(state.enter());
    let state = sampler.sample(&state);
    assert!(!state.enter());
    assert!(state.is_released(ENTER));
}

#[test]
fn gestures_map_to_insert_chords() {
    let mut sampler = sampler_with(Vec::new()).with_gestures(Box::new(QueuedGestures(vec![
        "KB(Desktop):NVDA+UpArrow".to_string(),
        "kb(laptop):nvda+q".to_string(),
    ])));
    let state = sampler.sample(&KeyState::new());
    assert!(state.is_pressed(INSERT));
    assert!(state.arrow_up(false));
    assert!(!state.arrow_down(false));
    assert!(!state.is_pressed(b'Q'));
}

#[test]
fn gesture_table_is_case_insensitive() {
    assert_eq!(gesture_keys("kb(laptop):nvda+a"), &[INSERT, DOWN]);
    assert_eq!(gesture_keys("KB(LAPTOP):NVDA+L"), &[INSERT, UP]);
    assert!(gesture_keys("kb(laptop):nvda+t").is_empty());
}

#[test]
fn staged_state_replaces_one_sample_then_clears() {
    let mut sampler = sampler_with(vec![held(&[LEFT]), held(&[LEFT])]);
    let staging = sampler.staging();
    let mut staged = KeyState::new();
    staged.pressed[ESCAPE as usize] = true;
    staged.down[ESCAPE as usize] = true;
    assert!(!staging.stage(staged.clone()));

    let first = sampler.sample(&KeyState::new());
    assert_eq!(first, staged);
    assert!(!staging.is_staged());

    let second = sampler.sample(&first);
    assert!(second.arrow_left(false));
    assert!(second.is_released(ESCAPE));
}

#[test]
fn staging_reports_overwrites() {
    let staging = KeyStaging::new();
    assert!(!staging.stage(KeyState::new()));
    assert!(staging.stage(KeyState::new()));
    assert!(staging.take().is_some());
    assert!(staging.take().is_none());
}

#[test]
fn arrow_repeat_reads_down_layer() {
    let mut state = KeyState::new();
    state.down[DOWN as usize] = true;
    assert!(!state.arrow_down(false));
    assert!(state.arrow_down(true));
    state.clear();
    assert!(!state.arrow_down(true));
}

#[test]
fn function_keys_cover_f1_to_f12() {
    assert_eq!(function_key(1), Some(F1));
    assert_eq!(function_key(12), Some(F12));
    assert_eq!(function_key(13), None);
}

fn key_event(code: TermKey, modifiers: KeyModifiers, kind: KeyEventKind) -> KeyEvent {
    KeyEvent {
        code,
        modifiers,
        kind,
        state: KeyEventState::NONE,
    }
}

#[test]
fn terminal_source_folds_events_into_strikes() {
    let (tx, rx) = crossbeam_channel::unbounded();
    let mut source = TerminalKeySource::from_receiver(rx);
    tx.send(key_event(TermKey::Char('q'), KeyModifiers::SHIFT, KeyEventKind::Press))
        .unwrap();
    tx.send(key_event(TermKey::F(12), KeyModifiers::NONE, KeyEventKind::Press))
        .unwrap();
    let snapshot = source.snapshot();
    assert!(snapshot.struck[b'Q' as usize]);
    assert!(snapshot.struck[SHIFT as usize]);
    assert!(snapshot.struck[F12 as usize]);
    assert!(!snapshot.held[F12 as usize]);

    let snapshot = source.snapshot();
    assert!(!snapshot.struck.iter().any(|s| *s));
}

#[test]
fn map_key_covers_navigation_keys() {
    assert_eq!(map_key(TermKey::Esc), Some(ESCAPE));
    assert_eq!(map_key(TermKey::Down), Some(DOWN));
    assert_eq!(map_key(TermKey::Char(' ')), Some(SPACE));
    assert_eq!(map_key(TermKey::Null), None);
}
