//! Decides what happens after a scene step raises a `LoopFaultSignal`.

use super::controller::LoopController;
use super::engine::LoopCore;
use super::fault::{FaultCause, LoopFaultSignal};
use super::scene::Cue;
use crate::log_debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryState {
    Running,
    Faulted,
    Resuming,
    RescueMenu,
    Terminating,
}

/// Next step for the loop once a fault is handled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryAction {
    Resume,
    Terminate,
    /// Debug-mode abort: hand the fault back to the caller
    Reraise(FaultCause),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RescueChoice {
    CopyReport,
    Restart,
    TryAgain,
    RescueMode,
    Abort,
}

const RESCUE_OPTIONS: [(&str, RescueChoice); 5] = [
    ("Copy error report to clipboard", RescueChoice::CopyReport),
    ("Restart", RescueChoice::Restart),
    ("Try again", RescueChoice::TryAgain),
    ("Rescue mode", RescueChoice::RescueMode),
    ("Abort", RescueChoice::Abort),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RescueModeChoice {
    Quit,
    Reinstall,
    OpenForum,
    OpenMessages,
}

#[derive(Debug)]
pub struct RecoveryStateMachine {
    state: RecoveryState,
    // Set while a soft reset has been handled and no clean step has run since.
    resetting: bool,
    // A soft reset requested while the rescue prompts were open.
    reset_deferred: bool,
    faults: u64,
}

impl Default for RecoveryStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl RecoveryStateMachine {
    pub fn new() -> Self {
        Self {
            state: RecoveryState::Running,
            resetting: false,
            reset_deferred: false,
            faults: 0,
        }
    }

    pub fn state(&self) -> RecoveryState {
        self.state
    }

    pub fn faults(&self) -> u64 {
        self.faults
    }

    pub fn is_resetting(&self) -> bool {
        self.resetting
    }

    fn enter(&mut self, state: RecoveryState) {
        if self.state != state {
            log_debug(&format!("recovery {:?} -> {:?}", self.state, state));
        }
        self.state = state;
    }

    pub(crate) fn note_clean_step(&mut self) {
        self.resetting = false;
        self.enter(RecoveryState::Running);
    }

    /// Returns false when this reset is swallowed by the reset guard.
    fn begin_reset(&mut self) -> bool {
        if self.resetting {
            self.resetting = false;
            return false;
        }
        self.resetting = true;
        true
    }
}

impl LoopController {
    /// Handle a fault raised by `tick`, including any signal raised while
    /// prompting the user about it.
    pub(crate) fn recover(&mut self, mut signal: LoopFaultSignal) -> RecoveryAction {
        loop {
            self.recovery.faults += 1;
            self.recovery.enter(RecoveryState::Faulted);
            let handled = match signal {
                LoopFaultSignal::SoftReset => Ok(self.soft_reset()),
                LoopFaultSignal::Hangup => {
                    log_debug("hangup; resuming");
                    Ok(RecoveryAction::Resume)
                }
                LoopFaultSignal::ExitRequested => Ok(self.exit_requested()),
                LoopFaultSignal::Unhandled(cause) => self.unhandled(cause),
            };
            match handled {
                Ok(action) => {
                    let deferred = std::mem::take(&mut self.recovery.reset_deferred);
                    let action = match action {
                        RecoveryAction::Resume if deferred => self.soft_reset(),
                        other => other,
                    };
                    self.recovery.enter(match action {
                        RecoveryAction::Resume => RecoveryState::Resuming,
                        RecoveryAction::Terminate | RecoveryAction::Reraise(_) => {
                            RecoveryState::Terminating
                        }
                    });
                    return action;
                }
                Err(nested) => signal = nested,
            }
        }
    }

    fn soft_reset(&mut self) -> RecoveryAction {
        if !self.recovery.begin_reset() {
            log_debug("soft reset ignored: reset already in progress");
            return RecoveryAction::Resume;
        }
        tracing::info!("soft reset");
        self.core.ctx.drop_pending();
        self.core.ctx.sockets.clear();
        self.stack.clear();
        let loading = self.factory.loading();
        self.load_scene(loading);
        self.core.sample_keys();
        if self.core.ctx.keys.shift() {
            self.core.ctx.flags.debug = true;
            self.core.play(Cue::Signal);
        }
        RecoveryAction::Resume
    }

    fn exit_requested(&mut self) -> RecoveryAction {
        if self.exit_deferred() {
            log_debug("exit deferred: update or first run in progress");
            self.core.control().clear_exit();
            self.core.play(Cue::ListFocus);
            return RecoveryAction::Resume;
        }
        RecoveryAction::Terminate
    }

    fn unhandled(&mut self, cause: FaultCause) -> Result<RecoveryAction, LoopFaultSignal> {
        tracing::error!(
            scene = cause.scene.as_deref().unwrap_or(""),
            "critical error: {}",
            cause.message
        );
        log_debug("unhandled fault; showing rescue menu");
        crate::log_debug_content(&format!("unhandled fault: {}", cause.report()));
        self.core.play(Cue::Failure);
        self.core
            .speak(&format!("Critical error occurred: {}", cause.message));
        if self.rescue_prompt(|core| core.confirm("Do you want to send the error report?"))? {
            self.core.send_bug_report(&cause.report());
        }

        self.recovery.enter(RecoveryState::RescueMenu);
        let labels: Vec<&str> = RESCUE_OPTIONS.iter().map(|(label, _)| *label).collect();
        loop {
            let Some(index) = self.rescue_prompt(|core| core.choose(&labels, "What to do?", false))?
            else {
                continue;
            };
            match RESCUE_OPTIONS[index].1 {
                RescueChoice::CopyReport => {
                    match self.core.collab.presenter.copy_to_clipboard(&cause.report()) {
                        Ok(()) => self.core.speak("Copied to clipboard"),
                        Err(err) => {
                            log_debug(&format!("clipboard copy failed: {err:#}"));
                            self.core.play(Cue::Failure);
                        }
                    }
                }
                RescueChoice::Restart => {
                    let fresh = self
                        .scene
                        .as_ref()
                        .and_then(|scene| scene.fresh())
                        .unwrap_or_else(|| self.factory.loading());
                    self.load_scene(fresh);
                    return Ok(RecoveryAction::Resume);
                }
                RescueChoice::TryAgain => return Ok(RecoveryAction::Resume),
                RescueChoice::RescueMode => return self.rescue_mode(),
                RescueChoice::Abort => {
                    if self.core.ctx.flags.debug {
                        return Ok(RecoveryAction::Reraise(cause));
                    }
                    return Ok(RecoveryAction::Terminate);
                }
            }
        }
    }

    /// Runs one rescue prompt until it is answered. Hangups and deferred exits
    /// re-show the prompt; a soft reset is held until the menu is resolved.
    fn rescue_prompt<T>(
        &mut self,
        mut prompt: impl FnMut(&mut LoopCore) -> Result<T, LoopFaultSignal>,
    ) -> Result<T, LoopFaultSignal> {
        loop {
            match prompt(&mut self.core) {
                Err(LoopFaultSignal::Hangup) => log_debug("hangup during rescue prompt"),
                Err(LoopFaultSignal::SoftReset) => {
                    log_debug("soft reset deferred until the rescue menu is resolved");
                    self.recovery.reset_deferred = true;
                }
                Err(LoopFaultSignal::ExitRequested) if self.exit_deferred() => {
                    self.core.control().clear_exit();
                }
                other => return other,
            }
        }
    }

    fn exit_deferred(&self) -> bool {
        let session = &self.core.ctx.session;
        session.updating || session.first_run
    }

    fn rescue_mode(&mut self) -> Result<RecoveryAction, LoopFaultSignal> {
        self.core.speak("Rescue mode");
        let mut options = vec![
            ("Quit", RescueModeChoice::Quit),
            ("Reinstall", RescueModeChoice::Reinstall),
        ];
        if self.core.ctx.session.authenticated {
            options.push(("Try to open forum", RescueModeChoice::OpenForum));
            options.push(("Try to open messages", RescueModeChoice::OpenMessages));
        }
        let labels: Vec<&str> = options.iter().map(|(label, _)| *label).collect();
        let index = loop {
            if let Some(index) =
                self.rescue_prompt(|core| core.choose(&labels, "Rescue mode", false))?
            {
                break index;
            }
        };
        log_debug(&format!("rescue mode: {}", labels[index]));
        match options[index].1 {
            RescueModeChoice::Quit => Ok(RecoveryAction::Terminate),
            RescueModeChoice::Reinstall => {
                let update = self.factory.update();
                self.load_scene(update);
                Ok(RecoveryAction::Resume)
            }
            RescueModeChoice::OpenForum => {
                let forum = self.factory.forum();
                self.push_scene(forum);
                Ok(RecoveryAction::Resume)
            }
            RescueModeChoice::OpenMessages => {
                let messages = self.factory.messages();
                self.push_scene(messages);
                Ok(RecoveryAction::Resume)
            }
        }
    }
}
