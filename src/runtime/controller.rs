use super::engine::LoopCore;
use super::fault::{FaultCause, LoopFaultSignal};
use super::recovery::{RecoveryAction, RecoveryStateMachine};
use super::scene::{Cue, Scene, SceneFactory, StepOutcome};
use crate::agent::terminate_pids;
use crate::app::logging::panic_payload_text;
use crate::log_debug;
use anyhow::Result;
use serde_json::json;
use std::panic::{self, AssertUnwindSafe};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Continue,
    /// No scene is left to run
    Stopped,
}

/// Top-level driver: one `tick` per frame, faults routed to recovery.
pub struct LoopController {
    pub(crate) core: LoopCore,
    pub(crate) scene: Option<Box<dyn Scene>>,
    pub(crate) stack: Vec<Box<dyn Scene>>,
    pub(crate) factory: Box<dyn SceneFactory>,
    pub(crate) recovery: RecoveryStateMachine,
    steps: u64,
}

impl LoopController {
    /// Start with the update scene while updating, otherwise the loading scene.
    pub fn new(core: LoopCore, factory: Box<dyn SceneFactory>) -> Self {
        let initial = if core.ctx.session.updating {
            factory.update()
        } else {
            factory.loading()
        };
        Self::with_scene(core, factory, initial)
    }

    pub fn with_scene(core: LoopCore, factory: Box<dyn SceneFactory>, scene: Box<dyn Scene>) -> Self {
        Self {
            core,
            scene: Some(scene),
            stack: Vec::new(),
            factory,
            recovery: RecoveryStateMachine::new(),
            steps: 0,
        }
    }

    pub fn core(&self) -> &LoopCore {
        &self.core
    }

    pub fn core_mut(&mut self) -> &mut LoopCore {
        &mut self.core
    }

    pub fn scene_name(&self) -> Option<&str> {
        self.scene.as_ref().map(|scene| scene.name())
    }

    pub fn stack_depth(&self) -> usize {
        self.stack.len()
    }

    pub fn recovery(&self) -> &RecoveryStateMachine {
        &self.recovery
    }

    /// Scene steps completed without a fault.
    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub(crate) fn load_scene(&mut self, scene: Box<dyn Scene>) {
        log_debug(&format!("scene -> {}", scene.name()));
        self.core.ctx.clear_notification_callback();
        self.scene = Some(scene);
    }

    pub(crate) fn push_scene(&mut self, scene: Box<dyn Scene>) {
        if let Some(current) = self.scene.take() {
            self.stack.push(current);
        }
        self.load_scene(scene);
    }

    /// One full pass: control flags, refresh, then the scene step.
    pub fn tick(&mut self) -> Result<TickOutcome, LoopFaultSignal> {
        self.core.check_control()?;
        self.core.refresh()?;

        let Some(scene) = self.scene.as_mut() else {
            return Ok(TickOutcome::Stopped);
        };

        while let Some(signal) = self.core.ctx.signals.pop_front() {
            if scene.app_id() == Some(signal.app_id.as_str()) {
                self.core.collab.presenter.play(Cue::Signal);
                scene.signaled(&mut self.core, &signal.sender, &signal.packet);
            } else {
                log_debug(&format!(
                    "dropping signal for {} from {}",
                    signal.app_id, signal.sender
                ));
            }
        }

        let core = &mut self.core;
        let stepped = panic::catch_unwind(AssertUnwindSafe(|| scene.step(core)));
        let outcome = match stepped {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(LoopFaultSignal::Unhandled(cause))) => {
                return Err(LoopFaultSignal::Unhandled(cause.in_scene(scene.name())));
            }
            Ok(Err(signal)) => return Err(signal),
            Err(payload) => {
                let cause = FaultCause::new(panic_payload_text(payload.as_ref()))
                    .in_scene(scene.name());
                return Err(LoopFaultSignal::Unhandled(cause));
            }
        };
        self.steps += 1;
        self.recovery.note_clean_step();

        match outcome {
            StepOutcome::Continue => {}
            StepOutcome::Switch(next) => self.load_scene(next),
            StepOutcome::Push(next) => self.push_scene(next),
            StepOutcome::Finish => match self.stack.pop() {
                Some(previous) => self.load_scene(previous),
                None => {
                    self.scene = None;
                    return Ok(TickOutcome::Stopped);
                }
            },
        }
        Ok(TickOutcome::Continue)
    }

    /// Tick until the loop stops or recovery decides to terminate, then shut down.
    pub fn run(&mut self) -> Result<()> {
        let result = loop {
            match self.tick() {
                Ok(TickOutcome::Continue) => {}
                Ok(TickOutcome::Stopped) => break Ok(()),
                Err(signal) => match self.recover(signal) {
                    RecoveryAction::Resume => {}
                    RecoveryAction::Terminate => break Ok(()),
                    RecoveryAction::Reraise(cause) => {
                        break Err(anyhow::anyhow!("aborted after unhandled fault: {}", cause.report()))
                    }
                },
            }
        };
        self.shutdown();
        result
    }

    /// Logout cue, shutdown hooks, disconnect notice, then stop the agent and helper processes.
    pub fn shutdown(&mut self) {
        let core = &mut self.core;
        if core.shutting_down {
            return;
        }
        core.shutting_down = true;
        tracing::info!("exiting");
        core.collab.presenter.play(Cue::Logout);
        for hook in core.collab.shutdown_hooks.iter_mut() {
            if let Err(err) = hook.run() {
                log_debug(&format!("shutdown hook {} failed: {err:#}", hook.name()));
            }
        }
        if core.ctx.session.authenticated {
            if let Err(err) = core.collab.server.request("logout", &json!({})) {
                log_debug(&format!("disconnect notice failed: {err:#}"));
            }
        }
        core.supervisor.shutdown();
        terminate_pids(&core.ctx.child_pids);
        core.ctx.child_pids.clear();
        core.ctx.drop_pending();
    }
}
