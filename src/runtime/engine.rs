use super::context::{LoopContext, LoopControl};
use super::fault::LoopFaultSignal;
use super::scene::{Collaborators, Cue};
use crate::agent::{
    AgentCommand, AgentDispatcher, AgentSupervisor, DispatchStats, FrameChannel, SupervisorEvent,
};
use crate::input::{keys, KeySampler, KeyState};
use crate::log_debug;
use serde_json::json;
use std::thread;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct LoopSettings {
    pub tick_interval: Duration,
    pub request_timeout: Duration,
    pub max_frame_buffer_bytes: usize,
    pub debug: bool,
}

/// Keeps ticks at most `interval` apart without sleeping when a tick ran long.
struct FramePacer {
    interval: Duration,
    last: Instant,
}

impl FramePacer {
    fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: Instant::now(),
        }
    }

    fn wait(&mut self) {
        let elapsed = self.last.elapsed();
        if elapsed < self.interval {
            thread::sleep(self.interval - elapsed);
        }
        self.last = Instant::now();
    }
}

/// Everything a tick needs except the scene itself.
///
/// Scenes receive `&mut LoopCore` for their step; anything that waits on the
/// user or the agent keeps calling `pump` so sampling, dispatch and
/// supervision never stall.
pub struct LoopCore {
    pub ctx: LoopContext,
    sampler: KeySampler,
    channel: FrameChannel,
    dispatcher: AgentDispatcher,
    pub(crate) supervisor: AgentSupervisor,
    pub(crate) collab: Collaborators,
    control: LoopControl,
    pub(crate) settings: LoopSettings,
    pacer: FramePacer,
    pub(crate) shutting_down: bool,
    ticks: u64,
}

impl LoopCore {
    pub fn new(
        settings: LoopSettings,
        sampler: KeySampler,
        supervisor: AgentSupervisor,
        collab: Collaborators,
        control: LoopControl,
    ) -> Self {
        let mut ctx = LoopContext::new();
        ctx.flags.debug = settings.debug;
        Self {
            ctx,
            sampler,
            channel: FrameChannel::detached(settings.max_frame_buffer_bytes),
            dispatcher: AgentDispatcher::new(),
            supervisor,
            collab,
            control,
            pacer: FramePacer::new(settings.tick_interval),
            settings,
            shutting_down: false,
            ticks: 0,
        }
    }

    /// Launch the agent and attach the channel to its output. A failed launch
    /// is logged and left to the supervisor to retry.
    pub fn start_agent(&mut self) -> bool {
        match self.supervisor.start() {
            Ok(output) => {
                self.channel.replace_receiver(output);
                true
            }
            Err(err) => {
                tracing::error!(error = %format!("{err:#}"), "agent failed to start");
                log_debug(&format!("agent failed to start: {err:#}"));
                false
            }
        }
    }

    pub fn control(&self) -> &LoopControl {
        &self.control
    }

    pub fn keys(&self) -> &KeyState {
        &self.ctx.keys
    }

    pub fn supervisor(&self) -> &AgentSupervisor {
        &self.supervisor
    }

    pub fn dispatch_stats(&self) -> &DispatchStats {
        self.dispatcher.stats()
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn speak(&mut self, text: &str) {
        self.collab.presenter.speak(text);
    }

    pub fn play(&mut self, cue: Cue) {
        self.collab.presenter.play(cue);
    }

    /// Run one pass of the loop on behalf of a waiting caller: pending control
    /// flags first, then the refresh steps.
    pub fn pump(&mut self) -> Result<(), LoopFaultSignal> {
        self.check_control()?;
        self.refresh()
    }

    pub(crate) fn check_control(&mut self) -> Result<(), LoopFaultSignal> {
        if self.control.take_reset() {
            return Err(LoopFaultSignal::SoftReset);
        }
        if self.control.exit_requested() && !self.shutting_down {
            return Err(LoopFaultSignal::ExitRequested);
        }
        if self.control.take_hangup() {
            return Err(LoopFaultSignal::Hangup);
        }
        Ok(())
    }

    pub(crate) fn sample_keys(&mut self) {
        self.ctx.keys = self.sampler.sample(&self.ctx.keys);
    }

    /// Sampling, agent drain and dispatch, supervision, pause gate and alarm,
    /// in that order, then wait out the rest of the frame.
    pub(crate) fn refresh(&mut self) -> Result<(), LoopFaultSignal> {
        self.ticks += 1;

        self.sample_keys();
        self.check_restart_hotkey()?;

        if std::mem::take(&mut self.ctx.flags.tray_restored) {
            self.ctx.keys.clear();
            self.collab.presenter.play(Cue::Login);
            self.collab.presenter.speak("ELTEN");
        }
        self.drain_agent();
        self.handle_incidents()?;

        match self.supervisor.tick() {
            SupervisorEvent::Died { .. } => self.collab.presenter.play(Cue::Failure),
            SupervisorEvent::Promoted { output } => self.channel.replace_receiver(output),
            SupervisorEvent::Idle | SupervisorEvent::RestartFailed => {}
        }

        self.control.wait_while_paused();

        self.check_alarm()?;

        self.pacer.wait();
        Ok(())
    }

    fn drain_agent(&mut self) {
        let report = self.channel.drain();
        if let Some(corruption) = &report.corruption {
            tracing::warn!(
                offset = corruption.offset,
                dropped = corruption.dropped_bytes,
                "agent frame corruption: {}",
                corruption.reason
            );
            log_debug(&format!("agent frame corruption: {corruption}"));
        }
        for frame in report.frames {
            self.dispatcher.dispatch(frame, &mut self.ctx, &mut self.collab);
        }
        if report.disconnected {
            log_debug("agent output closed; waiting for the supervisor");
            self.channel = FrameChannel::detached(self.settings.max_frame_buffer_bytes);
        }
    }

    fn check_restart_hotkey(&mut self) -> Result<(), LoopFaultSignal> {
        if !self.ctx.keys.is_pressed(keys::F12) || self.ctx.flags.hotkey_active {
            return Ok(());
        }
        self.ctx.flags.hotkey_active = true;
        let answer = self.confirm("Are you sure you want to restart Elten?");
        self.ctx.flags.hotkey_active = false;
        if answer? {
            self.control.request_reset();
        }
        Ok(())
    }

    fn handle_incidents(&mut self) -> Result<(), LoopFaultSignal> {
        if self.ctx.flags.incident_active {
            return Ok(());
        }
        while let Some(incident) = self.ctx.incidents.pop_front() {
            self.ctx.flags.incident_active = true;
            let result = self.report_incident(&incident);
            self.ctx.flags.incident_active = false;
            result?;
        }
        Ok(())
    }

    fn report_incident(
        &mut self,
        incident: &super::context::AgentIncident,
    ) -> Result<(), LoopFaultSignal> {
        let report = match &incident.location {
            Some(location) => format!("{}\r\n{location}", incident.message),
            None => incident.message.clone(),
        };
        if self.confirm(
            "An unexpected error of Elten agent occurred. Do you want to report this event? It may help us solve the problem.",
        )? {
            self.send_bug_report(&format!("Elten Agent Error:\r\n{report}"));
        }
        self.alert("The program is trying to recover from the frozen state.")
    }

    pub(crate) fn send_bug_report(&mut self, report: &str) {
        let params = json!({ "buginfo": report, "version": env!("CARGO_PKG_VERSION") });
        match self.collab.server.request("bug", &params) {
            Ok(_) => self.collab.presenter.speak("Report sent."),
            Err(err) => {
                log_debug(&format!("bug report failed: {err:#}"));
                self.collab.presenter.play(Cue::Failure);
            }
        }
    }

    fn check_alarm(&mut self) -> Result<(), LoopFaultSignal> {
        if !self.ctx.flags.alarm || self.ctx.flags.alarm_active {
            return Ok(());
        }
        self.ctx.flags.alarm_active = true;
        let acknowledged = self.alert("Alarm");
        self.ctx.flags.alarm_active = false;
        acknowledged?;
        self.ctx.flags.alarm = false;
        if let Err(err) = self.supervisor.send(&AgentCommand::AlarmStop) {
            log_debug(&format!("failed to stop alarm: {err}"));
        }
        Ok(())
    }
}
