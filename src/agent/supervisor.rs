use super::process::{AgentHandle, AgentLauncher, AgentStatus, SpawnedAgent};
use super::protocol::AgentCommand;
use crate::log_debug;
use crossbeam_channel::{Receiver, TryRecvError};
use std::fmt;
use std::io;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

const SHUTDOWN_RESTART_WAIT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy)]
pub struct SupervisorConfig {
    /// Probe the agent once every this many ticks
    pub probe_interval_ticks: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    Healthy,
    Dead,
    Restarting,
}

/// What a supervisor tick observed.
#[derive(Debug)]
pub enum SupervisorEvent {
    Idle,
    /// The agent was found dead; a replacement launch has started
    Died { exit_code: Option<i32> },
    /// A replacement is now authoritative; read its output from here on
    Promoted { output: Receiver<Vec<u8>> },
    /// The replacement could not be started; retried on the next probe window
    RestartFailed,
}

#[derive(Debug)]
pub enum AgentSendError {
    Unavailable(SupervisorState),
    Io(io::Error),
}

impl fmt::Display for AgentSendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgentSendError::Unavailable(state) => write!(f, "agent unavailable ({state:?})"),
            AgentSendError::Io(err) => write!(f, "agent write failed: {err}"),
        }
    }
}

impl std::error::Error for AgentSendError {}

type RestartResult = anyhow::Result<SpawnedAgent>;

/// Owns the authoritative agent handle and restarts the agent when it dies.
///
/// Probes are decimated to one every `probe_interval_ticks` ticks. A restart
/// runs on its own thread; while it is in flight no new probe is made.
pub struct AgentSupervisor {
    launcher: Arc<dyn AgentLauncher>,
    config: SupervisorConfig,
    handle: Option<Box<dyn AgentHandle>>,
    state: SupervisorState,
    ticks_since_probe: u64,
    restart_rx: Option<Receiver<RestartResult>>,
    failures: u64,
    consecutive_failures: u64,
    restarts: u64,
    last_failure: Option<Instant>,
}

impl AgentSupervisor {
    pub fn new(launcher: Arc<dyn AgentLauncher>, config: SupervisorConfig) -> Self {
        Self {
            launcher,
            config,
            handle: None,
            state: SupervisorState::Dead,
            ticks_since_probe: 0,
            restart_rx: None,
            failures: 0,
            consecutive_failures: 0,
            restarts: 0,
            last_failure: None,
        }
    }

    /// Launch the first agent synchronously. On failure the supervisor stays
    /// `Dead` and retries at the next probe window.
    pub fn start(&mut self) -> anyhow::Result<Receiver<Vec<u8>>> {
        let spawned = self.launcher.launch()?;
        self.handle = Some(spawned.handle);
        self.state = SupervisorState::Healthy;
        self.ticks_since_probe = 0;
        Ok(spawned.output)
    }

    pub fn state(&self) -> SupervisorState {
        self.state
    }

    pub fn failures(&self) -> u64 {
        self.failures
    }

    pub fn consecutive_failures(&self) -> u64 {
        self.consecutive_failures
    }

    pub fn restarts(&self) -> u64 {
        self.restarts
    }

    pub fn last_failure(&self) -> Option<Instant> {
        self.last_failure
    }

    pub fn pid(&self) -> Option<u32> {
        self.handle.as_ref().map(|handle| handle.pid())
    }

    pub fn tick(&mut self) -> SupervisorEvent {
        if self.state == SupervisorState::Restarting {
            return self.poll_restart();
        }
        self.ticks_since_probe += 1;
        if self.ticks_since_probe < self.config.probe_interval_ticks {
            return SupervisorEvent::Idle;
        }
        self.ticks_since_probe = 0;

        if self.state == SupervisorState::Dead {
            self.begin_restart();
            return SupervisorEvent::Idle;
        }
        let status = match self.handle.as_mut() {
            Some(handle) => handle.probe(),
            None => AgentStatus::Exited(None),
        };
        match status {
            AgentStatus::Running => {
                self.consecutive_failures = 0;
                SupervisorEvent::Idle
            }
            AgentStatus::Exited(exit_code) => {
                tracing::warn!(
                    exit_code = exit_code.unwrap_or(-1),
                    failures = self.failures + 1,
                    "agent expected to be running"
                );
                log_debug(&format!("agent exited (code {exit_code:?}); restarting"));
                self.failures += 1;
                self.consecutive_failures += 1;
                self.last_failure = Some(Instant::now());
                self.state = SupervisorState::Dead;
                self.begin_restart();
                SupervisorEvent::Died { exit_code }
            }
        }
    }

    fn begin_restart(&mut self) {
        let (tx, rx) = crossbeam_channel::bounded(1);
        let launcher = Arc::clone(&self.launcher);
        thread::spawn(move || {
            let _ = tx.send(launcher.launch());
        });
        self.restart_rx = Some(rx);
        self.state = SupervisorState::Restarting;
    }

    fn poll_restart(&mut self) -> SupervisorEvent {
        let result = match self.restart_rx.as_ref().map(|rx| rx.try_recv()) {
            Some(Ok(result)) => result,
            Some(Err(TryRecvError::Empty)) => return SupervisorEvent::Idle,
            Some(Err(TryRecvError::Disconnected)) | None => {
                Err(anyhow::anyhow!("agent restart thread ended without a result"))
            }
        };
        self.restart_rx = None;
        match result {
            Ok(spawned) => self.promote(spawned),
            Err(err) => {
                tracing::error!(error = %err, "agent restart failed");
                log_debug(&format!("agent restart failed: {err:#}"));
                self.state = SupervisorState::Dead;
                self.ticks_since_probe = 0;
                SupervisorEvent::RestartFailed
            }
        }
    }

    fn promote(&mut self, spawned: SpawnedAgent) -> SupervisorEvent {
        // The stale handle is fully reaped before the replacement takes over.
        if let Some(mut stale) = self.handle.take() {
            stale.terminate();
        }
        log_debug(&format!("agent restarted (pid {})", spawned.handle.pid()));
        self.handle = Some(spawned.handle);
        self.restarts += 1;
        self.ticks_since_probe = 0;
        self.state = SupervisorState::Healthy;
        SupervisorEvent::Promoted {
            output: spawned.output,
        }
    }

    pub fn send(&mut self, command: &AgentCommand) -> Result<(), AgentSendError> {
        if self.state != SupervisorState::Healthy {
            return Err(AgentSendError::Unavailable(self.state));
        }
        match self.handle.as_mut() {
            Some(handle) => handle.send(command).map_err(AgentSendError::Io),
            None => Err(AgentSendError::Unavailable(self.state)),
        }
    }

    /// Terminate the agent, including one that is still being launched.
    pub fn shutdown(&mut self) {
        if let Some(rx) = self.restart_rx.take() {
            if let Ok(Ok(mut spawned)) = rx.recv_timeout(SHUTDOWN_RESTART_WAIT) {
                spawned.handle.terminate();
            }
        }
        if let Some(mut handle) = self.handle.take() {
            handle.terminate();
        }
        self.state = SupervisorState::Dead;
    }
}

impl Drop for AgentSupervisor {
    fn drop(&mut self) {
        self.shutdown();
    }
}
