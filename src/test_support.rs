//! Scripted keyboards, recording collaborators and an in-memory agent for unit tests.

use crate::agent::{
    AgentCommand, AgentHandle, AgentLauncher, AgentStatus, AgentSupervisor, SpawnedAgent,
    SupervisorConfig,
};
use crate::input::{KeyCode, KeySampler, KeySource, RawKeySnapshot};
use crate::runtime::{
    Collaborators, Cue, LoopControl, LoopCore, LoopSettings, NotificationSink, Presenter,
    ServerLink, ShutdownHook,
};
use anyhow::Result;
use crossbeam_channel::Sender;
use serde_json::{json, Map, Value};
use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ============================================================================
// Keyboard
// ============================================================================

/// Key source fed from a shared queue; an empty queue reports no keys.
#[derive(Clone, Default)]
pub(crate) struct ScriptedKeys {
    frames: Arc<Mutex<VecDeque<RawKeySnapshot>>>,
}

impl ScriptedKeys {
    pub(crate) fn push_idle(&self) {
        self.frames.lock().unwrap().push_back(RawKeySnapshot::default());
    }

    pub(crate) fn push_strike(&self, code: KeyCode) {
        let mut snapshot = RawKeySnapshot::default();
        snapshot.strike(code);
        self.frames.lock().unwrap().push_back(snapshot);
    }

    pub(crate) fn push_held(&self, code: KeyCode) {
        let mut snapshot = RawKeySnapshot::default();
        snapshot.hold(code);
        self.frames.lock().unwrap().push_back(snapshot);
    }

    /// Strike each key with an idle sample after it so repeats register.
    pub(crate) fn push_presses(&self, codes: &[KeyCode]) {
        for code in codes {
            self.push_strike(*code);
            self.push_idle();
        }
    }
}

impl KeySource for ScriptedKeys {
    fn snapshot(&mut self) -> RawKeySnapshot {
        self.frames.lock().unwrap().pop_front().unwrap_or_default()
    }
}

// ============================================================================
// Collaborators
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Presented {
    Spoke(String),
    Played(Cue),
    Copied(String),
}

#[derive(Clone, Default)]
pub(crate) struct RecordingPresenter {
    pub(crate) events: Arc<Mutex<Vec<Presented>>>,
}

impl RecordingPresenter {
    pub(crate) fn events(&self) -> Vec<Presented> {
        self.events.lock().unwrap().clone()
    }

    pub(crate) fn spoke(&self, needle: &str) -> bool {
        self.events()
            .iter()
            .any(|event| matches!(event, Presented::Spoke(text) if text.contains(needle)))
    }

    pub(crate) fn played(&self, cue: Cue) -> bool {
        self.events().contains(&Presented::Played(cue))
    }
}

impl Presenter for RecordingPresenter {
    fn speak(&mut self, text: &str) {
        self.events.lock().unwrap().push(Presented::Spoke(text.to_string()));
    }

    fn play(&mut self, cue: Cue) {
        self.events.lock().unwrap().push(Presented::Played(cue));
    }

    fn copy_to_clipboard(&mut self, text: &str) -> Result<()> {
        self.events.lock().unwrap().push(Presented::Copied(text.to_string()));
        Ok(())
    }
}

#[derive(Clone, Default)]
pub(crate) struct RecordingServer {
    pub(crate) requests: Arc<Mutex<Vec<(String, Value)>>>,
}

impl ServerLink for RecordingServer {
    fn request(&mut self, name: &str, params: &Value) -> Result<Vec<String>> {
        self.requests
            .lock()
            .unwrap()
            .push((name.to_string(), params.clone()));
        Ok(vec!["0".to_string()])
    }
}

#[derive(Clone, Default)]
pub(crate) struct RecordingNotifications {
    pub(crate) received: Arc<Mutex<Vec<Map<String, Value>>>>,
}

impl NotificationSink for RecordingNotifications {
    fn process(&mut self, body: &Map<String, Value>) {
        self.received.lock().unwrap().push(body.clone());
    }
}

pub(crate) struct CountingHook {
    pub(crate) runs: Arc<AtomicUsize>,
}

impl ShutdownHook for CountingHook {
    fn name(&self) -> &str {
        "counting"
    }

    fn run(&mut self) -> Result<()> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ============================================================================
// In-memory agent
// ============================================================================

/// Agent that lives in memory. Requests are answered with `{"ok": true}`
/// when `auto_respond` is set; `kill` makes the next probe report an exit.
pub(crate) struct LoopbackAgent {
    pid: u32,
    output: Sender<Vec<u8>>,
    auto_respond: bool,
    alive: Arc<AtomicBool>,
    pub(crate) sent: Arc<Mutex<Vec<AgentCommand>>>,
}

impl AgentHandle for LoopbackAgent {
    fn pid(&self) -> u32 {
        self.pid
    }

    fn send(&mut self, command: &AgentCommand) -> io::Result<()> {
        self.sent.lock().unwrap().push(command.clone());
        if let AgentCommand::Request { id, .. } = command {
            if self.auto_respond {
                let frame = json!({"kind": "response", "id": id, "ok": true});
                let _ = self.output.send(serde_json::to_vec(&frame).unwrap());
            }
        }
        Ok(())
    }

    fn probe(&mut self) -> AgentStatus {
        if self.alive.load(Ordering::SeqCst) {
            AgentStatus::Running
        } else {
            AgentStatus::Exited(Some(1))
        }
    }

    fn terminate(&mut self) {
        self.alive.store(false, Ordering::SeqCst);
    }
}

/// Launches `LoopbackAgent`s and keeps handles to the latest one.
#[derive(Clone)]
pub(crate) struct LoopbackLauncher {
    pub(crate) auto_respond: bool,
    pub(crate) launches: Arc<AtomicU32>,
    pub(crate) alive: Arc<Mutex<Arc<AtomicBool>>>,
    pub(crate) output: Arc<Mutex<Option<Sender<Vec<u8>>>>>,
    pub(crate) sent: Arc<Mutex<Vec<AgentCommand>>>,
    pub(crate) fail: Arc<AtomicBool>,
}

impl LoopbackLauncher {
    pub(crate) fn new(auto_respond: bool) -> Self {
        Self {
            auto_respond,
            launches: Arc::new(AtomicU32::new(0)),
            alive: Arc::new(Mutex::new(Arc::new(AtomicBool::new(false)))),
            output: Arc::new(Mutex::new(None)),
            sent: Arc::new(Mutex::new(Vec::new())),
            fail: Arc::new(AtomicBool::new(false)),
        }
    }

    pub(crate) fn kill_current(&self) {
        self.alive.lock().unwrap().store(false, Ordering::SeqCst);
    }

    /// Write raw bytes as if the current agent printed them.
    pub(crate) fn emit(&self, bytes: &[u8]) {
        if let Some(tx) = self.output.lock().unwrap().as_ref() {
            tx.send(bytes.to_vec()).unwrap();
        }
    }

    pub(crate) fn emit_json(&self, value: Value) {
        self.emit(&serde_json::to_vec(&value).unwrap());
    }

    pub(crate) fn launch_count(&self) -> u32 {
        self.launches.load(Ordering::SeqCst)
    }
}

impl AgentLauncher for LoopbackLauncher {
    fn launch(&self) -> Result<SpawnedAgent> {
        if self.fail.load(Ordering::SeqCst) {
            anyhow::bail!("launch refused");
        }
        let pid = self.launches.fetch_add(1, Ordering::SeqCst) + 1000;
        let (tx, rx) = crossbeam_channel::unbounded();
        let alive = Arc::new(AtomicBool::new(true));
        *self.alive.lock().unwrap() = Arc::clone(&alive);
        *self.output.lock().unwrap() = Some(tx.clone());
        Ok(SpawnedAgent {
            handle: Box::new(LoopbackAgent {
                pid,
                output: tx,
                auto_respond: self.auto_respond,
                alive,
                sent: Arc::clone(&self.sent),
            }),
            output: rx,
        })
    }
}

// ============================================================================
// Assembled loop
// ============================================================================

pub(crate) struct Harness {
    pub(crate) keys: ScriptedKeys,
    pub(crate) presenter: RecordingPresenter,
    pub(crate) server: RecordingServer,
    pub(crate) notifications: RecordingNotifications,
    pub(crate) hook_runs: Arc<AtomicUsize>,
    pub(crate) agent: LoopbackLauncher,
    pub(crate) control: LoopControl,
}

pub(crate) fn test_settings() -> LoopSettings {
    LoopSettings {
        tick_interval: Duration::from_millis(1),
        request_timeout: Duration::from_millis(500),
        max_frame_buffer_bytes: 64 * 1024,
        debug: false,
    }
}

impl Harness {
    pub(crate) fn new(auto_respond: bool) -> Self {
        Self {
            keys: ScriptedKeys::default(),
            presenter: RecordingPresenter::default(),
            server: RecordingServer::default(),
            notifications: RecordingNotifications::default(),
            hook_runs: Arc::new(AtomicUsize::new(0)),
            agent: LoopbackLauncher::new(auto_respond),
            control: LoopControl::new(),
        }
    }

    pub(crate) fn collaborators(&self) -> Collaborators {
        Collaborators {
            presenter: Box::new(self.presenter.clone()),
            server: Box::new(self.server.clone()),
            notifications: Box::new(self.notifications.clone()),
            shutdown_hooks: vec![Box::new(CountingHook {
                runs: Arc::clone(&self.hook_runs),
            })],
        }
    }

    pub(crate) fn core_with(&self, settings: LoopSettings, probe_interval_ticks: u64) -> LoopCore {
        let supervisor = AgentSupervisor::new(
            Arc::new(self.agent.clone()),
            SupervisorConfig {
                probe_interval_ticks,
            },
        );
        let mut core = LoopCore::new(
            settings,
            KeySampler::new(Box::new(self.keys.clone())),
            supervisor,
            self.collaborators(),
            self.control.clone(),
        );
        assert!(core.start_agent());
        core
    }

    pub(crate) fn core(&self) -> LoopCore {
        self.core_with(test_settings(), 200)
    }
}
