use super::protocol::AgentCommand;
use crate::log_debug;
use anyhow::{Context, Result};
use crossbeam_channel::{Receiver, Sender};
use std::io::{self, Read, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

const OUTPUT_READ_CHUNK: usize = 8192;

/// Liveness reported by a probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentStatus {
    Running,
    Exited(Option<i32>),
}

/// The authoritative agent process as seen by the supervisor.
pub trait AgentHandle: Send {
    fn pid(&self) -> u32;
    fn send(&mut self, command: &AgentCommand) -> io::Result<()>;
    /// Non-blocking exit check.
    fn probe(&mut self) -> AgentStatus;
    /// Stop the process and reap it. Must be idempotent.
    fn terminate(&mut self);
}

/// A freshly started agent plus the stream of its output chunks.
pub struct SpawnedAgent {
    pub handle: Box<dyn AgentHandle>,
    pub output: Receiver<Vec<u8>>,
}

/// Starts agent processes; called from the supervisor's restart thread.
pub trait AgentLauncher: Send + Sync {
    fn launch(&self) -> Result<SpawnedAgent>;
}

#[derive(Debug, Clone)]
pub struct AgentLaunchSpec {
    pub command: String,
    pub args: Vec<String>,
    pub channel_capacity: usize,
    pub terminate_grace: Duration,
}

/// Launches the agent binary described by an `AgentLaunchSpec`.
pub struct ProcessLauncher {
    spec: AgentLaunchSpec,
}

impl ProcessLauncher {
    pub fn new(spec: AgentLaunchSpec) -> Self {
        Self { spec }
    }
}

impl AgentLauncher for ProcessLauncher {
    fn launch(&self) -> Result<SpawnedAgent> {
        let (process, output) = AgentProcess::spawn(&self.spec)?;
        Ok(SpawnedAgent {
            handle: Box::new(process),
            output,
        })
    }
}

/// Agent subprocess with piped stdin/stdout.
pub struct AgentProcess {
    child: Child,
    stdin: Option<ChildStdin>,
    grace: Duration,
    exited: Option<Option<i32>>,
}

impl AgentProcess {
    pub fn spawn(spec: &AgentLaunchSpec) -> Result<(Self, Receiver<Vec<u8>>)> {
        let mut child = Command::new(&spec.command)
            .args(&spec.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .with_context(|| format!("failed to spawn agent '{}'", spec.command))?;
        let stdin = child.stdin.take();
        let stdout = child
            .stdout
            .take()
            .context("agent stdout was not captured")?;
        let (tx, rx) = crossbeam_channel::bounded(spec.channel_capacity.max(1));
        spawn_output_reader(stdout, tx, child.id());
        log_debug(&format!("agent started (pid {})", child.id()));
        Ok((
            Self {
                child,
                stdin,
                grace: spec.terminate_grace,
                exited: None,
            },
            rx,
        ))
    }

    fn wait_for_exit(&mut self, timeout: Duration) -> bool {
        let start = Instant::now();
        loop {
            match self.child.try_wait() {
                Ok(Some(status)) => {
                    self.exited = Some(status.code());
                    return true;
                }
                Ok(None) => {}
                Err(err) => {
                    log_debug(&format!("agent try_wait failed: {err}"));
                    return false;
                }
            }
            if start.elapsed() >= timeout {
                return false;
            }
            thread::sleep(Duration::from_millis(10));
        }
    }
}

impl AgentHandle for AgentProcess {
    fn pid(&self) -> u32 {
        self.child.id()
    }

    fn send(&mut self, command: &AgentCommand) -> io::Result<()> {
        let line = command
            .encode()
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "agent stdin closed"))?;
        stdin.write_all(&line)?;
        stdin.flush()
    }

    fn probe(&mut self) -> AgentStatus {
        if let Some(code) = self.exited {
            return AgentStatus::Exited(code);
        }
        match self.child.try_wait() {
            Ok(Some(status)) => {
                self.exited = Some(status.code());
                AgentStatus::Exited(status.code())
            }
            Ok(None) => AgentStatus::Running,
            Err(err) => {
                log_debug(&format!("agent probe failed: {err}"));
                AgentStatus::Exited(None)
            }
        }
    }

    fn terminate(&mut self) {
        // Closing stdin lets a well-behaved agent exit on EOF.
        self.stdin.take();
        if self.exited.is_some() {
            return;
        }
        let pid = self.child.id() as libc::pid_t;
        // SAFETY: pid belongs to our unreaped child; kill only delivers a signal.
        if unsafe { libc::kill(pid, libc::SIGTERM) } != 0 {
            log_debug(&format!(
                "SIGTERM to agent failed: {}",
                io::Error::last_os_error()
            ));
        }
        if self.wait_for_exit(self.grace) {
            return;
        }
        if let Err(err) = self.child.kill() {
            log_debug(&format!("SIGKILL to agent failed: {err}"));
        }
        match self.child.wait() {
            Ok(status) => self.exited = Some(status.code()),
            Err(err) => {
                log_debug(&format!("wait after SIGKILL failed: {err}"));
                self.exited = Some(None);
            }
        }
    }
}

impl Drop for AgentProcess {
    fn drop(&mut self) {
        self.terminate();
    }
}

fn spawn_output_reader(mut stdout: ChildStdout, tx: Sender<Vec<u8>>, pid: u32) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let mut buf = [0u8; OUTPUT_READ_CHUNK];
        loop {
            match stdout.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    if tx.send(buf[..n].to_vec()).is_err() {
                        break;
                    }
                }
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => {
                    log_debug(&format!("agent {pid} output read error: {err}"));
                    break;
                }
            }
        }
        log_debug(&format!("agent {pid} output closed"));
    })
}

/// Send SIGTERM to helper processes recorded by scenes.
pub(crate) fn terminate_pids(pids: &[u32]) {
    for pid in pids {
        // SAFETY: best-effort signal to a recorded child pid.
        if unsafe { libc::kill(*pid as libc::pid_t, libc::SIGTERM) } != 0 {
            log_debug(&format!(
                "SIGTERM to child {pid} failed: {}",
                io::Error::last_os_error()
            ));
        }
    }
}
