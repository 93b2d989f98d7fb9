//! Command-line parsing and validation helpers.

mod defaults;
#[cfg(test)]
mod tests;
mod validation;

use clap::{ArgAction, Parser};
use std::time::Duration;

pub use defaults::{
    DEFAULT_AGENT_CHANNEL_CAPACITY, DEFAULT_AGENT_CMD, DEFAULT_AGENT_TERMINATE_GRACE_MS,
    DEFAULT_FRAME_RATE, DEFAULT_MAX_FRAME_BUFFER_BYTES, DEFAULT_PROBE_INTERVAL_TICKS,
    DEFAULT_REQUEST_TIMEOUT_MS,
};

use crate::agent::{AgentLaunchSpec, SupervisorConfig};
use crate::runtime::LoopSettings;

/// CLI options for the Elten client loop. Validated values keep the agent subprocess safe.
#[derive(Debug, Parser, Clone)]
#[command(about = "Elten client loop", author, version)]
pub struct AppConfig {
    /// Agent binary (bare command name or absolute path)
    #[arg(long = "agent-cmd", env = "ELTEN_AGENT_CMD", default_value = DEFAULT_AGENT_CMD)]
    pub agent_cmd: String,

    /// Extra arguments passed to the agent (repeatable)
    #[arg(
        long = "agent-arg",
        action = ArgAction::Append,
        value_name = "ARG",
        allow_hyphen_values = true
    )]
    pub agent_args: Vec<String>,

    /// Loop ticks per second
    #[arg(long = "frame-rate", default_value_t = DEFAULT_FRAME_RATE)]
    pub frame_rate: u32,

    /// How long an agent request may stay unanswered (milliseconds)
    #[arg(long = "request-timeout-ms", default_value_t = DEFAULT_REQUEST_TIMEOUT_MS)]
    pub request_timeout_ms: u64,

    /// Agent liveness is probed once every this many ticks
    #[arg(long = "probe-interval-ticks", default_value_t = DEFAULT_PROBE_INTERVAL_TICKS)]
    pub probe_interval_ticks: u64,

    /// Grace period between SIGTERM and SIGKILL when stopping the agent (milliseconds)
    #[arg(
        long = "agent-terminate-grace-ms",
        default_value_t = DEFAULT_AGENT_TERMINATE_GRACE_MS
    )]
    pub agent_terminate_grace_ms: u64,

    /// Max buffered output chunks from the agent before its reader blocks
    #[arg(
        long = "agent-channel-capacity",
        default_value_t = DEFAULT_AGENT_CHANNEL_CAPACITY
    )]
    pub agent_channel_capacity: usize,

    /// Max bytes decoded from the agent channel in one tick
    #[arg(
        long = "max-frame-buffer-bytes",
        default_value_t = DEFAULT_MAX_FRAME_BUFFER_BYTES
    )]
    pub max_frame_buffer_bytes: usize,

    /// Debug behavior: aborting from the rescue menu re-raises the fault
    #[arg(long = "debug", env = "ELTEN_DEBUG", default_value_t = false)]
    pub debug: bool,

    /// Audible cues through the terminal bell
    #[arg(long = "sounds", default_value_t = false)]
    pub sounds: bool,

    /// Skip the startup announcement
    #[arg(long = "silent-start", default_value_t = false)]
    pub silent_start: bool,

    /// Enable file logging (debug)
    #[arg(long = "logs", env = "ELTEN_LOGS", default_value_t = false)]
    pub logs: bool,

    /// Disable all file logging (overrides --logs and log env vars)
    #[arg(long = "no-logs", env = "ELTEN_NO_LOGS", default_value_t = false)]
    pub no_logs: bool,

    /// Allow logging request parameters and agent text (debug log only)
    #[arg(long = "log-content", env = "ELTEN_LOG_CONTENT", default_value_t = false)]
    pub log_content: bool,

    /// Enable verbose timing logs
    #[arg(long)]
    pub log_timings: bool,
}

impl AppConfig {
    /// Target duration of one loop tick.
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(1) / self.frame_rate.max(1)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Snapshot of how the agent subprocess is launched.
    pub fn agent_launch_spec(&self) -> AgentLaunchSpec {
        AgentLaunchSpec {
            command: self.agent_cmd.clone(),
            args: self.agent_args.clone(),
            channel_capacity: self.agent_channel_capacity,
            terminate_grace: Duration::from_millis(self.agent_terminate_grace_ms),
        }
    }

    pub fn supervisor_config(&self) -> SupervisorConfig {
        SupervisorConfig {
            probe_interval_ticks: self.probe_interval_ticks,
        }
    }

    pub fn loop_settings(&self) -> LoopSettings {
        LoopSettings {
            tick_interval: self.tick_interval(),
            request_timeout: self.request_timeout(),
            max_frame_buffer_bytes: self.max_frame_buffer_bytes,
            debug: self.debug,
        }
    }
}
