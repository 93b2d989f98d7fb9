pub const DEFAULT_AGENT_CMD: &str = "elten-agent";
pub const DEFAULT_FRAME_RATE: u32 = 60;
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 15_000;
pub const DEFAULT_PROBE_INTERVAL_TICKS: u64 = 200;
pub const DEFAULT_AGENT_TERMINATE_GRACE_MS: u64 = 500;
pub const DEFAULT_AGENT_CHANNEL_CAPACITY: usize = 256;
pub const DEFAULT_MAX_FRAME_BUFFER_BYTES: usize = 4 * 1024 * 1024;

pub(super) const MAX_FRAME_RATE: u32 = 240;
pub(super) const MIN_REQUEST_TIMEOUT_MS: u64 = 100;
pub(super) const MAX_REQUEST_TIMEOUT_MS: u64 = 600_000;
pub(super) const MAX_PROBE_INTERVAL_TICKS: u64 = 100_000;
pub(super) const MAX_AGENT_TERMINATE_GRACE_MS: u64 = 10_000;
pub(super) const MIN_AGENT_CHANNEL_CAPACITY: usize = 8;
pub(super) const MAX_AGENT_CHANNEL_CAPACITY: usize = 4096;
pub(super) const MIN_FRAME_BUFFER_BYTES: usize = 4 * 1024;
pub(super) const MAX_FRAME_BUFFER_BYTES: usize = 64 * 1024 * 1024;
pub(super) const MAX_AGENT_ARGS: usize = 32;
pub(super) const MAX_AGENT_ARG_BYTES: usize = 4 * 1024;
