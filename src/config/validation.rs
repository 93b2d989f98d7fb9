use super::defaults::{
    MAX_AGENT_ARGS, MAX_AGENT_ARG_BYTES, MAX_AGENT_CHANNEL_CAPACITY, MAX_AGENT_TERMINATE_GRACE_MS,
    MAX_FRAME_BUFFER_BYTES, MAX_FRAME_RATE, MAX_PROBE_INTERVAL_TICKS, MAX_REQUEST_TIMEOUT_MS,
    MIN_AGENT_CHANNEL_CAPACITY, MIN_FRAME_BUFFER_BYTES, MIN_REQUEST_TIMEOUT_MS,
};
use super::AppConfig;
use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use std::{fs, path::Path};

impl AppConfig {
    /// Parse CLI arguments and validate them right away.
    pub fn parse_args() -> Result<Self> {
        let mut config = Self::parse();
        config.validate()?;
        Ok(config)
    }

    /// Check CLI values and normalize the agent command.
    pub fn validate(&mut self) -> Result<()> {
        if !(1..=MAX_FRAME_RATE).contains(&self.frame_rate) {
            bail!(
                "--frame-rate must be between 1 and {MAX_FRAME_RATE}, got {}",
                self.frame_rate
            );
        }
        if !(MIN_REQUEST_TIMEOUT_MS..=MAX_REQUEST_TIMEOUT_MS).contains(&self.request_timeout_ms) {
            bail!(
                "--request-timeout-ms must be between {MIN_REQUEST_TIMEOUT_MS} and {MAX_REQUEST_TIMEOUT_MS}, got {}",
                self.request_timeout_ms
            );
        }
        if !(1..=MAX_PROBE_INTERVAL_TICKS).contains(&self.probe_interval_ticks) {
            bail!(
                "--probe-interval-ticks must be between 1 and {MAX_PROBE_INTERVAL_TICKS}, got {}",
                self.probe_interval_ticks
            );
        }
        if self.agent_terminate_grace_ms > MAX_AGENT_TERMINATE_GRACE_MS {
            bail!(
                "--agent-terminate-grace-ms must be at most {MAX_AGENT_TERMINATE_GRACE_MS}, got {}",
                self.agent_terminate_grace_ms
            );
        }
        if !(MIN_AGENT_CHANNEL_CAPACITY..=MAX_AGENT_CHANNEL_CAPACITY)
            .contains(&self.agent_channel_capacity)
        {
            bail!(
                "--agent-channel-capacity must be between {MIN_AGENT_CHANNEL_CAPACITY} and {MAX_AGENT_CHANNEL_CAPACITY}, got {}",
                self.agent_channel_capacity
            );
        }
        if !(MIN_FRAME_BUFFER_BYTES..=MAX_FRAME_BUFFER_BYTES).contains(&self.max_frame_buffer_bytes)
        {
            bail!(
                "--max-frame-buffer-bytes must be between {MIN_FRAME_BUFFER_BYTES} and {MAX_FRAME_BUFFER_BYTES}, got {}",
                self.max_frame_buffer_bytes
            );
        }

        // Keep the agent argv small.
        if self.agent_args.len() > MAX_AGENT_ARGS {
            bail!(
                "--agent-arg repeated too many times (max {MAX_AGENT_ARGS}, got {})",
                self.agent_args.len()
            );
        }
        let total_arg_bytes: usize = self.agent_args.iter().map(|arg| arg.len()).sum();
        if total_arg_bytes > MAX_AGENT_ARG_BYTES {
            bail!("combined --agent-arg length exceeds {MAX_AGENT_ARG_BYTES} bytes");
        }
        if self
            .agent_args
            .iter()
            .any(|arg| arg.chars().any(|ch| ch == '\0'))
        {
            bail!("--agent-arg must not contain NUL bytes");
        }

        self.agent_cmd = sanitize_agent_cmd(&self.agent_cmd, "--agent-cmd")?;
        Ok(())
    }
}

/// Allow either a bare command name (resolved through PATH at spawn time) or an
/// existing executable path.
pub(super) fn sanitize_agent_cmd(value: &str, flag: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        bail!("{flag} cannot be empty");
    }
    if trimmed.chars().any(|ch| ch.is_control()) {
        bail!("{flag} must not contain control characters");
    }

    let path = Path::new(trimmed);
    if !path.is_absolute() && !trimmed.contains(std::path::MAIN_SEPARATOR) {
        if trimmed
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.'))
        {
            return Ok(trimmed.to_string());
        }
        bail!("{flag} '{trimmed}' is not a plain command name");
    }

    let canonical = path
        .canonicalize()
        .with_context(|| format!("failed to canonicalize {flag} '{trimmed}'"))?;
    let metadata = fs::metadata(&canonical)
        .with_context(|| format!("failed to inspect {flag} '{}'", canonical.display()))?;
    if !metadata.is_file() {
        bail!("{flag} '{}' is not a file", canonical.display());
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = metadata.permissions().mode();
        if mode & 0o111 == 0 {
            bail!(
                "{flag} '{}' exists but is not executable (mode {:o})",
                canonical.display(),
                mode
            );
        }
    }
    canonical
        .to_str()
        .map(|s| s.to_string())
        .ok_or_else(|| anyhow!("{flag} must be valid UTF-8"))
}
