use super::validation::sanitize_agent_cmd;
use super::*;
use clap::Parser;
use std::path::Path;

#[test]
fn defaults_validate() {
    let mut cfg = AppConfig::parse_from(["test-app"]);
    assert!(cfg.validate().is_ok());
    assert_eq!(cfg.agent_cmd, DEFAULT_AGENT_CMD);
    assert_eq!(cfg.probe_interval_ticks, 200);
}

#[test]
fn tick_interval_follows_frame_rate() {
    let cfg = AppConfig::parse_from(["test-app", "--frame-rate", "50"]);
    assert_eq!(cfg.tick_interval(), Duration::from_millis(20));
    let cfg = AppConfig::parse_from(["test-app"]);
    assert_eq!(cfg.tick_interval(), Duration::from_secs(1) / 60);
}

#[test]
fn rejects_frame_rate_out_of_bounds() {
    let mut cfg = AppConfig::parse_from(["test-app", "--frame-rate", "0"]);
    assert!(cfg.validate().is_err());
    let mut cfg = AppConfig::parse_from(["test-app", "--frame-rate", "241"]);
    assert!(cfg.validate().is_err());
}

#[test]
fn rejects_request_timeout_out_of_bounds() {
    let mut cfg = AppConfig::parse_from(["test-app", "--request-timeout-ms", "99"]);
    assert!(cfg.validate().is_err());
    let mut cfg = AppConfig::parse_from(["test-app", "--request-timeout-ms", "600001"]);
    assert!(cfg.validate().is_err());
    let mut cfg = AppConfig::parse_from(["test-app", "--request-timeout-ms", "100"]);
    assert!(cfg.validate().is_ok());
}

#[test]
fn rejects_zero_probe_interval() {
    let mut cfg = AppConfig::parse_from(["test-app", "--probe-interval-ticks", "0"]);
    assert!(cfg.validate().is_err());
}

#[test]
fn rejects_channel_capacity_out_of_bounds() {
    let mut cfg = AppConfig::parse_from(["test-app", "--agent-channel-capacity", "4"]);
    assert!(cfg.validate().is_err());
    let mut cfg = AppConfig::parse_from(["test-app", "--agent-channel-capacity", "5000"]);
    assert!(cfg.validate().is_err());
}

#[test]
fn rejects_tiny_frame_buffer() {
    let mut cfg = AppConfig::parse_from(["test-app", "--max-frame-buffer-bytes", "1024"]);
    assert!(cfg.validate().is_err());
}

#[test]
fn rejects_too_many_agent_args() {
    let mut args = vec!["test-app".to_string()];
    for i in 0..33 {
        args.push("--agent-arg".to_string());
        args.push(format!("a{i}"));
    }
    let mut cfg = AppConfig::parse_from(args);
    assert!(cfg.validate().is_err());
}

#[test]
fn rejects_oversized_agent_args() {
    let big = "x".repeat(5000);
    let mut cfg = AppConfig::parse_from(["test-app", "--agent-arg", big.as_str()]);
    assert!(cfg.validate().is_err());
}

#[test]
fn sanitize_accepts_plain_names_and_rejects_shell_text() {
    assert_eq!(
        sanitize_agent_cmd("  elten-agent ", "--agent-cmd").unwrap(),
        "elten-agent"
    );
    assert!(sanitize_agent_cmd("", "--agent-cmd").is_err());
    assert!(sanitize_agent_cmd("agent;rm", "--agent-cmd").is_err());
    assert!(sanitize_agent_cmd("agent\n", "--agent-cmd").is_ok());
    assert!(sanitize_agent_cmd("age\tnt", "--agent-cmd").is_err());
}

#[cfg(unix)]
#[test]
fn sanitize_resolves_existing_executable_paths() {
    let resolved = sanitize_agent_cmd("/bin/sh", "--agent-cmd").unwrap();
    assert!(Path::new(&resolved).is_absolute());
    assert!(sanitize_agent_cmd("/definitely/missing/agent", "--agent-cmd").is_err());
}

#[test]
fn snapshots_carry_validated_values() {
    let cfg = AppConfig::try_parse_from([
        "test-app",
        "--agent-arg",
        "--portable",
        "--agent-arg",
        "-v",
        "--probe-interval-ticks",
        "7",
        "--agent-terminate-grace-ms",
        "250",
    ])
    .expect("dash-prefixed agent args parse");
    let spec = cfg.agent_launch_spec();
    assert_eq!(spec.args, vec!["--portable".to_string(), "-v".to_string()]);
    assert_eq!(spec.terminate_grace, Duration::from_millis(250));
    assert_eq!(cfg.supervisor_config().probe_interval_ticks, 7);
    let settings = cfg.loop_settings();
    assert_eq!(settings.request_timeout, Duration::from_millis(15_000));
    assert!(!settings.debug);
}
