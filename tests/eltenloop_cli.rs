use std::process::Command;

fn combined_output(output: &std::process::Output) -> String {
    let mut combined = String::new();
    combined.push_str(&String::from_utf8_lossy(&output.stdout));
    combined.push_str(&String::from_utf8_lossy(&output.stderr));
    combined
}

fn eltenloop_bin() -> &'static str {
    option_env!("CARGO_BIN_EXE_eltenloop").expect("eltenloop test binary not built")
}

#[test]
fn help_lists_loop_options() {
    let output = Command::new(eltenloop_bin())
        .arg("--help")
        .output()
        .expect("run eltenloop --help");
    assert!(output.status.success());
    let combined = combined_output(&output);
    assert!(combined.contains("Elten client loop"));
    assert!(combined.contains("--agent-cmd"));
    assert!(combined.contains("--probe-interval-ticks"));
}

#[test]
fn version_prints_package_version() {
    let output = Command::new(eltenloop_bin())
        .arg("--version")
        .output()
        .expect("run eltenloop --version");
    assert!(output.status.success());
    assert!(combined_output(&output).contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn invalid_frame_rate_is_rejected_before_startup() {
    let output = Command::new(eltenloop_bin())
        .args(["--frame-rate", "0"])
        .output()
        .expect("run eltenloop --frame-rate 0");
    assert!(!output.status.success());
    assert!(combined_output(&output).contains("--frame-rate"));
}

#[test]
fn shell_text_is_rejected_as_agent_command() {
    let output = Command::new(eltenloop_bin())
        .args(["--agent-cmd", "agent;reboot"])
        .env_remove("ELTEN_AGENT_CMD")
        .output()
        .expect("run eltenloop --agent-cmd");
    assert!(!output.status.success());
    assert!(combined_output(&output).contains("--agent-cmd"));
}
