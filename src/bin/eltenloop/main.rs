//! Elten client loop entrypoint: agent supervision, keyboard sampling and the scene loop.
//!
//! # Architecture
//!
//! - Key thread: reads terminal key events for the sampler
//! - Agent reader: forwards agent stdout lines to the frame channel
//! - Restart thread: launches a replacement agent when the supervisor asks
//! - Main thread: ticks the loop controller

mod presenter;
mod scenes;

use anyhow::Result;
use eltenloop::agent::{AgentSupervisor, ProcessLauncher};
use eltenloop::config::AppConfig;
use eltenloop::input::{KeySampler, TerminalKeySource};
use eltenloop::runtime::{install_hangup_handler, Collaborators, LoopControl, LoopController, LoopCore};
use eltenloop::terminal_restore::TerminalRestoreGuard;
use eltenloop::{init_logging, init_tracing, log_debug, log_file_path};
use std::io;
use std::sync::Arc;

use presenter::{ConsolePresenter, LoggedNotifications, OfflineServer};
use scenes::ClientScenes;

fn main() -> Result<()> {
    let config = AppConfig::parse_args()?;
    init_logging(&config);
    init_tracing(&config);
    log_debug("=== Elten loop started ===");
    log_debug(&format!("Log file: {:?}", log_file_path()));

    let terminal = TerminalRestoreGuard::new();
    terminal.enable_raw_mode()?;
    let releases = terminal.enable_key_releases(&mut io::stdout())?;
    log_debug(&format!("key release events: {releases}"));
    install_hangup_handler();

    let launcher = Arc::new(ProcessLauncher::new(config.agent_launch_spec()));
    let supervisor = AgentSupervisor::new(launcher, config.supervisor_config());
    let sampler = KeySampler::new(Box::new(TerminalKeySource::spawn()));
    let collab = Collaborators {
        presenter: Box::new(ConsolePresenter::new(config.sounds)),
        server: Box::new(OfflineServer),
        notifications: Box::new(LoggedNotifications),
        shutdown_hooks: Vec::new(),
    };

    let mut core = LoopCore::new(
        config.loop_settings(),
        sampler,
        supervisor,
        collab,
        LoopControl::new(),
    );
    if !core.start_agent() {
        core.speak("Elten agent could not be started. Retrying in the background.");
    }

    let scenes = ClientScenes::new(config.silent_start);
    let mut controller = LoopController::new(core, Box::new(scenes));
    let result = controller.run();
    terminal.restore();
    log_debug("=== Elten loop exited ===");
    result
}
