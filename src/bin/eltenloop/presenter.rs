use anyhow::{anyhow, Context, Result};
use eltenloop::log_debug;
use eltenloop::runtime::{Cue, NotificationSink, Presenter, ServerLink};
use serde_json::{Map, Value};
use std::env;
use std::fs;
use std::io::{self, Write};

/// Speaks by printing lines for the screen reader; cues ring the terminal bell.
pub(crate) struct ConsolePresenter {
    sounds: bool,
}

impl ConsolePresenter {
    pub(crate) fn new(sounds: bool) -> Self {
        Self { sounds }
    }
}

impl Presenter for ConsolePresenter {
    fn speak(&mut self, text: &str) {
        let mut stdout = io::stdout();
        // Raw mode: carriage return before each line.
        let _ = write!(stdout, "\r\n{text}");
        let _ = stdout.flush();
    }

    fn play(&mut self, cue: Cue) {
        log_debug(&format!("cue {}", cue.name()));
        if self.sounds && matches!(cue, Cue::Failure | Cue::Signal | Cue::Login | Cue::Logout) {
            let mut stdout = io::stdout();
            let _ = stdout.write_all(b"\x07");
            let _ = stdout.flush();
        }
    }

    fn copy_to_clipboard(&mut self, text: &str) -> Result<()> {
        let path = env::temp_dir().join("elten_error_report.txt");
        fs::write(&path, text)
            .with_context(|| format!("failed to write {}", path.display()))?;
        self.speak(&format!("Report saved to {}", path.display()));
        Ok(())
    }
}

/// Server link used when no server session is configured.
pub(crate) struct OfflineServer;

impl ServerLink for OfflineServer {
    fn request(&mut self, name: &str, _params: &Value) -> Result<Vec<String>> {
        log_debug(&format!("server request '{name}' skipped: offline"));
        Err(anyhow!("server is not reachable in offline mode"))
    }
}

pub(crate) struct LoggedNotifications;

impl NotificationSink for LoggedNotifications {
    fn process(&mut self, body: &Map<String, Value>) {
        let kind = body.get("cat").and_then(Value::as_str).unwrap_or("notification");
        tracing::info!(category = kind, "notification");
        log_debug(&format!("notification: {kind}"));
    }
}
