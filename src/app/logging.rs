use crate::config::AppConfig;
use std::{
    env, fs,
    io::Write,
    panic,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        Mutex, OnceLock,
    },
    thread,
    time::{SystemTime, UNIX_EPOCH},
};

const LOG_MAX_BYTES: u64 = 5 * 1024 * 1024;
const CRASH_LOG_MAX_BYTES: u64 = 256 * 1024;
static LOG_ENABLED: AtomicBool = AtomicBool::new(false);
static LOG_CONTENT_ENABLED: AtomicBool = AtomicBool::new(false);
static CRASH_LOG_ENABLED: AtomicBool = AtomicBool::new(false);
static LOG_STATE: OnceLock<Mutex<LogState>> = OnceLock::new();

/// Path to the temp loop log. The previous generation is kept next to it as `.1`.
pub fn log_file_path() -> PathBuf {
    env::temp_dir().join("elten_loop.log")
}

/// Path to the crash log file (metadata only).
pub fn crash_log_path() -> PathBuf {
    env::temp_dir().join("elten_loop_crash.log")
}

fn previous_generation(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".1");
    PathBuf::from(name)
}

/// Appends to the loop log and moves a full log aside instead of discarding it,
/// so the lines leading up to a soft reset survive the rotation.
struct LogWriter {
    path: PathBuf,
    file: fs::File,
    max_bytes: u64,
    bytes_written: u64,
}

impl LogWriter {
    fn new(path: PathBuf, max_bytes: u64) -> Option<Self> {
        let existing = fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
        if existing > max_bytes {
            let _ = fs::rename(&path, previous_generation(&path));
        }
        let file = open_append(&path)?;
        let bytes_written = fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
        Some(Self {
            path,
            file,
            max_bytes,
            bytes_written,
        })
    }

    fn rotate_if_needed(&mut self, next_len: usize) {
        if self.bytes_written.saturating_add(next_len as u64) <= self.max_bytes {
            return;
        }
        let _ = self.file.flush();
        if fs::rename(&self.path, previous_generation(&self.path)).is_err() {
            return;
        }
        if let Some(file) = open_append(&self.path) {
            self.file = file;
            self.bytes_written = 0;
        }
    }

    fn write_line(&mut self, line: &str) {
        self.rotate_if_needed(line.len());
        if self.file.write_all(line.as_bytes()).is_ok() {
            self.bytes_written = self.bytes_written.saturating_add(line.len() as u64);
        }
    }
}

fn open_append(path: &Path) -> Option<fs::File> {
    fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .ok()
}

#[derive(Default)]
struct LogState {
    writer: Option<LogWriter>,
}

fn log_state() -> &'static Mutex<LogState> {
    LOG_STATE.get_or_init(|| Mutex::new(LogState::default()))
}

fn unix_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

fn write_line(line: &str) {
    let mut state = log_state()
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    if let Some(writer) = state.writer.as_mut() {
        writer.write_line(line);
    }
}

/// Configure file logging from CLI flags or environment.
pub fn init_logging(config: &AppConfig) {
    let enabled = (config.logs || config.log_timings) && !config.no_logs;
    let content_enabled = enabled && config.log_content;
    LOG_ENABLED.store(enabled, Ordering::Relaxed);
    LOG_CONTENT_ENABLED.store(content_enabled, Ordering::Relaxed);
    CRASH_LOG_ENABLED.store(enabled, Ordering::Relaxed);

    let mut state = log_state()
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    state.writer = if enabled {
        LogWriter::new(log_file_path(), LOG_MAX_BYTES)
    } else {
        None
    };
}

/// Write debug messages to a temp file; the terminal belongs to the screen reader.
pub fn log_debug(msg: &str) {
    if !LOG_ENABLED.load(Ordering::Relaxed) {
        return;
    }
    write_line(&format!("[{}] {msg}\n", unix_seconds()));
}

/// Write logs that may contain user content (request parameters, agent text).
pub fn log_debug_content(msg: &str) {
    if !LOG_CONTENT_ENABLED.load(Ordering::Relaxed) {
        return;
    }
    log_debug(msg);
}

/// Mirror an agent log record into the loop log, stamped with both clocks.
/// Agent text is user content, so this follows the content gate.
pub fn log_agent(level: &str, text: &str, agent_time: Option<f64>) {
    if !LOG_CONTENT_ENABLED.load(Ordering::Relaxed) {
        return;
    }
    write_line(&agent_line(unix_seconds(), level, text, agent_time));
}

fn agent_line(now: u64, level: &str, text: &str, agent_time: Option<f64>) -> String {
    match agent_time {
        Some(time) => format!("[{now}] agent {level} @{time:.3}: {text}\n"),
        None => format!("[{now}] agent {level}: {text}\n"),
    }
}

/// Write a minimal crash log entry, omitting the payload unless content logging is on.
pub fn log_panic(info: &panic::PanicHookInfo<'_>) {
    if !CRASH_LOG_ENABLED.load(Ordering::Relaxed) {
        return;
    }

    let location = info
        .location()
        .map(|loc| format!("{}:{}", loc.file(), loc.line()))
        .unwrap_or_else(|| "unknown".to_string());
    let payload = if LOG_CONTENT_ENABLED.load(Ordering::Relaxed) {
        panic_payload_text(info.payload())
    } else {
        "panic payload omitted (log-content disabled)".to_string()
    };
    let current = thread::current();
    let line = format!(
        "[{}] panic on {} at {location}: {payload} (v{})\n",
        unix_seconds(),
        current.name().unwrap_or("unnamed"),
        env!("CARGO_PKG_VERSION")
    );

    // Crash entries are rare; a full crash log simply starts over.
    let path = crash_log_path();
    let existing = fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
    if existing.saturating_add(line.len() as u64) > CRASH_LOG_MAX_BYTES {
        let _ = fs::remove_file(&path);
    }
    if let Some(mut file) = open_append(&path) {
        let _ = file.write_all(line.as_bytes());
    }
}

/// Best-effort text of a panic payload (`&str` or `String`).
pub(crate) fn panic_payload_text(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        (*text).to_string()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_log(tag: &str) -> PathBuf {
        let path = env::temp_dir().join(format!(
            "elten_loop_test_{tag}_{}.log",
            std::process::id()
        ));
        let _ = fs::remove_file(&path);
        let _ = fs::remove_file(previous_generation(&path));
        path
    }

    #[test]
    fn panic_payload_text_reads_str_and_string() {
        let boxed: Box<dyn std::any::Any + Send> = Box::new("boom");
        assert_eq!(panic_payload_text(boxed.as_ref()), "boom");
        let boxed: Box<dyn std::any::Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_payload_text(boxed.as_ref()), "owned");
        let boxed: Box<dyn std::any::Any + Send> = Box::new(7u8);
        assert_eq!(panic_payload_text(boxed.as_ref()), "non-string panic payload");
    }

    #[test]
    fn log_paths_live_in_temp_dir() {
        assert!(log_file_path().starts_with(env::temp_dir()));
        assert!(crash_log_path().ends_with("elten_loop_crash.log"));
        assert!(previous_generation(&log_file_path()).ends_with("elten_loop.log.1"));
    }

    #[test]
    fn full_log_moves_to_previous_generation() {
        let path = scratch_log("rotate");
        let mut writer = LogWriter::new(path.clone(), 16).expect("open log");
        writer.write_line("first line\n");
        writer.write_line("second line\n");

        let previous = fs::read_to_string(previous_generation(&path)).expect("rotated log");
        assert_eq!(previous, "first line\n");
        assert_eq!(fs::read_to_string(&path).expect("current log"), "second line\n");

        let _ = fs::remove_file(&path);
        let _ = fs::remove_file(previous_generation(&path));
    }

    #[test]
    fn oversized_log_is_set_aside_on_open() {
        let path = scratch_log("open");
        fs::write(&path, "x".repeat(64)).expect("seed log");
        let writer = LogWriter::new(path.clone(), 32).expect("open log");
        assert_eq!(writer.bytes_written, 0);
        assert_eq!(
            fs::metadata(previous_generation(&path)).map(|m| m.len()).unwrap_or(0),
            64
        );

        let _ = fs::remove_file(&path);
        let _ = fs::remove_file(previous_generation(&path));
    }

    #[test]
    fn agent_lines_carry_both_timestamps() {
        assert_eq!(
            agent_line(10, "warning", "slow", Some(12.5)),
            "[10] agent warning @12.500: slow\n"
        );
        assert_eq!(agent_line(10, "info", "up", None), "[10] agent info: up\n");
    }
}
