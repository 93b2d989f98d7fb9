//! Process-wide loop state, owned by the loop and passed by reference.

use crate::agent::RequestId;
use crate::input::KeyState;
use crate::lock_or_recover;
use serde_json::{Map, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Instant;

pub type NotificationCallback = Box<dyn FnMut(&Map<String, Value>) + Send>;

#[derive(Debug, Clone)]
pub struct PendingRequest {
    pub id: RequestId,
    pub name: String,
    pub sent_at: Instant,
}

/// Latest virtual-socket frames per connection id.
#[derive(Debug, Default)]
pub struct SocketTables {
    pub create: HashMap<String, Map<String, Value>>,
    pub write: HashMap<String, Map<String, Value>>,
    pub read: HashMap<String, Map<String, Value>>,
    pub close: HashMap<String, Map<String, Value>>,
}

impl SocketTables {
    pub fn clear(&mut self) {
        self.create.clear();
        self.write.clear();
        self.read.clear();
        self.close.clear();
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueuedSignal {
    pub sender: String,
    pub app_id: String,
    pub packet: Value,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentIncident {
    pub message: String,
    pub location: Option<String>,
}

/// One-shot and guard flags read by the loop.
#[derive(Debug, Default, Clone)]
pub struct LoopFlags {
    pub tray_restored: bool,
    pub alarm: bool,
    pub(crate) alarm_active: bool,
    pub(crate) incident_active: bool,
    pub(crate) hotkey_active: bool,
    pub debug: bool,
}

/// Session facts maintained by scenes.
#[derive(Debug, Default, Clone)]
pub struct SessionFlags {
    /// An update or download scene owns the loop; exit requests are deferred
    pub updating: bool,
    pub first_run: bool,
    pub authenticated: bool,
}

pub struct LoopContext {
    pub keys: KeyState,
    pub(crate) pending_requests: HashMap<RequestId, PendingRequest>,
    pub(crate) pending_responses: HashMap<RequestId, Map<String, Value>>,
    next_request_id: RequestId,
    pub sockets: SocketTables,
    pub flags: LoopFlags,
    pub session: SessionFlags,
    notification_callback: Option<NotificationCallback>,
    pub(crate) signals: VecDeque<QueuedSignal>,
    pub(crate) incidents: VecDeque<AgentIncident>,
    pub unread_messages: u64,
    /// Helper processes to stop at shutdown
    pub child_pids: Vec<u32>,
}

impl Default for LoopContext {
    fn default() -> Self {
        Self::new()
    }
}

impl LoopContext {
    pub fn new() -> Self {
        Self {
            keys: KeyState::new(),
            pending_requests: HashMap::new(),
            pending_responses: HashMap::new(),
            next_request_id: 1,
            sockets: SocketTables::default(),
            flags: LoopFlags::default(),
            session: SessionFlags::default(),
            notification_callback: None,
            signals: VecDeque::new(),
            incidents: VecDeque::new(),
            unread_messages: 0,
            child_pids: Vec::new(),
        }
    }

    pub(crate) fn allocate_request_id(&mut self) -> RequestId {
        loop {
            let id = self.next_request_id;
            self.next_request_id = self.next_request_id.wrapping_add(1).max(1);
            if !self.pending_requests.contains_key(&id) && !self.pending_responses.contains_key(&id)
            {
                return id;
            }
        }
    }

    pub fn pending_request_count(&self) -> usize {
        self.pending_requests.len()
    }

    pub fn is_pending(&self, id: RequestId) -> bool {
        self.pending_requests.contains_key(&id)
    }

    /// Forget every outstanding request and unread response.
    pub fn drop_pending(&mut self) {
        self.pending_requests.clear();
        self.pending_responses.clear();
    }

    pub fn set_notification_callback(&mut self, callback: NotificationCallback) {
        self.notification_callback = Some(callback);
    }

    pub fn clear_notification_callback(&mut self) {
        self.notification_callback = None;
    }

    pub fn has_notification_callback(&self) -> bool {
        self.notification_callback.is_some()
    }

    pub(crate) fn notify_callback(&mut self, body: &Map<String, Value>) -> bool {
        match self.notification_callback.as_mut() {
            Some(callback) => {
                callback(body);
                true
            }
            None => false,
        }
    }
}

// ============================================================================
// Cross-thread control flags
// ============================================================================

static SIGHUP_RECEIVED: AtomicBool = AtomicBool::new(false);

extern "C" fn on_sighup(_signal: libc::c_int) {
    SIGHUP_RECEIVED.store(true, Ordering::SeqCst);
}

/// Route SIGHUP to the loop as a `Hangup` signal instead of terminating the process.
pub fn install_hangup_handler() {
    // SAFETY: the handler only stores to an atomic, which is async-signal-safe.
    unsafe {
        libc::signal(libc::SIGHUP, on_sighup as libc::sighandler_t);
    }
}

#[derive(Default)]
struct ControlInner {
    reset: AtomicBool,
    exit: AtomicBool,
    hangup: AtomicBool,
    paused: Mutex<bool>,
    resumed: Condvar,
}

/// Flags other threads may raise for the loop to act on at its next tick.
#[derive(Clone, Default)]
pub struct LoopControl {
    inner: Arc<ControlInner>,
}

impl LoopControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_reset(&self) {
        self.inner.reset.store(true, Ordering::SeqCst);
    }

    pub(crate) fn take_reset(&self) -> bool {
        self.inner.reset.swap(false, Ordering::SeqCst)
    }

    pub fn request_exit(&self) {
        self.inner.exit.store(true, Ordering::SeqCst);
    }

    pub fn exit_requested(&self) -> bool {
        self.inner.exit.load(Ordering::SeqCst)
    }

    pub(crate) fn clear_exit(&self) {
        self.inner.exit.store(false, Ordering::SeqCst);
    }

    pub fn request_hangup(&self) {
        self.inner.hangup.store(true, Ordering::SeqCst);
    }

    pub(crate) fn take_hangup(&self) -> bool {
        let raised = self.inner.hangup.swap(false, Ordering::SeqCst);
        SIGHUP_RECEIVED.swap(false, Ordering::SeqCst) || raised
    }

    pub fn pause(&self) {
        *lock_or_recover(&self.inner.paused, "LoopControl::pause") = true;
    }

    pub fn resume(&self) {
        *lock_or_recover(&self.inner.paused, "LoopControl::resume") = false;
        self.inner.resumed.notify_all();
    }

    pub fn is_paused(&self) -> bool {
        *lock_or_recover(&self.inner.paused, "LoopControl::is_paused")
    }

    /// Block the calling thread until `resume` is called.
    pub(crate) fn wait_while_paused(&self) {
        let mut paused = lock_or_recover(&self.inner.paused, "LoopControl::wait_while_paused");
        while *paused {
            paused = match self.inner.resumed.wait(paused) {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
        }
    }
}
