//! Frames exchanged with the agent subprocess.
//!
//! Records are self-delimiting JSON objects carrying a `"kind"` tag. The agent
//! may write several records back to back; commands sent to the agent are one
//! JSON object per line.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;

pub type RequestId = u64;

// ============================================================================
// Agent frames (agent → loop)
// ============================================================================

/// One decoded message from the agent.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind")]
pub enum Frame {
    /// Server notification for the active callback or the default processor
    #[serde(rename = "notification")]
    Notification {
        #[serde(flatten)]
        body: Map<String, Value>,
    },

    /// Answer to an earlier `request` command
    #[serde(rename = "response")]
    Response {
        id: RequestId,
        #[serde(flatten)]
        body: Map<String, Value>,
    },

    #[serde(rename = "socket-create")]
    SocketCreate(SocketPayload),

    #[serde(rename = "socket-write")]
    SocketWrite(SocketPayload),

    #[serde(rename = "socket-read")]
    SocketRead(SocketPayload),

    #[serde(rename = "socket-close")]
    SocketClose(SocketPayload),

    /// The window was restored from the tray
    #[serde(rename = "tray")]
    Tray,

    /// A user alarm went off
    #[serde(rename = "alarm")]
    Alarm,

    #[serde(rename = "status-message")]
    StatusMessage {
        #[serde(default, alias = "msg")]
        text: Option<String>,
        #[serde(default)]
        level: Option<AgentLogLevel>,
        #[serde(default)]
        time: Option<f64>,
        /// Unread message count reported by the server
        #[serde(default)]
        msgs: Option<u64>,
    },

    #[serde(rename = "log")]
    Log {
        #[serde(default)]
        level: AgentLogLevel,
        #[serde(alias = "msg")]
        text: String,
        #[serde(default)]
        time: Option<f64>,
    },

    /// Inter-application signal for the scene with the matching `appid`
    #[serde(rename = "signal")]
    Signal {
        sender: String,
        appid: String,
        #[serde(default)]
        packet: Value,
    },

    /// The agent hit an internal error and is recovering
    #[serde(rename = "error")]
    Error {
        #[serde(alias = "msg")]
        text: String,
        #[serde(default)]
        loc: Option<String>,
    },

    /// Any record whose kind (or shape) is not understood
    #[serde(skip_deserializing)]
    Unknown { tag: String },
}

impl Frame {
    /// Classify a decoded record. Never fails: anything unrecognized becomes `Unknown`.
    pub fn from_value(value: Value) -> Self {
        let tag = match value.get("kind") {
            Some(Value::String(kind)) => kind.clone(),
            Some(other) => other.to_string(),
            None => String::new(),
        };
        serde_json::from_value(value).unwrap_or(Frame::Unknown { tag })
    }

    pub fn kind(&self) -> FrameKind {
        match self {
            Frame::Notification { .. } => FrameKind::Notification,
            Frame::Response { .. } => FrameKind::Response,
            Frame::SocketCreate(_) => FrameKind::SocketCreate,
            Frame::SocketWrite(_) => FrameKind::SocketWrite,
            Frame::SocketRead(_) => FrameKind::SocketRead,
            Frame::SocketClose(_) => FrameKind::SocketClose,
            Frame::Tray => FrameKind::Tray,
            Frame::Alarm => FrameKind::Alarm,
            Frame::StatusMessage { .. } => FrameKind::StatusMessage,
            Frame::Log { .. } => FrameKind::Log,
            Frame::Signal { .. } => FrameKind::Signal,
            Frame::Error { .. } => FrameKind::Error,
            Frame::Unknown { .. } => FrameKind::Unknown,
        }
    }
}

/// Payload of the virtual-socket proxy frames.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SocketPayload {
    #[serde(deserialize_with = "connection_id")]
    pub id: String,
    #[serde(flatten)]
    pub body: Map<String, Value>,
}

// Connection ids arrive as numbers or strings; both key the same table.
fn connection_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(id) => Ok(id),
        Value::Number(id) => Ok(id.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "invalid connection id {other}"
        ))),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameKind {
    Notification,
    Response,
    SocketCreate,
    SocketWrite,
    SocketRead,
    SocketClose,
    Tray,
    Alarm,
    StatusMessage,
    Log,
    Signal,
    Error,
    Unknown,
}

impl FrameKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FrameKind::Notification => "notification",
            FrameKind::Response => "response",
            FrameKind::SocketCreate => "socket-create",
            FrameKind::SocketWrite => "socket-write",
            FrameKind::SocketRead => "socket-read",
            FrameKind::SocketClose => "socket-close",
            FrameKind::Tray => "tray",
            FrameKind::Alarm => "alarm",
            FrameKind::StatusMessage => "status-message",
            FrameKind::Log => "log",
            FrameKind::Signal => "signal",
            FrameKind::Error => "error",
            FrameKind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for FrameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Severity carried by `log` and `status-message` frames.
///
/// The agent sends either a number (-1 debug, 0 info, 1 warning, 2 and up
/// error) or a level name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AgentLogLevel {
    Debug,
    #[default]
    Info,
    Warning,
    Error,
}

impl AgentLogLevel {
    pub fn from_number(level: i64) -> Self {
        match level {
            i64::MIN..=-1 => AgentLogLevel::Debug,
            0 => AgentLogLevel::Info,
            1 => AgentLogLevel::Warning,
            _ => AgentLogLevel::Error,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "debug" | "trace" => Some(AgentLogLevel::Debug),
            "info" => Some(AgentLogLevel::Info),
            "warn" | "warning" => Some(AgentLogLevel::Warning),
            "error" | "fatal" => Some(AgentLogLevel::Error),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AgentLogLevel::Debug => "debug",
            AgentLogLevel::Info => "info",
            AgentLogLevel::Warning => "warning",
            AgentLogLevel::Error => "error",
        }
    }
}

impl<'de> Deserialize<'de> for AgentLogLevel {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Value::deserialize(deserializer)? {
            Value::Number(number) => number
                .as_i64()
                .map(AgentLogLevel::from_number)
                .ok_or_else(|| serde::de::Error::custom(format!("invalid log level {number}"))),
            Value::String(name) => AgentLogLevel::from_name(&name)
                .ok_or_else(|| serde::de::Error::custom(format!("unknown log level {name}"))),
            Value::Null => Ok(AgentLogLevel::default()),
            other => Err(serde::de::Error::custom(format!(
                "invalid log level {other}"
            ))),
        }
    }
}

// ============================================================================
// Agent commands (loop → agent)
// ============================================================================

/// Commands written to the agent's stdin.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind")]
pub enum AgentCommand {
    /// Forward a server request; the agent answers with a `response` frame echoing `id`
    #[serde(rename = "request")]
    Request {
        id: RequestId,
        name: String,
        params: Value,
    },

    /// The alarm modal was acknowledged
    #[serde(rename = "alarm_stop")]
    AlarmStop,
}

impl AgentCommand {
    /// Encode as a single newline-terminated JSON line.
    pub fn encode(&self) -> serde_json::Result<Vec<u8>> {
        let mut line = serde_json::to_vec(self)?;
        line.push(b'\n');
        Ok(line)
    }
}
