//! The background agent: wire format, output decoding, routing and supervision.

mod channel;
mod dispatch;
mod process;
pub mod protocol;
mod supervisor;

pub use channel::{decode_frames, DrainReport, FrameChannel, TransportCorruption};
pub use dispatch::{AgentDispatcher, DispatchStats};
pub(crate) use process::terminate_pids;
pub use process::{
    AgentHandle, AgentLaunchSpec, AgentLauncher, AgentProcess, AgentStatus, ProcessLauncher,
    SpawnedAgent,
};
pub use protocol::{AgentCommand, AgentLogLevel, Frame, FrameKind, RequestId};
pub use supervisor::{
    AgentSendError, AgentSupervisor, SupervisorConfig, SupervisorEvent, SupervisorState,
};
