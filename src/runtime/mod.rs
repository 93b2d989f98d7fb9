//! The tick-driven loop: shared context, scenes, request correlation, prompts and recovery.

mod context;
mod controller;
mod engine;
mod correlator;
mod fault;
mod prompt;
mod recovery;
mod scene;

pub use context::{
    install_hangup_handler, AgentIncident, LoopContext, LoopControl, LoopFlags,
    NotificationCallback, PendingRequest, QueuedSignal, SessionFlags, SocketTables,
};
pub use controller::{LoopController, TickOutcome};
pub use correlator::RequestError;
pub use fault::{FaultCause, LoopFaultSignal};
pub use recovery::{RecoveryAction, RecoveryState, RecoveryStateMachine, RescueChoice};
pub use engine::{LoopCore, LoopSettings};
pub use scene::{
    Collaborators, Cue, NotificationSink, Presenter, Scene, SceneFactory, ServerLink,
    ShutdownHook, StepOutcome,
};
