//! Scene contract and the collaborators the loop talks to.

use super::engine::LoopCore;
use super::fault::LoopFaultSignal;
use anyhow::Result;
use serde_json::{Map, Value};

/// What the loop should do after a scene step.
pub enum StepOutcome {
    Continue,
    /// Replace the active scene
    Switch(Box<dyn Scene>),
    /// Run another scene on top; the active one resumes when it finishes
    Push(Box<dyn Scene>),
    /// The scene is done; resume the scene below it or stop the loop
    Finish,
}

/// One unit of application flow, stepped once per tick.
pub trait Scene {
    fn name(&self) -> &str;

    /// Application id used to match inter-application signals.
    fn app_id(&self) -> Option<&str> {
        None
    }

    fn step(&mut self, core: &mut LoopCore) -> Result<StepOutcome, LoopFaultSignal>;

    /// Called before the step for each signal addressed to this scene.
    fn signaled(&mut self, _core: &mut LoopCore, _sender: &str, _packet: &Value) {}

    /// A new instance of the same scene, used by the rescue menu's restart.
    fn fresh(&self) -> Option<Box<dyn Scene>> {
        None
    }
}

/// Builds the well-known scenes the loop falls back to.
pub trait SceneFactory {
    fn loading(&self) -> Box<dyn Scene>;
    fn update(&self) -> Box<dyn Scene>;
    fn forum(&self) -> Box<dyn Scene>;
    fn messages(&self) -> Box<dyn Scene>;
}

/// Named sound cues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cue {
    DialogOpen,
    DialogClose,
    Failure,
    Login,
    Logout,
    Signal,
    ListFocus,
}

impl Cue {
    pub fn name(&self) -> &'static str {
        match self {
            Cue::DialogOpen => "dialog_open",
            Cue::DialogClose => "dialog_close",
            Cue::Failure => "right",
            Cue::Login => "login",
            Cue::Logout => "logout",
            Cue::Signal => "signal",
            Cue::ListFocus => "list_focus",
        }
    }
}

/// Speech, sound and clipboard output.
pub trait Presenter {
    fn speak(&mut self, text: &str);
    fn play(&mut self, cue: Cue);
    fn copy_to_clipboard(&mut self, text: &str) -> Result<()>;
}

/// Synchronous request to the public server.
pub trait ServerLink {
    fn request(&mut self, name: &str, params: &Value) -> Result<Vec<String>>;
}

/// Default processor for notifications nobody registered a callback for.
pub trait NotificationSink {
    fn process(&mut self, body: &Map<String, Value>);
}

/// Work done once when the loop shuts down, such as persisting session state.
pub trait ShutdownHook {
    fn name(&self) -> &str;
    fn run(&mut self) -> Result<()>;
}

pub struct Collaborators {
    pub presenter: Box<dyn Presenter>,
    pub server: Box<dyn ServerLink>,
    pub notifications: Box<dyn NotificationSink>,
    pub shutdown_hooks: Vec<Box<dyn ShutdownHook>>,
}
