use std::fmt;

/// Control-flow signals and failures raised out of a scene step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopFaultSignal {
    /// Replace the active scene with the loading scene
    SoftReset,
    /// Terminal hangup; swallowed and the loop resumes
    Hangup,
    ExitRequested,
    Unhandled(FaultCause),
}

impl LoopFaultSignal {
    pub fn unhandled(message: impl Into<String>) -> Self {
        LoopFaultSignal::Unhandled(FaultCause::new(message))
    }
}

impl fmt::Display for LoopFaultSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoopFaultSignal::SoftReset => f.write_str("soft reset"),
            LoopFaultSignal::Hangup => f.write_str("hangup"),
            LoopFaultSignal::ExitRequested => f.write_str("exit requested"),
            LoopFaultSignal::Unhandled(cause) => write!(f, "unhandled fault: {cause}"),
        }
    }
}

impl std::error::Error for LoopFaultSignal {}

/// What went wrong in an unhandled fault, as shown to the user and put in reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaultCause {
    pub message: String,
    pub scene: Option<String>,
    pub location: Option<String>,
}

impl FaultCause {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            scene: None,
            location: None,
        }
    }

    pub fn in_scene(mut self, scene: &str) -> Self {
        self.scene.get_or_insert_with(|| scene.to_string());
        self
    }

    /// Text copied to the clipboard or sent with a bug report.
    pub fn report(&self) -> String {
        let mut report = self.message.clone();
        if let Some(scene) = &self.scene {
            report.push_str(&format!("\r\nScene: {scene}"));
        }
        if let Some(location) = &self.location {
            report.push_str(&format!("\r\n{location}"));
        }
        report.push_str(&format!("\r\nVersion: {}", env!("CARGO_PKG_VERSION")));
        report
    }
}

impl fmt::Display for FaultCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl From<anyhow::Error> for LoopFaultSignal {
    fn from(err: anyhow::Error) -> Self {
        LoopFaultSignal::unhandled(format!("{err:#}"))
    }
}
