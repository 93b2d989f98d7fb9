use eltenloop::agent::{AgentSupervisor, SupervisorState};
use eltenloop::input::keys;
use eltenloop::runtime::{LoopCore, LoopFaultSignal, RequestError, Scene, SceneFactory, StepOutcome};
use serde_json::json;

pub(crate) struct ClientScenes {
    silent_start: bool,
}

impl ClientScenes {
    pub(crate) fn new(silent_start: bool) -> Self {
        Self { silent_start }
    }
}

impl SceneFactory for ClientScenes {
    fn loading(&self) -> Box<dyn Scene> {
        Box::new(LoadingScene {
            silent: self.silent_start,
        })
    }

    fn update(&self) -> Box<dyn Scene> {
        Box::new(NoticeScene {
            name: "update",
            text: "Reinstalling is not available in this build.",
        })
    }

    fn forum(&self) -> Box<dyn Scene> {
        Box::new(NoticeScene {
            name: "forum",
            text: "Forum is not available offline.",
        })
    }

    fn messages(&self) -> Box<dyn Scene> {
        Box::new(NoticeScene {
            name: "messages",
            text: "Messages are not available offline.",
        })
    }
}

struct LoadingScene {
    silent: bool,
}

impl Scene for LoadingScene {
    fn name(&self) -> &str {
        "loading"
    }

    fn step(&mut self, core: &mut LoopCore) -> Result<StepOutcome, LoopFaultSignal> {
        if !self.silent {
            core.speak("Welcome to Elten");
        }
        Ok(StepOutcome::Switch(Box::new(StatusScene::default())))
    }
}

/// Announces itself once and returns to the scene below it.
struct NoticeScene {
    name: &'static str,
    text: &'static str,
}

impl Scene for NoticeScene {
    fn name(&self) -> &str {
        self.name
    }

    fn step(&mut self, core: &mut LoopCore) -> Result<StepOutcome, LoopFaultSignal> {
        core.alert(self.text)?;
        Ok(StepOutcome::Finish)
    }
}

/// Enter pings the agent, U reads the unread counter, A reads agent health,
/// F1 lists keys, Escape asks to exit.
#[derive(Default)]
struct StatusScene {
    announced: bool,
}

impl Scene for StatusScene {
    fn name(&self) -> &str {
        "status"
    }

    fn step(&mut self, core: &mut LoopCore) -> Result<StepOutcome, LoopFaultSignal> {
        if !self.announced {
            self.announced = true;
            core.speak("Ready. Enter pings the agent, Escape exits.");
        }
        if core.keys().enter() {
            match core.request("ping", json!({})) {
                Ok(_) => core.speak("Agent is responding."),
                Err(RequestError::Interrupted(signal)) => return Err(signal),
                Err(err) => core.speak(&format!("Agent did not answer: {err}")),
            }
        } else if core.keys().is_pressed(keys::F1) {
            core.speak(
                "Enter: ping the agent. U: unread messages. A: agent status. F12: restart. Escape: exit.",
            );
        } else if core.keys().is_pressed(b'U') {
            let unread = core.ctx.unread_messages;
            core.speak(&format!("{unread} unread messages"));
        } else if core.keys().is_pressed(b'A') {
            let health = agent_health(core.supervisor());
            core.speak(&health);
        } else if core.keys().escape() && core.confirm("Do you want to exit Elten?")? {
            core.control().request_exit();
        }
        Ok(StepOutcome::Continue)
    }

    fn fresh(&self) -> Option<Box<dyn Scene>> {
        Some(Box::new(StatusScene::default()))
    }
}

fn agent_health(supervisor: &AgentSupervisor) -> String {
    match supervisor.state() {
        SupervisorState::Healthy if supervisor.restarts() == 0 => "Agent is running.".to_string(),
        SupervisorState::Healthy => format!(
            "Agent is running. It was restarted {} times.",
            supervisor.restarts()
        ),
        SupervisorState::Dead | SupervisorState::Restarting => {
            let since = supervisor
                .last_failure()
                .map(|at| at.elapsed().as_secs())
                .unwrap_or_default();
            format!(
                "Agent is down: {} failures in a row, the last one {since} seconds ago.",
                supervisor.consecutive_failures()
            )
        }
    }
}
