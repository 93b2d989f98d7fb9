use super::protocol::{AgentLogLevel, Frame, FrameKind};
use crate::runtime::{AgentIncident, Collaborators, Cue, LoopContext, QueuedSignal};
use crate::{log_agent, log_debug, log_debug_content};
use std::collections::HashMap;

/// Per-kind counters kept across the session.
#[derive(Debug, Default, Clone)]
pub struct DispatchStats {
    pub by_kind: HashMap<FrameKind, u64>,
    pub late_responses: u64,
}

impl DispatchStats {
    pub fn count(&self, kind: FrameKind) -> u64 {
        self.by_kind.get(&kind).copied().unwrap_or(0)
    }
}

/// Routes decoded frames to their consumers. Never blocks: anything that
/// needs user interaction is queued on the context and handled by the loop.
#[derive(Default)]
pub struct AgentDispatcher {
    stats: DispatchStats,
}

impl AgentDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> &DispatchStats {
        &self.stats
    }

    pub fn dispatch(&mut self, frame: Frame, ctx: &mut LoopContext, collab: &mut Collaborators) {
        *self.stats.by_kind.entry(frame.kind()).or_default() += 1;
        match frame {
            Frame::Response { id, body } => {
                if ctx.pending_requests.remove(&id).is_some() {
                    ctx.pending_responses.insert(id, body);
                } else {
                    self.stats.late_responses += 1;
                    log_debug(&format!("dropping response {id}: no request outstanding"));
                }
            }
            Frame::Notification { body } => {
                if !ctx.notify_callback(&body) {
                    collab.notifications.process(&body);
                }
            }
            Frame::SocketCreate(payload) => {
                ctx.sockets.create.insert(payload.id, payload.body);
            }
            Frame::SocketWrite(payload) => {
                ctx.sockets.write.insert(payload.id, payload.body);
            }
            Frame::SocketRead(payload) => {
                ctx.sockets.read.insert(payload.id, payload.body);
            }
            Frame::SocketClose(payload) => {
                ctx.sockets.close.insert(payload.id, payload.body);
            }
            Frame::Tray => {
                tracing::info!("restored from tray");
                ctx.flags.tray_restored = true;
            }
            Frame::Alarm => {
                tracing::info!("alarm");
                ctx.flags.alarm = true;
            }
            Frame::StatusMessage {
                text,
                level,
                time,
                msgs,
            } => {
                if let Some(count) = msgs {
                    ctx.unread_messages = count;
                }
                if let Some(text) = text {
                    forward_log(level.unwrap_or_default(), &text, time);
                }
            }
            Frame::Log { level, text, time } => forward_log(level, &text, time),
            Frame::Signal {
                sender,
                appid,
                packet,
            } => {
                ctx.signals.push_back(QueuedSignal {
                    sender,
                    app_id: appid,
                    packet,
                });
            }
            Frame::Error { text, loc } => {
                tracing::error!(location = loc.as_deref().unwrap_or(""), "agent: {text}");
                log_debug("agent reported an internal error");
                log_debug_content(&format!("agent error: {text}"));
                ctx.incidents.push_back(AgentIncident {
                    message: text,
                    location: loc,
                });
            }
            Frame::Unknown { tag } => {
                tracing::warn!(kind = tag.as_str(), "agent unknown data");
                log_debug(&format!("agent unknown data: {tag}"));
                collab.presenter.play(Cue::Failure);
            }
        }
    }
}

fn forward_log(level: AgentLogLevel, text: &str, time: Option<f64>) {
    let agent_time = time.unwrap_or_default();
    match level {
        AgentLogLevel::Debug => tracing::debug!(agent_time, "agent: {text}"),
        AgentLogLevel::Info => tracing::info!(agent_time, "agent: {text}"),
        AgentLogLevel::Warning => tracing::warn!(agent_time, "agent: {text}"),
        AgentLogLevel::Error => tracing::error!(agent_time, "agent: {text}"),
    }
    log_agent(level.as_str(), text, time);
}
